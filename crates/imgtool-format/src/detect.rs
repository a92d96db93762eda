//! Layout detection and entry-count resolution
//!
//! A store starting with `"VER2"` is always V2. Anything else is classified
//! V1 by a heuristic over the first record: both fields nonzero and the size
//! smaller than the store. Arbitrary binary data can satisfy that test, so a
//! V1 result is best-effort only.

use crate::directory::{read_record, record_fields};
use imgtool_core::{Error, Layout, ReadSeek, Result, ENTRY_SIZE, MAX_V1_ENTRIES, VER2_MAGIC};
use std::io::{Read, Seek, SeekFrom};

/// Classify a store, returning `None` when it is not a recognizable archive
///
/// # Errors
///
/// Only I/O failures other than a short read are reported; a store too short
/// to classify is simply `None`.
pub fn detect(stream: &mut dyn ReadSeek) -> Result<Option<Layout>> {
    let total_size = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(0))?;

    let mut head = [0u8; 8];
    let filled = read_up_to(stream, &mut head)?;

    if filled >= VER2_MAGIC.len() && &head[..VER2_MAGIC.len()] == VER2_MAGIC {
        return Ok(Some(Layout::V2));
    }

    if total_size < ENTRY_SIZE as u64 {
        return Ok(None);
    }

    let start_sector = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
    let byte_size = u32::from_le_bytes([head[4], head[5], head[6], head[7]]);

    if start_sector > 0 && byte_size > 0 && (byte_size as u64) < total_size {
        return Ok(Some(Layout::V1));
    }

    Ok(None)
}

/// Detect the layout, failing with `Error::Format` on an unrecognized store
pub fn require_layout(stream: &mut dyn ReadSeek) -> Result<Layout> {
    detect(stream)?.ok_or_else(|| Error::format("unrecognized directory layout"))
}

/// Resolve how many directory records the store declares
///
/// V2 reads the count after the magic. V1 has no count: records are scanned
/// from offset 0 until one does not carry both a start sector and a size, or
/// until the store ends, capped at [`MAX_V1_ENTRIES`].
pub fn resolve_entry_count(stream: &mut dyn ReadSeek, layout: Layout) -> Result<u32> {
    match layout {
        Layout::V2 => {
            stream.seek(SeekFrom::Start(VER2_MAGIC.len() as u64))?;
            let mut count = [0u8; 4];
            if read_up_to(stream, &mut count)? < count.len() {
                return Err(Error::format("truncated VER2 header"));
            }
            Ok(u32::from_le_bytes(count))
        }
        Layout::V1 => {
            let mut count = 0u32;
            while let Some(record) = read_record(stream, count as u64 * ENTRY_SIZE as u64)? {
                let (start_sector, byte_size) = record_fields(&record);
                if start_sector == 0 || byte_size == 0 {
                    break;
                }

                count += 1;
                if count >= MAX_V1_ENTRIES {
                    tracing::warn!(
                        "V1 directory scan stopped at the {} entry safety limit",
                        MAX_V1_ENTRIES
                    );
                    break;
                }
            }
            Ok(count)
        }
    }
}

/// Read as many bytes as are available into `buf`, returning the count
pub(crate) fn read_up_to(stream: &mut dyn ReadSeek, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(start_sector: u32, byte_size: u32, name: &[u8]) -> Vec<u8> {
        let mut rec = Vec::with_capacity(ENTRY_SIZE);
        rec.extend_from_slice(&start_sector.to_le_bytes());
        rec.extend_from_slice(&byte_size.to_le_bytes());
        let mut field = [0u8; 24];
        field[..name.len()].copy_from_slice(name);
        rec.extend_from_slice(&field);
        rec
    }

    #[test]
    fn test_detect_ver2_regardless_of_content() {
        let mut data = b"VER2".to_vec();
        data.extend_from_slice(&[0xFF; 3]);
        assert_eq!(detect(&mut Cursor::new(data)).unwrap(), Some(Layout::V2));
    }

    #[test]
    fn test_detect_ver1_heuristic() {
        let mut data = record(1, 100, b"a.dat");
        data.resize(4096, 0);
        assert_eq!(detect(&mut Cursor::new(data)).unwrap(), Some(Layout::V1));
    }

    #[test]
    fn test_detect_zeroed_store_is_invalid() {
        let data = vec![0u8; 4096];
        assert_eq!(detect(&mut Cursor::new(data)).unwrap(), None);
    }

    #[test]
    fn test_detect_short_store_is_invalid() {
        let data = record(1, 4, b"x")[..31].to_vec();
        assert_eq!(detect(&mut Cursor::new(data)).unwrap(), None);
        assert_eq!(detect(&mut Cursor::new(Vec::new())).unwrap(), None);
    }

    #[test]
    fn test_detect_size_not_smaller_than_store() {
        let mut data = record(1, 64, b"a.dat");
        data.resize(64, 0);
        assert_eq!(detect(&mut Cursor::new(data)).unwrap(), None);
    }

    #[test]
    fn test_require_layout_fails_on_invalid() {
        let result = require_layout(&mut Cursor::new(vec![0u8; 64]));
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_entry_count_ver2() {
        let mut data = b"VER2".to_vec();
        data.extend_from_slice(&7u32.to_le_bytes());
        let count = resolve_entry_count(&mut Cursor::new(data), Layout::V2).unwrap();
        assert_eq!(count, 7);
    }

    #[test]
    fn test_entry_count_ver2_truncated() {
        let data = b"VER2\x01".to_vec();
        let result = resolve_entry_count(&mut Cursor::new(data), Layout::V2);
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_entry_count_ver1_stops_at_terminator() {
        let mut data = record(1, 10, b"a.dat");
        data.extend(record(2, 20, b"b.dat"));
        data.extend(record(0, 0, b""));
        data.extend(record(3, 30, b"ghost.dat"));
        data.resize(8192, 0);
        let count = resolve_entry_count(&mut Cursor::new(data), Layout::V1).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_entry_count_ver1_stops_at_truncated_record() {
        let mut data = record(1, 10, b"a.dat");
        data.extend(record(2, 20, b"b.dat"));
        data.extend_from_slice(&[1, 0, 0, 0, 5]);
        let count = resolve_entry_count(&mut Cursor::new(data), Layout::V1).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_entry_count_ver1_safety_ceiling() {
        let mut data = Vec::new();
        for _ in 0..(MAX_V1_ENTRIES + 5) {
            data.extend(record(1, 1, b"x"));
        }
        let count = resolve_entry_count(&mut Cursor::new(data), Layout::V1).unwrap();
        assert_eq!(count, MAX_V1_ENTRIES);
    }
}
