//! Archive store - read access to an IMG file on disk
//!
//! The store is opened read-only. Rewrites never go through it: the builder
//! writes a fresh file and replaces the original.

use imgtool_core::{checked_sector_offset, DirectoryEntry, Error, ReadSeek, Result};
use imgtool_format::Directory;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Configuration for opening a store
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Memory-map the archive instead of issuing a read per record
    pub use_mmap: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { use_mmap: true }
    }
}

/// An opened archive
pub struct ArchiveStore {
    path: Option<PathBuf>,
    pipeline: Box<dyn ReadSeek>,
    length: u64,
}

impl ArchiveStore {
    /// Open an archive file
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if the path does not exist or is not a regular file.
    pub fn open(path: &Path, config: StoreConfig) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::from_io_at(e, path))?;
        let metadata = file.metadata()?;

        if !metadata.is_file() {
            return Err(Error::not_found(format!(
                "IMG file not found: {} is not a regular file",
                path.display()
            )));
        }

        let length = metadata.len();
        let pipeline: Box<dyn ReadSeek> = if config.use_mmap && length > 0 {
            // SAFETY: the file is a regular file opened read-only, and the
            // engine assumes exclusive access for the duration of an
            // operation, so the mapping is not truncated underneath us.
            let mmap = unsafe { Mmap::map(&file)? };
            Box::new(Cursor::new(mmap))
        } else {
            Box::new(io::BufReader::new(file))
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            pipeline,
            length,
        })
    }

    /// Wrap any readable and seekable stream
    pub fn from_stream<R: Read + Seek + Send + 'static>(stream: R, length: u64) -> Self {
        Self {
            path: None,
            pipeline: Box::new(stream),
            length,
        }
    }

    /// Path the store was opened from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Total size in bytes
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Raw stream access
    pub fn content(&mut self) -> &mut dyn ReadSeek {
        &mut *self.pipeline
    }

    /// Detect the layout and decode the directory
    pub fn directory(&mut self) -> Result<Directory> {
        Directory::load(self.content())
    }

    /// Copy one member's payload into `out`, returning the byte count
    ///
    /// # Errors
    ///
    /// `Error::Format` if the payload lies outside the store.
    pub fn copy_member<W: Write + ?Sized>(
        &mut self,
        entry: &DirectoryEntry,
        out: &mut W,
    ) -> Result<u64> {
        let offset = checked_sector_offset(entry.start_sector as u64, &entry.name)?;
        let end = offset + entry.byte_size as u64;

        if end > self.length {
            return Err(Error::format(format!(
                "payload of '{}' (bytes {}..{}) lies beyond the end of the store ({} bytes)",
                entry.name, offset, end, self.length
            )));
        }

        let stream = self.content();
        stream.seek(SeekFrom::Start(offset))?;
        let copied = io::copy(&mut stream.take(entry.byte_size as u64), out)?;

        if copied != entry.byte_size as u64 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short read for '{}': {} of {} bytes", entry.name, copied, entry.byte_size),
            )));
        }

        Ok(copied)
    }

    /// Read one member's payload into memory
    pub fn read_member(&mut self, entry: &DirectoryEntry) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(entry.byte_size as usize);
        self.copy_member(entry, &mut data)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgtool_core::Layout;
    use imgtool_format::{ArchiveWriter, LayoutPlan};
    use tempfile::tempdir;

    fn sample_archive() -> Vec<u8> {
        let plan = LayoutPlan::compute(Layout::V2, [("a.dat", 10), ("b.dat", 5000)]).unwrap();
        let mut writer = ArchiveWriter::new(Vec::new(), plan).unwrap();
        writer.write_member(&mut [0xAAu8; 10].as_slice()).unwrap();
        writer.write_member(&mut vec![0xBBu8; 5000].as_slice()).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_store_from_stream_reads_members() {
        let data = sample_archive();
        let length = data.len() as u64;
        let mut store = ArchiveStore::from_stream(Cursor::new(data), length);

        let directory = store.directory().unwrap();
        let b = directory.find("b.dat").unwrap().clone();
        assert_eq!(store.read_member(&b).unwrap(), vec![0xBB; 5000]);
        assert!(store.path().is_none());
    }

    #[test]
    fn test_store_open_missing_file() {
        let dir = tempdir().unwrap();
        let result = ArchiveStore::open(&dir.path().join("missing.img"), StoreConfig::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_store_open_directory_is_not_a_store() {
        let dir = tempdir().unwrap();
        let result = ArchiveStore::open(dir.path(), StoreConfig::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_store_open_with_and_without_mmap() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models.img");
        std::fs::write(&path, sample_archive()).unwrap();

        for use_mmap in [true, false] {
            let mut store = ArchiveStore::open(&path, StoreConfig { use_mmap }).unwrap();
            assert_eq!(store.length(), 5 * 2048);
            let directory = store.directory().unwrap();
            let a = directory.find("a.dat").unwrap().clone();
            assert_eq!(store.read_member(&a).unwrap(), vec![0xAA; 10]);
        }
    }

    #[test]
    fn test_store_open_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.img");
        std::fs::write(&path, b"").unwrap();

        let mut store = ArchiveStore::open(&path, StoreConfig::default()).unwrap();
        assert_eq!(store.length(), 0);
        assert!(matches!(store.directory(), Err(Error::Format(_))));
    }

    #[test]
    fn test_payload_out_of_bounds() {
        let data = sample_archive();
        let length = data.len() as u64;
        let mut store = ArchiveStore::from_stream(Cursor::new(data), length);

        let bogus = DirectoryEntry::new("bogus.dat", 100, 10);
        assert!(matches!(store.read_member(&bogus), Err(Error::Format(_))));
    }
}
