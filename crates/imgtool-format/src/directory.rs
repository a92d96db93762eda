//! Directory table codec
//!
//! Each record is 32 bytes, little-endian:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! +0      4     start_sector (payload offset / 2048)
//! +4      4     byte_size
//! +8      24    name, ASCII, NUL-padded
//! ```

use crate::detect::{read_up_to, require_layout, resolve_entry_count};
use imgtool_core::{
    DirectoryEntry, Entry, Layout, ReadSeek, Result, ENTRY_SIZE, NAME_SIZE, VER2_MAGIC,
};
use std::io::{Seek, SeekFrom, Write};

/// A name after fitting it into the 24-byte field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedName {
    pub field: [u8; NAME_SIZE],
    /// The supplied name was longer than the field and was cut
    pub truncated: bool,
}

/// A record ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    pub bytes: [u8; ENTRY_SIZE],
    pub name_truncated: bool,
}

/// Split a raw record into `(start_sector, byte_size)`
pub fn record_fields(record: &[u8; ENTRY_SIZE]) -> (u32, u32) {
    let start_sector = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
    let byte_size = u32::from_le_bytes([record[4], record[5], record[6], record[7]]);
    (start_sector, byte_size)
}

/// Decode a name field
///
/// Takes bytes up to the first NUL, trims surrounding whitespace and drops
/// any non-ASCII byte. Never fails.
pub fn decode_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let raw = &field[..end];

    let is_space = |b: &u8| b.is_ascii_whitespace() || *b == 0x0B;
    let first = raw.iter().position(|b| !is_space(b)).unwrap_or(raw.len());
    let last = raw.iter().rposition(|b| !is_space(b)).map_or(first, |i| i + 1);

    raw[first..last]
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect()
}

/// Decode one 32-byte record into a directory slot
pub fn decode_record(record: &[u8; ENTRY_SIZE]) -> Entry {
    let (start_sector, byte_size) = record_fields(record);
    let name = decode_name(&record[8..]);

    if name.is_empty() || byte_size == 0 {
        return Entry::Empty;
    }

    Entry::Live(DirectoryEntry {
        start_sector,
        byte_size,
        name,
    })
}

/// Fit a name into the 24-byte field, truncating and flagging if needed
pub fn encode_name(name: &str) -> EncodedName {
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_SIZE);

    let mut field = [0u8; NAME_SIZE];
    field[..len].copy_from_slice(&bytes[..len]);

    EncodedName {
        field,
        truncated: bytes.len() > NAME_SIZE,
    }
}

/// The name as it will be stored, at most 24 bytes
pub fn stored_name(name: &str) -> String {
    let mut end = name.len().min(NAME_SIZE);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// Encode a directory entry into a 32-byte record
pub fn encode_record(entry: &DirectoryEntry) -> EncodedRecord {
    let name = encode_name(&entry.name);
    if name.truncated {
        tracing::warn!(
            "Filename '{}' exceeds {} characters, truncating",
            entry.name,
            NAME_SIZE
        );
    }

    let mut bytes = [0u8; ENTRY_SIZE];
    bytes[0..4].copy_from_slice(&entry.start_sector.to_le_bytes());
    bytes[4..8].copy_from_slice(&entry.byte_size.to_le_bytes());
    bytes[8..].copy_from_slice(&name.field);

    EncodedRecord {
        bytes,
        name_truncated: name.truncated,
    }
}

/// Write the V2 header (nothing for V1)
pub fn write_header<W: Write + ?Sized>(
    out: &mut W,
    layout: Layout,
    entry_count: u32,
) -> Result<()> {
    if layout == Layout::V2 {
        out.write_all(VER2_MAGIC)?;
        out.write_all(&entry_count.to_le_bytes())?;
    }
    Ok(())
}

/// Read the record at `offset`, or `None` if the store ends first
pub(crate) fn read_record(
    stream: &mut dyn ReadSeek,
    offset: u64,
) -> Result<Option<[u8; ENTRY_SIZE]>> {
    stream.seek(SeekFrom::Start(offset))?;
    let mut record = [0u8; ENTRY_SIZE];
    if read_up_to(stream, &mut record)? < ENTRY_SIZE {
        return Ok(None);
    }
    Ok(Some(record))
}

/// A decoded directory table
#[derive(Debug, Clone)]
pub struct Directory {
    layout: Layout,
    declared_count: u32,
    slots: Vec<Entry>,
    unreadable: u32,
}

impl Directory {
    /// Detect the layout, resolve the entry count and decode every record
    ///
    /// # Errors
    ///
    /// `Error::Format` if the store is not a recognizable archive.
    pub fn load(stream: &mut dyn ReadSeek) -> Result<Self> {
        let layout = require_layout(stream)?;
        let count = resolve_entry_count(stream, layout)?;
        tracing::debug!("Detected format: {} with {} entries", layout, count);
        Self::read(stream, layout, count)
    }

    /// Decode `entry_count` records for a known layout
    ///
    /// Records the store is too short to hold are counted as unreadable and
    /// skipped, not treated as errors.
    pub fn read(stream: &mut dyn ReadSeek, layout: Layout, entry_count: u32) -> Result<Self> {
        let start = layout.directory_start();
        let mut slots = Vec::new();

        for index in 0..entry_count {
            let offset = start + index as u64 * ENTRY_SIZE as u64;
            match read_record(stream, offset)? {
                Some(record) => slots.push(decode_record(&record)),
                None => {
                    let unreadable = entry_count - index;
                    tracing::warn!(
                        "Directory truncated: {} of {} records could not be read",
                        unreadable,
                        entry_count
                    );
                    return Ok(Self {
                        layout,
                        declared_count: entry_count,
                        slots,
                        unreadable,
                    });
                }
            }
        }

        Ok(Self {
            layout,
            declared_count: entry_count,
            slots,
            unreadable: 0,
        })
    }

    /// Layout the directory was read with
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Entry count declared by the header (V2) or inferred by scanning (V1)
    pub fn declared_count(&self) -> u32 {
        self.declared_count
    }

    /// Records that could not be read because the store ended
    pub fn unreadable(&self) -> u32 {
        self.unreadable
    }

    /// All decoded slots in directory order
    pub fn slots(&self) -> &[Entry] {
        &self.slots
    }

    /// Live entries in directory order
    pub fn live_entries(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.slots.iter().filter_map(Entry::live)
    }

    /// First live entry with this name
    pub fn find(&self, name: &str) -> Option<&DirectoryEntry> {
        self.live_entries().find(|entry| entry.name == name)
    }

    /// Sum of live payload sizes
    pub fn total_payload_bytes(&self) -> u64 {
        self.live_entries().map(|entry| entry.byte_size as u64).sum()
    }
}
