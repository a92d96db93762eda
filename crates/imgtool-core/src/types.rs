//! Core types for IMG container archives

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payload allocation granularity (2048 bytes)
pub const SECTOR_SIZE: u64 = 2048;

/// Size of one directory record on disk
pub const ENTRY_SIZE: usize = 32;

/// Size of the NUL-padded name field inside a record
pub const NAME_SIZE: usize = 24;

/// Magic at offset 0 of a V2 archive
pub const VER2_MAGIC: &[u8; 4] = b"VER2";

/// Size of the V2 header (magic + entry count)
pub const VER2_HEADER_SIZE: u64 = 8;

/// Directory layout of an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layout {
    /// Headerless: the directory starts at byte 0 and its length is inferred
    V1,
    /// `"VER2"` magic followed by a little-endian entry count
    V2,
}

impl Layout {
    /// Bytes preceding the directory table
    pub fn header_size(&self) -> u64 {
        match self {
            Layout::V1 => 0,
            Layout::V2 => VER2_HEADER_SIZE,
        }
    }

    /// Offset of the first directory record
    pub fn directory_start(&self) -> u64 {
        self.header_size()
    }

    /// Canonical upper-case name (`VER1` / `VER2`)
    pub fn name(&self) -> &'static str {
        match self {
            Layout::V1 => "VER1",
            Layout::V2 => "VER2",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Layout {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "ver1" | "v1" => Ok(Layout::V1),
            "ver2" | "v2" => Ok(Layout::V2),
            _ => Err(Error::validation(format!(
                "invalid format '{}'. Use 'ver1' or 'ver2'",
                token
            ))),
        }
    }
}

/// One live member's directory metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Payload offset in sectors
    pub start_sector: u32,

    /// Payload length in bytes
    pub byte_size: u32,

    /// Member name (ASCII, at most 24 bytes)
    pub name: String,
}

impl DirectoryEntry {
    /// Create a new entry
    pub fn new(name: impl Into<String>, start_sector: u32, byte_size: u32) -> Self {
        Self {
            start_sector,
            byte_size,
            name: name.into(),
        }
    }

    /// Absolute byte offset of the payload
    pub fn byte_offset(&self) -> u64 {
        self.start_sector as u64 * SECTOR_SIZE
    }

    /// Number of sectors the payload occupies
    pub fn sector_count(&self) -> u64 {
        sectors_for(self.byte_size as u64)
    }
}

impl fmt::Display for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<24} {:>10} {:>10}",
            self.name, self.byte_size, self.start_sector
        )
    }
}

/// A decoded directory slot
///
/// Records with an empty name or a zero size are terminators or unused
/// slots. They are never members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Live(DirectoryEntry),
    Empty,
}

impl Entry {
    /// The live entry, if any
    pub fn live(&self) -> Option<&DirectoryEntry> {
        match self {
            Entry::Live(entry) => Some(entry),
            Entry::Empty => None,
        }
    }

    /// Consume into the live entry, if any
    pub fn into_live(self) -> Option<DirectoryEntry> {
        match self {
            Entry::Live(entry) => Some(entry),
            Entry::Empty => None,
        }
    }
}

/// Summary of an archive's geometry and space usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveInfo {
    pub format: Layout,
    pub entry_count: u32,
    pub header_size: u64,
    pub directory_size: u64,
    pub data_start_sector: u64,
    pub data_start_byte: u64,
    pub total_payload_bytes: u64,
    pub overhead_bytes: u64,
    pub efficiency_pct: u64,
    pub store_size: u64,
}

impl ArchiveInfo {
    /// Derive the summary from the directory geometry and payload total
    pub fn compute(
        format: Layout,
        entry_count: u32,
        total_payload_bytes: u64,
        store_size: u64,
    ) -> Self {
        let header_size = format.header_size();
        let directory_size = header_size + entry_count as u64 * ENTRY_SIZE as u64;
        let data_start_sector = sectors_for(directory_size);
        let efficiency_pct = if store_size > 0 {
            total_payload_bytes.saturating_mul(100) / store_size
        } else {
            0
        };

        Self {
            format,
            entry_count,
            header_size,
            directory_size,
            data_start_sector,
            data_start_byte: data_start_sector * SECTOR_SIZE,
            total_payload_bytes,
            overhead_bytes: store_size.saturating_sub(total_payload_bytes),
            efficiency_pct,
            store_size,
        }
    }
}

/// Number of whole sectors needed to hold `bytes`
pub fn sectors_for(bytes: u64) -> u64 {
    bytes.div_ceil(SECTOR_SIZE)
}

/// Zero bytes needed after `bytes` to reach the next sector boundary
pub fn sector_padding(bytes: u64) -> u64 {
    match bytes % SECTOR_SIZE {
        0 => 0,
        rem => SECTOR_SIZE - rem,
    }
}
