//! # imgtool Core
//!
//! Core types, error handling and safety limits for IMG container archives.
//!
//! An IMG archive is a sector-aligned container: an optional `VER2` header,
//! a fixed-size directory of 32-byte records, then member payloads, each
//! starting on a 2048-byte sector boundary.
//!
//! - **Layout**: `V1` (headerless) or `V2` (`"VER2"` + entry count)
//! - **DirectoryEntry**: start sector, byte size, 24-byte name
//! - **Entry**: a decoded slot, either `Live` or `Empty`
//!
//! ## Example
//!
//! ```rust
//! use imgtool_core::{DirectoryEntry, Layout, Result};
//!
//! fn describe(layout: Layout, entry: &DirectoryEntry) -> Result<()> {
//!     println!("{} member {} at byte {}", layout, entry.name, entry.byte_offset());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod security;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use error::{Error, Result};
pub use security::*;
pub use traits::{MemberFilter, ReadSeek};
pub use types::{
    sector_padding, sectors_for, ArchiveInfo, DirectoryEntry, Entry, Layout, ENTRY_SIZE, NAME_SIZE,
    SECTOR_SIZE, VER2_HEADER_SIZE, VER2_MAGIC,
};
