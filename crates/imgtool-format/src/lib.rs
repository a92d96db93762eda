//! # imgtool Format
//!
//! Binary-format logic for IMG archives over any `Read + Seek` stream:
//! - **detect**: classify a store as V1, V2 or unrecognized
//! - **directory**: decode and encode the 32-byte directory records
//! - **plan**: assign sectors to members
//! - **writer**: stream a planned archive to any `Write`
//!
//! ## Example
//!
//! ```rust,no_run
//! use imgtool_format::Directory;
//! use std::fs::File;
//!
//! let mut file = File::open("models.img").unwrap();
//! let directory = Directory::load(&mut file).unwrap();
//! for entry in directory.live_entries() {
//!     println!("{}", entry);
//! }
//! ```

pub mod detect;
pub mod directory;
pub mod plan;
pub mod writer;

pub use detect::{detect, require_layout, resolve_entry_count};
pub use directory::{decode_name, decode_record, encode_name, encode_record, Directory};
pub use plan::{LayoutPlan, TruncatedName};
pub use writer::ArchiveWriter;
