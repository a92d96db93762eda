//! # imgtool Archive
//!
//! File-system facing engine for IMG container archives.
//!
//! - **store**: open an archive for reading (memory-mapped or buffered)
//! - **extract**: write every live member to a directory
//! - **build**: pack member files into a new archive, atomically
//! - **mutate**: add, remove, rename and rebuild through extract + build
//! - **inspect**: list members and summarize space usage
//! - **scratch**: per-operation scratch workspaces
//!
//! ## Example
//!
//! ```rust,no_run
//! use imgtool_archive::{Mutator, ScratchDir};
//! use std::path::{Path, PathBuf};
//!
//! let scratch = ScratchDir::new().unwrap();
//! let mutator = Mutator::new(&scratch);
//! let report = mutator
//!     .add(Path::new("models.img"), &[PathBuf::from("car1.dff")])
//!     .unwrap();
//! println!("added {} file(s)", report.added.len());
//! ```

pub mod build;
pub mod extract;
pub mod inspect;
pub mod mutate;
pub mod scratch;
pub mod store;

pub use build::{build, build_from_dir, collect_members, BuildReport, MemberSource};
pub use extract::{extract, extract_path, ExtractReport, RenamedEntry, SkippedEntry};
pub use inspect::{info, list, Listing};
pub use mutate::{create_backup, AddReport, Mutator, RebuildReport, RemoveReport};
pub use scratch::{ScratchDir, Workspace, SCRATCH_PREFIX};
pub use store::{ArchiveStore, StoreConfig};
