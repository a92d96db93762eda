//! Scratch directories for compound operations
//!
//! A [`ScratchDir`] is created by the caller and passed to every compound
//! operation. Each operation takes its own workspace inside it, which is
//! removed when the operation ends, whether it succeeded or not.

use imgtool_core::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix for scratch directories in the system temp location
pub const SCRATCH_PREFIX: &str = "imgtool_";

/// Parent directory for per-operation workspaces
#[derive(Debug)]
pub struct ScratchDir {
    root: TempDir,
}

impl ScratchDir {
    /// Create a scratch directory in the system temp location
    pub fn new() -> Result<Self> {
        let root = tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?;
        tracing::debug!("Scratch directory: {}", root.path().display());
        Ok(Self { root })
    }

    /// Create a scratch directory inside `parent`
    pub fn new_in(parent: &Path) -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(parent)?;
        tracing::debug!("Scratch directory: {}", root.path().display());
        Ok(Self { root })
    }

    /// Location on disk
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// A fresh, empty workspace for one operation
    pub fn workspace(&self) -> Result<Workspace> {
        let dir = tempfile::Builder::new()
            .prefix("img_work")
            .tempdir_in(self.root.path())?;
        Ok(Workspace { dir })
    }

    /// Remove the scratch directory, reporting any failure
    pub fn close(self) -> Result<()> {
        self.root.close()?;
        Ok(())
    }
}

/// Member files of one archive while it is being transformed
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a member file inside the workspace
    pub fn member_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Names of the member files currently present, sorted
    pub fn member_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.dir.path())? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
