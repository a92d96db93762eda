//! Mutator - add, remove, rename and rebuild
//!
//! Every compound operation has the same shape:
//!
//! ```text
//! detect -> extract into a workspace -> transform member files -> build
//! ```
//!
//! Any failure before the build leaves the original archive untouched, and
//! the build itself replaces the archive atomically. The workspace is removed
//! when the operation returns.
//!
//! In strict mode a mutation that would only partly succeed (inputs not
//! found, filters without a match, members that cannot be extracted) fails
//! before the archive is rewritten.

use crate::build::{build_from_dir, BuildReport};
use crate::extract::extract;
use crate::scratch::{ScratchDir, Workspace};
use crate::store::{ArchiveStore, StoreConfig};
use chrono::Utc;
use imgtool_core::{validate_exact_member_name, Error, Layout, MemberFilter, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Numbered suffixes tried when a backup name is already taken
const MAX_BACKUP_ATTEMPTS: u32 = 1000;

/// Result of adding files
#[derive(Debug, Clone)]
pub struct AddReport {
    /// Member names added or replaced
    pub added: Vec<String>,
    /// Requested paths that were not regular files
    pub missing: Vec<PathBuf>,
    pub build: BuildReport,
}

/// Result of removing members
#[derive(Debug, Clone)]
pub struct RemoveReport {
    pub removed: Vec<String>,
    /// Filters that matched no member
    pub unmatched: Vec<String>,
    pub build: BuildReport,
}

/// Result of a rebuild
#[derive(Debug, Clone)]
pub struct RebuildReport {
    /// Copy of the archive taken before rebuilding; never removed automatically
    pub backup: PathBuf,
    pub old_size: u64,
    pub new_size: u64,
    pub build: BuildReport,
}

impl RebuildReport {
    /// Bytes saved by the rebuild (negative if the archive grew)
    pub fn size_delta(&self) -> i64 {
        self.old_size as i64 - self.new_size as i64
    }
}

/// Runs compound operations inside a caller-provided scratch directory
pub struct Mutator<'a> {
    scratch: &'a ScratchDir,
    config: StoreConfig,
    strict: bool,
}

impl<'a> Mutator<'a> {
    /// Create a mutator with the default store configuration
    pub fn new(scratch: &'a ScratchDir) -> Self {
        Self::with_config(scratch, StoreConfig::default())
    }

    /// Create a mutator with a custom store configuration
    pub fn with_config(scratch: &'a ScratchDir, config: StoreConfig) -> Self {
        Self {
            scratch,
            config,
            strict: false,
        }
    }

    /// Fail with `Error::PartialFailure`, before writing, when only part of
    /// a mutation could be carried out
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Add files to the archive, replacing members with the same file name
    ///
    /// # Errors
    ///
    /// `Error::Validation` if `files` is empty, `Error::NotFound` if none of
    /// them is a regular file, `Error::PartialFailure` in strict mode if any
    /// of them is missing.
    pub fn add(&self, archive: &Path, files: &[PathBuf]) -> Result<AddReport> {
        if files.is_empty() {
            return Err(Error::validation("No files specified to add"));
        }

        let (layout, workspace) = self.expand(archive, "add")?;

        let mut added = Vec::new();
        let mut missing = Vec::new();
        for file in files {
            let basename = match file.file_name().and_then(|n| n.to_str()) {
                Some(name) if file.is_file() => name.to_string(),
                _ => {
                    tracing::warn!("File not found: {}", file.display());
                    missing.push(file.clone());
                    continue;
                }
            };

            fs::copy(file, workspace.member_path(&basename))?;
            tracing::info!("Added: {}", basename);
            added.push(basename);
        }

        if added.is_empty() {
            return Err(Error::not_found("No valid files were added"));
        }

        if self.strict && !missing.is_empty() {
            return Err(Error::PartialFailure {
                operation: "add",
                succeeded: added.len(),
                failed: missing.len(),
            });
        }

        let build = self.commit(layout, &workspace, archive)?;
        tracing::info!("Successfully added {} file(s) to {}", added.len(), archive.display());

        Ok(AddReport {
            added,
            missing,
            build,
        })
    }

    /// Remove every member matching any of `filters`
    ///
    /// # Errors
    ///
    /// `Error::Validation` if `filters` is empty or removal would leave the
    /// archive empty, `Error::NotFound` if nothing matched,
    /// `Error::PartialFailure` in strict mode if any filter matched nothing.
    pub fn remove<F: MemberFilter>(&self, archive: &Path, filters: &[F]) -> Result<RemoveReport> {
        if filters.is_empty() {
            return Err(Error::validation("No files specified to remove"));
        }

        let (layout, workspace) = self.expand(archive, "remove")?;

        let mut removed = Vec::new();
        let mut unmatched = Vec::new();
        for filter in filters {
            let matching: Vec<String> = workspace
                .member_names()?
                .into_iter()
                .filter(|name| filter.matches(name))
                .collect();

            if matching.is_empty() {
                tracing::warn!("File not found: {}", filter.describe());
                unmatched.push(filter.describe());
                continue;
            }

            for name in matching {
                fs::remove_file(workspace.member_path(&name))?;
                tracing::info!("Removed: {}", name);
                removed.push(name);
            }
        }

        if removed.is_empty() {
            return Err(Error::not_found(format!(
                "No files were removed (no match for {})",
                unmatched.join(", ")
            )));
        }

        if self.strict && !unmatched.is_empty() {
            return Err(Error::PartialFailure {
                operation: "remove",
                succeeded: removed.len(),
                failed: unmatched.len(),
            });
        }

        if workspace.member_names()?.is_empty() {
            return Err(Error::validation(
                "Removing these files would leave the archive empty",
            ));
        }

        let build = self.commit(layout, &workspace, archive)?;
        tracing::info!(
            "Successfully removed {} file(s) from {}",
            removed.len(),
            archive.display()
        );

        Ok(RemoveReport {
            removed,
            unmatched,
            build,
        })
    }

    /// Rename one member
    ///
    /// # Errors
    ///
    /// `Error::Validation` for an empty, non-ASCII or overlong new name, or if
    /// `new_name` already exists; `Error::NotFound` if `old_name` does not.
    pub fn rename(&self, archive: &Path, old_name: &str, new_name: &str) -> Result<BuildReport> {
        if old_name.is_empty() || new_name.is_empty() {
            return Err(Error::validation(
                "Both old and new filenames must be specified",
            ));
        }
        validate_exact_member_name(new_name)?;
        if new_name.contains(['/', '\\']) {
            return Err(Error::validation(format!(
                "New filename '{}' must not contain path separators",
                new_name
            )));
        }

        let (layout, workspace) = self.expand(archive, "rename")?;

        let old_path = workspace.member_path(old_name);
        let new_path = workspace.member_path(new_name);
        let names = workspace.member_names()?;

        if !names.iter().any(|n| n == old_name) {
            return Err(Error::not_found(format!(
                "File '{}' not found in archive",
                old_name
            )));
        }

        if names.iter().any(|n| n == new_name) {
            return Err(Error::validation(format!(
                "File '{}' already exists in archive",
                new_name
            )));
        }

        fs::rename(&old_path, &new_path)?;
        tracing::info!("Renamed: {} -> {}", old_name, new_name);

        let build = self.commit(layout, &workspace, archive)?;
        tracing::info!("Successfully renamed file in {}", archive.display());
        Ok(build)
    }

    /// Rewrite the archive in canonical form, keeping a timestamped backup
    ///
    /// The backup is `<archive>.backup.<unix seconds>`, with a numbered
    /// suffix if that name is taken, and is left in place for the operator
    /// to delete.
    pub fn rebuild(&self, archive: &Path) -> Result<RebuildReport> {
        let (layout, workspace) = self.expand(archive, "rebuild")?;
        tracing::info!("Rebuilding {} (format: {})...", archive.display(), layout);

        let backup = create_backup(archive)?;
        tracing::info!("Backup created: {}", backup.display());

        let old_size = fs::metadata(&backup)?.len();
        let build = self.commit(layout, &workspace, archive)?;
        let new_size = fs::metadata(archive)?.len();

        let report = RebuildReport {
            backup,
            old_size,
            new_size,
            build,
        };
        tracing::info!(
            "Rebuild complete: {} -> {} bytes ({} saved)",
            old_size,
            new_size,
            report.size_delta()
        );
        Ok(report)
    }

    /// Extract every member into a fresh workspace
    ///
    /// The store is closed before returning so the archive can be replaced.
    /// Members that cannot be extracted would be missing from the rewritten
    /// archive, which strict mode refuses.
    fn expand(&self, archive: &Path, operation: &'static str) -> Result<(Layout, Workspace)> {
        let workspace = self.scratch.workspace()?;
        let report = {
            let mut store = ArchiveStore::open(archive, self.config)?;
            tracing::info!("Extracting existing IMG...");
            extract(&mut store, workspace.path())?
        };

        let lost = report.lost();
        if self.strict && lost > 0 {
            return Err(Error::PartialFailure {
                operation,
                succeeded: report.count(),
                failed: lost,
            });
        }

        for skipped in &report.skipped {
            tracing::warn!(
                "Member '{}' will be dropped from the rewritten archive: {}",
                skipped.name,
                skipped.reason
            );
        }
        if report.unreadable_records > 0 {
            tracing::warn!(
                "{} unreadable directory records will be dropped from the rewritten archive",
                report.unreadable_records
            );
        }
        for renamed in &report.renamed {
            tracing::warn!(
                "Member '{}' will be stored as '{}' in the rewritten archive",
                renamed.stored,
                renamed.file_name
            );
        }

        Ok((report.layout, workspace))
    }

    fn commit(&self, layout: Layout, workspace: &Workspace, archive: &Path) -> Result<BuildReport> {
        tracing::info!("Rebuilding IMG...");
        build_from_dir(layout, workspace.path(), archive)
    }
}

/// Copy `archive` to `<archive>.backup.<unix seconds>`
///
/// An existing file is never overwritten: if the name is taken, `.1`, `.2`
/// and so on are appended until a free one is found.
pub fn create_backup(archive: &Path) -> Result<PathBuf> {
    let mut source = File::open(archive).map_err(|e| Error::from_io_at(e, archive))?;
    let permissions = source.metadata()?.permissions();
    let timestamp = Utc::now().timestamp();

    for attempt in 0..MAX_BACKUP_ATTEMPTS {
        let candidate = backup_path(archive, timestamp, attempt);
        let mut target = match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        };

        let copied = io::copy(&mut source, &mut target).and_then(|_| target.sync_all());
        if let Err(e) = copied {
            drop(target);
            let _ = fs::remove_file(&candidate);
            return Err(e.into());
        }

        fs::set_permissions(&candidate, permissions)?;
        return Ok(candidate);
    }

    Err(Error::validation(format!(
        "no free backup name for {} after {} attempts",
        archive.display(),
        MAX_BACKUP_ATTEMPTS
    )))
}

fn backup_path(archive: &Path, timestamp: i64, attempt: u32) -> PathBuf {
    let mut name = archive.as_os_str().to_owned();
    name.push(format!(".backup.{}", timestamp));
    if attempt > 0 {
        name.push(format!(".{}", attempt));
    }
    PathBuf::from(name)
}
