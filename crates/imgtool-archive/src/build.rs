//! Builder - write a complete archive from member files
//!
//! The archive is written into a temporary file next to the destination and
//! renamed over it only once every byte has been written and synced. A failed
//! build never leaves a half-written store behind.

use imgtool_core::{validate_member_name, DirectoryEntry, Error, Layout, Result};
use imgtool_format::{ArchiveWriter, LayoutPlan, TruncatedName};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// One member file to be packed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSource {
    pub name: String,
    pub path: PathBuf,
    pub length: u64,
}

impl MemberSource {
    /// Describe the file at `path`, named by its file name
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|e| Error::from_io_at(e, path))?;
        if !metadata.is_file() {
            return Err(Error::not_found(format!("not a regular file: {}", path.display())));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::validation(format!("unusable file name: {}", path.display())))?
            .to_string();

        Ok(Self {
            name,
            path: path.to_path_buf(),
            length: metadata.len(),
        })
    }
}

/// Result of a build
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub layout: Layout,
    /// Directory as written
    pub entries: Vec<DirectoryEntry>,
    /// Names cut to fit the 24-byte field
    pub truncated: Vec<TruncatedName>,
    /// Zero-length files that were not stored
    pub empty: Vec<String>,
    /// Size of the new archive in bytes
    pub total_size: u64,
}

/// Regular files in `dir`, sorted by name
///
/// # Errors
///
/// `Error::NotFound` if `dir` does not exist, `Error::Validation` if it holds
/// no files or a file name is not valid ASCII.
pub fn collect_members(dir: &Path) -> Result<Vec<MemberSource>> {
    if !dir.is_dir() {
        return Err(Error::not_found(format!(
            "Input directory not found: {}",
            dir.display()
        )));
    }

    let mut members = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let member = MemberSource::from_path(&entry.path())?;
        validate_member_name(&member.name)?;
        members.push(member);
    }

    if members.is_empty() {
        return Err(Error::validation(format!(
            "No files found in directory: {}",
            dir.display()
        )));
    }

    members.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(members)
}

/// Build an archive at `destination` from `members`, in the order given
///
/// # Errors
///
/// `Error::Validation` for an empty member list or an invalid name, I/O
/// errors while reading members or writing the archive. On error the
/// destination is left as it was.
pub fn build(layout: Layout, members: &[MemberSource], destination: &Path) -> Result<BuildReport> {
    for member in members {
        validate_member_name(&member.name)?;
    }

    let plan = LayoutPlan::compute(layout, members.iter().map(|m| (m.name.as_str(), m.length)))?;
    tracing::info!("Creating {} IMG with {} files", layout, plan.entries().len());
    tracing::debug!(
        "Directory size {} bytes, data starts at sector {}",
        plan.directory_size(),
        plan.data_start_sector()
    );

    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let temp = tempfile::Builder::new()
        .prefix(".imgtool-")
        .suffix(".tmp")
        .tempfile_in(parent)?;

    let mut writer = ArchiveWriter::new(BufWriter::new(temp), plan)?;
    for member in members.iter().filter(|m| m.length > 0) {
        let file = File::open(&member.path).map_err(|e| Error::from_io_at(e, &member.path))?;
        writer.write_member(&mut BufReader::new(file))?;
        tracing::info!("Added: {} (size: {})", member.name, member.length);
    }

    let report = BuildReport {
        layout,
        entries: writer.plan().entries().to_vec(),
        truncated: writer.plan().truncated_names().to_vec(),
        empty: writer.plan().empty_members().to_vec(),
        total_size: writer.plan().total_size(),
    };

    let temp = writer
        .finish()?
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;
    temp.as_file().sync_all()?;

    if let Ok(existing) = fs::metadata(destination) {
        fs::set_permissions(temp.path(), existing.permissions())?;
    }

    temp.persist(destination).map_err(|e| Error::Io(e.error))?;
    tracing::info!("{} IMG file created: {}", layout, destination.display());

    Ok(report)
}

/// Build an archive from every regular file in `dir`, sorted by name
pub fn build_from_dir(layout: Layout, dir: &Path, destination: &Path) -> Result<BuildReport> {
    let members = collect_members(dir)?;
    build(layout, &members, destination)
}
