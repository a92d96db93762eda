//! Extractor - materialize every live member as a file
//!
//! Extraction is best-effort per entry: an entry whose payload cannot be read
//! or written is logged and skipped, and the rest continue. The operation as
//! a whole succeeds as long as the directory could be decoded.

use crate::store::{ArchiveStore, StoreConfig};
use imgtool_core::{sanitize_extracted_filename, DirectoryEntry, Error, Layout, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// A member that could not be extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: String,
}

/// A member written under a different file name than its stored name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedEntry {
    pub stored: String,
    pub file_name: String,
}

/// Result of an extraction
#[derive(Debug, Clone)]
pub struct ExtractReport {
    /// Layout the archive was detected as
    pub layout: Layout,
    /// Entries written, in directory order, under their on-disk file names
    pub extracted: Vec<DirectoryEntry>,
    /// Entries that were skipped and why
    pub skipped: Vec<SkippedEntry>,
    /// Entries whose names had to be sanitized
    pub renamed: Vec<RenamedEntry>,
    /// Directory records the store was too short to hold
    pub unreadable_records: u32,
}

impl ExtractReport {
    /// Number of members written
    pub fn count(&self) -> usize {
        self.extracted.len()
    }

    /// Entries in the directory that were not written
    pub fn lost(&self) -> usize {
        self.skipped.len() + self.unreadable_records as usize
    }

    /// Turn any skipped entry into `Error::PartialFailure`
    pub fn ensure_complete(self) -> Result<Self> {
        let failed = self.lost();
        if failed > 0 {
            return Err(Error::PartialFailure {
                operation: "extract",
                succeeded: self.extracted.len(),
                failed,
            });
        }
        Ok(self)
    }
}

/// Extract all live members of `store` into `destination`
///
/// Creates `destination` if needed. Existing files with member names are
/// overwritten; unrelated files are left alone.
///
/// # Errors
///
/// `Error::Format` if the store is not a recognizable archive, or an I/O
/// error if the destination directory cannot be created.
pub fn extract(store: &mut ArchiveStore, destination: &Path) -> Result<ExtractReport> {
    let directory = store.directory()?;
    fs::create_dir_all(destination)?;

    tracing::info!(
        "Extracting {} entries ({})",
        directory.declared_count(),
        directory.layout()
    );

    let mut extracted = Vec::new();
    let mut skipped = Vec::new();
    let mut renamed = Vec::new();

    for entry in directory.live_entries() {
        let file_name = sanitize_extracted_filename(&entry.name);
        if file_name.is_empty() {
            tracing::warn!("Skipping entry with unusable name '{}'", entry.name);
            skipped.push(SkippedEntry {
                name: entry.name.clone(),
                reason: "name is empty after sanitizing".to_string(),
            });
            continue;
        }

        let output_path = destination.join(&file_name);
        match extract_entry(store, entry, &output_path) {
            Ok(()) => {
                tracing::info!("Extracting: {} (size: {} bytes)", file_name, entry.byte_size);
                if file_name != entry.name {
                    tracing::warn!("Entry '{}' extracted as '{}'", entry.name, file_name);
                    renamed.push(RenamedEntry {
                        stored: entry.name.clone(),
                        file_name: file_name.clone(),
                    });
                }
                extracted.push(DirectoryEntry::new(file_name, entry.start_sector, entry.byte_size));
            }
            Err(e) => {
                tracing::warn!("Error extracting '{}': {}", entry.name, e);
                skipped.push(SkippedEntry {
                    name: entry.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(ExtractReport {
        layout: directory.layout(),
        extracted,
        skipped,
        renamed,
        unreadable_records: directory.unreadable(),
    })
}

/// Open the archive at `path` and extract it into `destination`
pub fn extract_path(path: &Path, destination: &Path, config: StoreConfig) -> Result<ExtractReport> {
    let mut store = ArchiveStore::open(path, config)?;
    extract(&mut store, destination)
}

fn extract_entry(
    store: &mut ArchiveStore,
    entry: &DirectoryEntry,
    output_path: &Path,
) -> Result<()> {
    let file = File::create(output_path)?;
    let mut out = BufWriter::new(file);

    let result = store
        .copy_member(entry, &mut out)
        .and_then(|_| out.flush().map_err(Error::from));

    if result.is_err() {
        drop(out);
        let _ = fs::remove_file(output_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgtool_format::{ArchiveWriter, LayoutPlan};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn archive_bytes(layout: Layout, members: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let plan = LayoutPlan::compute(
            layout,
            members.iter().map(|(name, data)| (*name, data.len() as u64)),
        )
        .unwrap();
        let mut writer = ArchiveWriter::new(Vec::new(), plan).unwrap();
        for (_, data) in members {
            writer.write_member(&mut data.as_slice()).unwrap();
        }
        writer.finish().unwrap()
    }

    fn store_of(data: Vec<u8>) -> ArchiveStore {
        let length = data.len() as u64;
        ArchiveStore::from_stream(Cursor::new(data), length)
    }

    fn record(start_sector: u32, byte_size: u32, name: &[u8]) -> Vec<u8> {
        let mut rec = vec![0u8; 32];
        rec[0..4].copy_from_slice(&start_sector.to_le_bytes());
        rec[4..8].copy_from_slice(&byte_size.to_le_bytes());
        rec[8..8 + name.len()].copy_from_slice(name);
        rec
    }

    #[test]
    fn test_extract_round_trip_both_layouts() {
        let members = vec![
            ("a.dat", vec![1u8; 10]),
            ("b.dat", (0..5000u32).map(|i| i as u8).collect::<Vec<_>>()),
            ("exactly_twenty_four_.dff", vec![9u8; 2048]),
        ];

        for layout in [Layout::V1, Layout::V2] {
            let dir = tempdir().unwrap();
            let mut store = store_of(archive_bytes(layout, &members));

            let report = extract(&mut store, dir.path()).unwrap();
            assert_eq!(report.layout, layout);
            assert_eq!(report.count(), 3);
            assert!(report.skipped.is_empty());

            for (name, data) in &members {
                assert_eq!(&fs::read(dir.path().join(name)).unwrap(), data);
            }
        }
    }

    #[test]
    fn test_extract_creates_destination_and_keeps_unrelated_files() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out").join("nested");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("unrelated.txt"), b"keep").unwrap();
        fs::write(dest.join("a.dat"), b"old contents").unwrap();

        let mut store = store_of(archive_bytes(Layout::V2, &[("a.dat", vec![5u8; 3])]));
        extract(&mut store, &dest).unwrap();

        assert_eq!(fs::read(dest.join("a.dat")).unwrap(), vec![5u8; 3]);
        assert_eq!(fs::read(dest.join("unrelated.txt")).unwrap(), b"keep");
    }

    #[test]
    fn test_extract_invalid_store() {
        let dir = tempdir().unwrap();
        let mut store = store_of(vec![0u8; 4096]);
        assert!(matches!(extract(&mut store, dir.path()), Err(Error::Format(_))));
    }

    #[test]
    fn test_extract_skips_out_of_range_entry() {
        let mut data = b"VER2".to_vec();
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend(record(1, 4, b"good.dat"));
        data.extend(record(500, 4, b"bad.dat"));
        data.resize(2048, 0);
        data.extend_from_slice(b"GOOD");
        data.resize(4096, 0);

        let dir = tempdir().unwrap();
        let report = extract(&mut store_of(data), dir.path()).unwrap();

        assert_eq!(report.count(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].name, "bad.dat");
        assert_eq!(fs::read(dir.path().join("good.dat")).unwrap(), b"GOOD");
        assert!(!dir.path().join("bad.dat").exists());
        assert!(matches!(
            report.ensure_complete(),
            Err(Error::PartialFailure { succeeded: 1, failed: 1, .. })
        ));
    }

    #[test]
    fn test_extract_sanitizes_names() {
        let mut data = b"VER2".to_vec();
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend(record(1, 4, b"../evil.dat"));
        data.extend(record(1, 4, b".."));
        data.resize(2048, 0);
        data.extend_from_slice(b"EVIL");
        data.resize(4096, 0);

        let root = tempdir().unwrap();
        let dest = root.path().join("dest");
        let report = extract(&mut store_of(data), &dest).unwrap();

        assert_eq!(report.extracted[0].name, "evil.dat");
        assert_eq!(
            report.renamed,
            [RenamedEntry {
                stored: "../evil.dat".to_string(),
                file_name: "evil.dat".to_string(),
            }]
        );
        assert!(dest.join("evil.dat").exists());
        assert!(!root.path().join("evil.dat").exists());
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn test_extract_zero_members_still_succeeds() {
        let mut data = b"VER2".to_vec();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend(record(1, 0, b"empty.dat"));
        data.resize(2048, 0);

        let dir = tempdir().unwrap();
        let report = extract(&mut store_of(data), dir.path()).unwrap();
        assert_eq!(report.count(), 0);
        assert!(report.ensure_complete().is_ok());
    }

    #[test]
    fn test_extract_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models.img");
        fs::write(&path, archive_bytes(Layout::V1, &[("car.dff", vec![3u8; 100])])).unwrap();

        let out = dir.path().join("extracted");
        let report = extract_path(&path, &out, StoreConfig::default()).unwrap();
        assert_eq!(report.count(), 1);
        assert_eq!(fs::read(out.join("car.dff")).unwrap(), vec![3u8; 100]);
    }
}
