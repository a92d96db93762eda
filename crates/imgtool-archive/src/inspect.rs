//! Read-only queries: list members and summarize an archive

use crate::store::ArchiveStore;
use imgtool_core::{ArchiveInfo, DirectoryEntry, Layout, MemberFilter, Result};
use serde::Serialize;

/// Members of an archive, optionally filtered
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub format: Layout,
    /// Entry count declared by the header or inferred by scanning
    pub entry_count: u32,
    /// Filter the listing was restricted to
    pub filter: Option<String>,
    /// Matching live entries in directory order
    pub entries: Vec<DirectoryEntry>,
}

/// List live members, keeping only those matching `filter` if one is given
pub fn list(store: &mut ArchiveStore, filter: Option<&dyn MemberFilter>) -> Result<Listing> {
    let directory = store.directory()?;

    let entries = directory
        .live_entries()
        .filter(|entry| filter.map_or(true, |f| f.matches(&entry.name)))
        .cloned()
        .collect();

    Ok(Listing {
        format: directory.layout(),
        entry_count: directory.declared_count(),
        filter: filter.map(|f| f.describe()),
        entries,
    })
}

/// Summarize layout geometry and space efficiency
pub fn info(store: &mut ArchiveStore) -> Result<ArchiveInfo> {
    let directory = store.directory()?;
    Ok(ArchiveInfo::compute(
        directory.layout(),
        directory.declared_count(),
        directory.total_payload_bytes(),
        store.length(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgtool_core::Error;
    use imgtool_format::{ArchiveWriter, LayoutPlan};
    use std::io::Cursor;

    struct Suffix(&'static str);

    impl MemberFilter for Suffix {
        fn matches(&self, name: &str) -> bool {
            name.ends_with(self.0)
        }

        fn describe(&self) -> String {
            format!("*{}", self.0)
        }
    }

    fn store() -> ArchiveStore {
        let members: [(&str, usize); 3] = [("car.dff", 10), ("car.txd", 5000), ("bike.dff", 2048)];
        let plan = LayoutPlan::compute(
            Layout::V2,
            members.iter().map(|(name, len)| (*name, *len as u64)),
        )
        .unwrap();
        let mut writer = ArchiveWriter::new(Vec::new(), plan).unwrap();
        for (_, len) in members {
            writer.write_member(&mut vec![0x11u8; len].as_slice()).unwrap();
        }
        let data = writer.finish().unwrap();
        let length = data.len() as u64;
        ArchiveStore::from_stream(Cursor::new(data), length)
    }

    #[test]
    fn test_list_all() {
        let listing = list(&mut store(), None).unwrap();
        assert_eq!(listing.format, Layout::V2);
        assert_eq!(listing.entry_count, 3);
        assert_eq!(listing.entries.len(), 3);
        assert_eq!(listing.entries[1], DirectoryEntry::new("car.txd", 2, 5000));
        assert!(listing.filter.is_none());
    }

    #[test]
    fn test_list_filtered() {
        let filter = Suffix(".dff");
        let listing = list(&mut store(), Some(&filter)).unwrap();
        let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["car.dff", "bike.dff"]);
        assert_eq!(listing.filter.as_deref(), Some("*.dff"));
    }

    #[test]
    fn test_info() {
        let info = info(&mut store()).unwrap();
        assert_eq!(info.format, Layout::V2);
        assert_eq!(info.entry_count, 3);
        assert_eq!(info.header_size, 8);
        assert_eq!(info.directory_size, 104);
        assert_eq!(info.data_start_sector, 1);
        assert_eq!(info.total_payload_bytes, 7058);
        // 1 directory sector + 1 + 3 + 1 payload sectors
        assert_eq!(info.store_size, 6 * 2048);
        assert_eq!(info.overhead_bytes, 6 * 2048 - 7058);
        assert_eq!(info.efficiency_pct, 57);
    }

    #[test]
    fn test_info_invalid_store() {
        let mut store = ArchiveStore::from_stream(Cursor::new(vec![0u8; 64]), 64);
        assert!(matches!(info(&mut store), Err(Error::Format(_))));
    }
}
