//! Sector layout planning
//!
//! ```text
//! [header][directory records][zero pad to sector][member 0][pad]...[member n][pad]
//! ```
//!
//! Members are placed in the order given, each on the next free sector.
//! Callers sort members by name so identical member sets produce identical
//! archives.

use crate::directory::stored_name;
use imgtool_core::{
    member_size_to_u32, sectors_for, DirectoryEntry, Error, Layout, Result, ENTRY_SIZE,
    NAME_SIZE, SECTOR_SIZE,
};

/// A name that did not fit the 24-byte field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncatedName {
    pub original: String,
    pub stored: String,
}

/// Computed placement of every member
#[derive(Debug, Clone)]
pub struct LayoutPlan {
    layout: Layout,
    directory_size: u64,
    data_start_sector: u64,
    end_sector: u64,
    entries: Vec<DirectoryEntry>,
    truncated: Vec<TruncatedName>,
    empty: Vec<String>,
}

impl LayoutPlan {
    /// Plan the archive for `(name, byte_length)` pairs in the given order
    ///
    /// # Errors
    ///
    /// `Error::Validation` for a member list with no non-empty member, a
    /// member larger than `u32::MAX` bytes, or a layout whose sectors
    /// overflow the `u32` field.
    ///
    /// Zero-length members are left out of the directory. Readers treat a
    /// record with size 0 as an unused slot, and in a V1 directory such a
    /// record ends the table.
    pub fn compute<'a, I>(layout: Layout, members: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let (members, empty): (Vec<(&str, u64)>, Vec<(&str, u64)>) =
            members.into_iter().partition(|&(_, length)| length > 0);

        for (name, _) in &empty {
            tracing::warn!(
                "Skipping empty file '{}': zero-length members cannot be stored",
                name
            );
        }

        if members.is_empty() {
            return Err(Error::validation("no non-empty members to build an archive from"));
        }

        let entry_count = u32::try_from(members.len())
            .map_err(|_| Error::validation(format!("too many members: {}", members.len())))?;

        let directory_size = layout.header_size() + entry_count as u64 * ENTRY_SIZE as u64;
        let data_start_sector = sectors_for(directory_size);

        let mut running_sector = data_start_sector;
        let mut entries = Vec::with_capacity(members.len());
        let mut truncated = Vec::new();

        for (name, length) in members {
            let byte_size = member_size_to_u32(length, name)?;
            let start_sector = u32::try_from(running_sector).map_err(|_| {
                Error::validation(format!(
                    "archive too large: '{}' would start at sector {}",
                    name, running_sector
                ))
            })?;

            let stored = stored_name(name);
            if stored.len() < name.len() {
                tracing::warn!(
                    "Filename '{}' exceeds {} characters, truncating to '{}'",
                    name,
                    NAME_SIZE,
                    stored
                );
                truncated.push(TruncatedName {
                    original: name.to_string(),
                    stored: stored.clone(),
                });
            }

            entries.push(DirectoryEntry::new(stored, start_sector, byte_size));
            running_sector += sectors_for(length);
        }

        Ok(Self {
            layout,
            directory_size,
            data_start_sector,
            end_sector: running_sector,
            entries,
            truncated,
            empty: empty.into_iter().map(|(name, _)| name.to_string()).collect(),
        })
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Header plus directory table, in bytes
    pub fn directory_size(&self) -> u64 {
        self.directory_size
    }

    /// First sector of the payload region
    pub fn data_start_sector(&self) -> u64 {
        self.data_start_sector
    }

    /// Byte offset of the payload region
    pub fn data_start_byte(&self) -> u64 {
        self.data_start_sector * SECTOR_SIZE
    }

    /// Planned entries, in write order
    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    /// Names that were cut to fit the directory
    pub fn truncated_names(&self) -> &[TruncatedName] {
        &self.truncated
    }

    /// Zero-length members that were left out
    pub fn empty_members(&self) -> &[String] {
        &self.empty
    }

    /// Size of the finished archive in bytes
    pub fn total_size(&self) -> u64 {
        self.end_sector * SECTOR_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_two_members_ver2() {
        let plan = LayoutPlan::compute(Layout::V2, [("a.dat", 10), ("b.dat", 5000)]).unwrap();

        assert_eq!(plan.directory_size(), 72);
        assert_eq!(plan.data_start_sector(), 1);
        assert_eq!(plan.entries()[0], DirectoryEntry::new("a.dat", 1, 10));
        assert_eq!(plan.entries()[1], DirectoryEntry::new("b.dat", 2, 5000));
        assert_eq!(plan.entries()[1].byte_offset(), 4096);
        assert_eq!(plan.total_size(), 5 * 2048);
    }

    #[test]
    fn test_plan_ver1_has_no_header() {
        let plan = LayoutPlan::compute(Layout::V1, [("a.dat", 2048)]).unwrap();
        assert_eq!(plan.directory_size(), 32);
        assert_eq!(plan.data_start_sector(), 1);
        assert_eq!(plan.total_size(), 2 * 2048);
    }

    #[test]
    fn test_plan_large_directory_spans_sectors() {
        let names: Vec<String> = (0..100).map(|i| format!("m{:03}.dat", i)).collect();
        let plan = LayoutPlan::compute(Layout::V2, names.iter().map(|n| (n.as_str(), 1))).unwrap();

        // 8 + 100 * 32 = 3208 bytes -> two sectors
        assert_eq!(plan.data_start_sector(), 2);
        assert_eq!(plan.entries()[99].start_sector, 101);
    }

    #[test]
    fn test_plan_empty_is_rejected() {
        let members: Vec<(&str, u64)> = Vec::new();
        assert!(matches!(
            LayoutPlan::compute(Layout::V2, members),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_plan_truncates_long_names() {
        let plan =
            LayoutPlan::compute(Layout::V2, [("a_very_long_member_name_here.dff", 1)]).unwrap();
        assert_eq!(plan.entries()[0].name, "a_very_long_member_name_");
        assert_eq!(plan.truncated_names().len(), 1);
        assert_eq!(plan.truncated_names()[0].original, "a_very_long_member_name_here.dff");
    }

    #[test]
    fn test_plan_rejects_oversized_member() {
        let result = LayoutPlan::compute(Layout::V2, [("huge.bin", u32::MAX as u64 + 1)]);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_plan_leaves_out_zero_length_members() {
        let plan = LayoutPlan::compute(
            Layout::V1,
            [("a.empty", 0), ("b.dat", 10), ("c.empty", 0), ("d.dat", 1)],
        )
        .unwrap();

        let names: Vec<_> = plan.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["b.dat", "d.dat"]);
        assert_eq!(plan.empty_members(), ["a.empty", "c.empty"]);
        assert_eq!(plan.directory_size(), 64);
        assert!(plan.entries().iter().all(|e| e.byte_size > 0));
    }

    #[test]
    fn test_plan_only_empty_members_is_rejected() {
        let result = LayoutPlan::compute(Layout::V2, [("a.empty", 0)]);
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
