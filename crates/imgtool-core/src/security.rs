//! Safety limits and validation helpers
//!
//! Everything read from a directory is untrusted: sizes feed allocations and
//! names feed file-system paths.

use crate::Error;
use crate::types::{NAME_SIZE, SECTOR_SIZE};

/// Hard ceiling on records scanned when inferring a V1 directory length
pub const MAX_V1_ENTRIES: u32 = 10_000;

/// Byte offset of a sector, with overflow checking
pub fn checked_sector_offset(sector: u64, context: &str) -> crate::Result<u64> {
    sector
        .checked_mul(SECTOR_SIZE)
        .ok_or_else(|| Error::format(format!("{}: sector offset overflow", context)))
}

/// Convert a member length to the on-disk `u32` size field
pub fn member_size_to_u32(size: u64, name: &str) -> crate::Result<u32> {
    size.try_into().map_err(|_| {
        Error::validation(format!(
            "member '{}' is {} bytes, larger than the format allows ({})",
            name,
            size,
            u32::MAX
        ))
    })
}

/// Validate a member name for storage in a directory record
///
/// Names must be non-empty ASCII without NUL. Length is not checked here;
/// overlong names are truncated by the encoder.
pub fn validate_member_name(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(Error::validation("member name is empty"));
    }

    if !name.is_ascii() {
        return Err(Error::validation(format!(
            "member name '{}' is not ASCII",
            name
        )));
    }

    if name.contains('\0') {
        return Err(Error::validation(format!(
            "member name '{}' contains a NUL byte",
            name.escape_default()
        )));
    }

    Ok(())
}

/// Validate a name that must fit the name field without truncation
pub fn validate_exact_member_name(name: &str) -> crate::Result<()> {
    validate_member_name(name)?;

    if name.len() > NAME_SIZE {
        return Err(Error::validation(format!(
            "name '{}' exceeds {} character limit",
            name, NAME_SIZE
        )));
    }

    Ok(())
}

/// Sanitize a member name decoded from an archive before using it as a path
///
/// Removes path separators and control characters, then trims leading and
/// trailing dots and spaces so `..` cannot escape the destination.
pub fn sanitize_extracted_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|&c| c != '/' && c != '\\')
        .filter(|&c| !c.is_control())
        .collect::<String>()
        .trim_start_matches(|c| c == '.' || c == ' ')
        .trim_end_matches(|c| c == '.' || c == ' ')
        .to_string()
}
