//! Human-readable and JSON output

use imgtool_archive::{Listing, RebuildReport};
use imgtool_core::ArchiveInfo;
use serde::Serialize;

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_listing(path: &str, listing: &Listing) {
    println!("IMG File: {} (Format: {})", path, listing.format);
    println!("Files: {}", listing.entry_count);
    if let Some(ref filter) = listing.filter {
        println!("Filter: {}", filter);
    }
    println!("{}", "-".repeat(46));
    println!("{:<24} {:>10} {:>10}", "Filename", "Size", "Sector");
    println!("{}", "-".repeat(46));

    for entry in &listing.entries {
        println!("{}", entry);
    }

    if listing.filter.is_some() {
        println!("{}", "-".repeat(46));
        println!("Displayed: {} files (filtered)", listing.entries.len());
    }
}

pub fn print_info(path: &str, info: &ArchiveInfo) {
    println!("IMG File Information");
    println!("{}", "=".repeat(20));
    println!("File: {}", path);
    println!("Size: {} bytes ({})", info.store_size, format_bytes(info.store_size));
    println!("Format: {}", info.format);
    println!("Status: Valid");
    println!("Entries: {}", info.entry_count);
    println!("Header size: {} bytes", info.header_size);
    println!("Directory size: {} bytes", info.directory_size);
    println!(
        "Data starts at: sector {} (byte {})",
        info.data_start_sector, info.data_start_byte
    );
    println!("Total data size: {} bytes", info.total_payload_bytes);
    println!("Overhead: {} bytes", info.overhead_bytes);
    if info.store_size > 0 {
        println!("Efficiency: {}%", info.efficiency_pct);
    }
}

/// Info output for a store that is not a recognizable archive
pub fn print_invalid(path: &str, store_size: u64) {
    println!("IMG File Information");
    println!("{}", "=".repeat(20));
    println!("File: {}", path);
    println!("Size: {} bytes ({})", store_size, format_bytes(store_size));
    println!("Format: INVALID");
}

pub fn print_rebuild(report: &RebuildReport) {
    println!("Rebuild complete!");
    println!("Backup: {}", report.backup.display());
    println!("Original size: {} bytes", report.old_size);
    println!("New size: {} bytes", report.new_size);

    let delta = report.size_delta();
    match delta.signum() {
        1 => println!("Space saved: {} bytes", delta),
        -1 => println!("Size increased: {} bytes", -delta),
        _ => println!("Size unchanged"),
    }
}

/// Format size in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1_048_576 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else if bytes < 1_073_741_824 {
        format!("{:.2} MB", bytes as f64 / 1_048_576.0)
    } else {
        format!("{:.2} GB", bytes as f64 / 1_073_741_824.0)
    }
}
