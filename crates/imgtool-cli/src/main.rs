//! imgtool - IMG container archive tool
//!
//! Extract, create, add, delete, rename, rebuild, list and inspect
//! RenderWare-style IMG archives (VER1 and VER2).

mod filter;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use filter::GlobFilter;
use imgtool_archive::{
    build_from_dir, extract_path, info, list, ArchiveStore, Mutator, ScratchDir, StoreConfig,
};
use imgtool_core::{Error, Layout, MemberFilter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Exit code for an operation that failed
const EXIT_FAILURE: u8 = 1;
/// Exit code for an unrecognized or corrupt archive
const EXIT_BAD_ARCHIVE: u8 = 3;
/// Exit code for partial success under `--strict`
const EXIT_PARTIAL: u8 = 4;

#[derive(Parser)]
#[command(name = "imgtool")]
#[command(about = "Handles RenderWare IMG archives (VER1 and VER2)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "IMGTOOL_LOG", default_value = "info", global = true)]
    log_level: String,

    /// Read archives with plain file I/O instead of memory mapping
    #[arg(long, global = true)]
    no_mmap: bool,

    /// Print list and info output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Fail when only part of a batch succeeded
    #[arg(long, global = true)]
    strict: bool,

    /// Parent directory for scratch workspaces (default: system temp)
    #[arg(long, global = true)]
    scratch_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract files from IMG
    #[command(visible_alias = "e")]
    Extract {
        /// IMG file to extract from
        img_file: PathBuf,
        /// Output directory
        output_dir: PathBuf,
    },

    /// Create IMG from directory
    #[command(visible_alias = "c")]
    Create {
        /// IMG format version (ver1 or ver2)
        format: String,
        /// IMG file to create
        img_file: PathBuf,
        /// Input directory
        input_dir: PathBuf,
    },

    /// Add files to IMG
    #[command(visible_alias = "a")]
    Add {
        /// IMG file to modify
        img_file: PathBuf,
        /// Files to add
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Remove files from IMG
    #[command(name = "del", visible_alias = "d")]
    Delete {
        /// IMG file to modify
        img_file: PathBuf,
        /// Files to remove (wildcards allowed)
        #[arg(required = true)]
        patterns: Vec<String>,
    },

    /// Rename file in IMG
    #[command(visible_alias = "r")]
    Rename {
        /// IMG file to modify
        img_file: PathBuf,
        /// Current filename
        old_name: String,
        /// New filename
        new_name: String,
    },

    /// Rebuild/optimize IMG
    #[command(visible_alias = "R")]
    Rebuild {
        /// IMG file to rebuild
        img_file: PathBuf,
    },

    /// List IMG contents
    #[command(visible_alias = "l")]
    List {
        /// IMG file to list
        img_file: PathBuf,
        /// Filter pattern
        filter: Option<String>,
    },

    /// Show IMG information
    #[command(visible_alias = "i")]
    Info {
        /// IMG file to analyze
        img_file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = StoreConfig {
        use_mmap: !cli.no_mmap,
    };
    tracing::debug!(use_mmap = config.use_mmap, strict = cli.strict, "Starting imgtool");

    match cli.command {
        Command::Extract {
            img_file,
            output_dir,
        } => {
            let report = extract_path(&img_file, &output_dir, config)?;
            println!(
                "Extracted {} file(s) from {} ({})",
                report.count(),
                img_file.display(),
                report.layout
            );
            if cli.strict {
                report.ensure_complete()?;
            }
        }

        Command::Create {
            format,
            img_file,
            input_dir,
        } => {
            let layout: Layout = format.parse()?;
            let report = build_from_dir(layout, &input_dir, &img_file)?;
            println!(
                "{} IMG file created: {} ({} files, {} bytes)",
                layout,
                img_file.display(),
                report.entries.len(),
                report.total_size
            );
        }

        Command::Add { img_file, files } => {
            let scratch = scratch_dir(cli.scratch_dir.as_deref())?;
            let report = mutator(&scratch, config, cli.strict).add(&img_file, &files)?;
            println!(
                "Successfully added {} file(s) to {}",
                report.added.len(),
                img_file.display()
            );
        }

        Command::Delete { img_file, patterns } => {
            let filters = GlobFilter::compile_all(&patterns)?;
            let scratch = scratch_dir(cli.scratch_dir.as_deref())?;
            let report = mutator(&scratch, config, cli.strict).remove(&img_file, &filters)?;
            println!(
                "Successfully removed {} file(s) from {}",
                report.removed.len(),
                img_file.display()
            );
        }

        Command::Rename {
            img_file,
            old_name,
            new_name,
        } => {
            let scratch = scratch_dir(cli.scratch_dir.as_deref())?;
            mutator(&scratch, config, cli.strict).rename(&img_file, &old_name, &new_name)?;
            println!("Renamed: {} -> {}", old_name, new_name);
        }

        Command::Rebuild { img_file } => {
            let scratch = scratch_dir(cli.scratch_dir.as_deref())?;
            let report = mutator(&scratch, config, cli.strict).rebuild(&img_file)?;
            output::print_rebuild(&report);
        }

        Command::List { img_file, filter } => {
            let filter = filter.as_deref().map(GlobFilter::new).transpose()?;
            let mut store = ArchiveStore::open(&img_file, config)?;
            let listing = list(&mut store, filter.as_ref().map(|f| f as &dyn MemberFilter))?;

            if cli.json {
                output::print_json(&listing)?;
            } else {
                output::print_listing(&img_file.display().to_string(), &listing);
            }
        }

        Command::Info { img_file } => {
            let mut store = ArchiveStore::open(&img_file, config)?;
            let summary = match info(&mut store) {
                Ok(summary) => summary,
                Err(e @ Error::Format(_)) => {
                    if cli.json {
                        output::print_json(&serde_json::json!({
                            "format": "INVALID",
                            "store_size": store.length(),
                        }))?;
                    } else {
                        output::print_invalid(&img_file.display().to_string(), store.length());
                    }
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            };

            if cli.json {
                output::print_json(&summary)?;
            } else {
                output::print_info(&img_file.display().to_string(), &summary);
            }
        }
    }

    Ok(())
}

fn scratch_dir(parent: Option<&Path>) -> Result<ScratchDir> {
    let scratch = match parent {
        Some(parent) => ScratchDir::new_in(parent),
        None => ScratchDir::new(),
    };
    scratch.context("cannot create scratch directory")
}

fn mutator(scratch: &ScratchDir, config: StoreConfig, strict: bool) -> Mutator<'_> {
    Mutator::with_config(scratch, config).strict(strict)
}

fn exit_code_for(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<Error>() {
        Some(Error::Format(_)) => EXIT_BAD_ARCHIVE,
        Some(Error::PartialFailure { .. }) => EXIT_PARTIAL,
        _ => EXIT_FAILURE,
    }
}
