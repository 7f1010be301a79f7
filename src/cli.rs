//! Command-line interface module for vidtidy.
//!
//! This module handles:
//! - Argument parsing
//! - Settings loading and the probe thread pool
//! - Dispatching to the classification engine and reporting results

use crate::cache::CacheHandle;
use crate::config::Settings;
use crate::engine::{ClassificationEngine, ClassifyReport};
use crate::output::OutputFormatter;
use crate::probe::FfprobeProbe;
use crate::strategy::Strategy;
use crate::views::{SortKey, View};
use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Sort a folder of videos into subdirectories.
#[derive(Debug, Parser)]
#[command(name = "vidtidy", version, about)]
pub struct Cli {
    /// Directory holding the videos (overrides ROOT_DIR)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Move files into subdirectories chosen by a strategy
    Classify {
        #[arg(value_enum)]
        strategy: Strategy,

        /// Record decisions and show them without moving anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Show file properties grouped by classification
    Print {
        #[arg(value_enum, default_value_t = View::All)]
        view: View,

        #[arg(long, value_enum)]
        sort: Option<SortKey>,

        /// Measure keyframe spacing before printing
        #[arg(long)]
        keyframes: bool,
    },
    /// Move every file in every subdirectory back to the root
    Unclassify {
        /// Only forget dry-run decisions
        #[arg(long)]
        pseudo_only: bool,
    },
}

/// Runs one command.
///
/// # Errors
///
/// Returns an error if settings can't be loaded, no root directory is
/// configured, or the root can't be read.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use vidtidy::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["vidtidy", "--root", "/videos", "print", "ratio"]);
/// if let Err(e) = run_cli(cli) {
///     eprintln!("Error: {e:#}");
/// }
/// ```
pub fn run_cli(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let root = cli
        .root
        .or_else(|| settings.root_dir.clone())
        .ok_or_else(|| anyhow!("No root directory: pass --root or set ROOT_DIR"))?;

    if settings.probe.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(settings.probe.threads)
            .build_global()
            .context("Failed to configure probe threads")?;
    }

    let probe = FfprobeProbe::new(&settings.probe.ffprobe_path);
    if !probe.is_available() {
        OutputFormatter::warning(&format!(
            "{} is not runnable; every file will be reported with unknown properties",
            settings.probe.ffprobe_path
        ));
    }

    let engine = ClassificationEngine::from_settings(&root, probe, &settings)
        .context("Invalid exception rules")?;
    let mut cache = CacheHandle::new();

    OutputFormatter::info(&format!("Analyzing {}", root.display()));
    let loaded = engine.load(&mut cache)?;
    debug!(files = loaded.table().len(), "cache warm");

    match cli.command {
        Command::Classify { strategy, dry_run } => {
            let report = engine.classify(&mut cache, strategy, dry_run)?;
            if dry_run {
                OutputFormatter::dry_run_notice(&format!(
                    "{} files would be moved by {}",
                    report.classified.len(),
                    strategy
                ));
                engine.print(&mut cache, View::from(strategy), None)?;
            } else {
                report_classification(&report);
            }
        }
        Command::Print {
            view,
            sort,
            keyframes,
        } => {
            if keyframes || view == View::Keyframe {
                engine.include_keyframe_interval(&mut cache, true)?;
            }
            engine.print(&mut cache, view, sort)?;
        }
        Command::Unclassify { pseudo_only } => {
            let report = engine.unclassify(&mut cache, pseudo_only)?;
            OutputFormatter::unclassify_summary(&report);
        }
    }

    Ok(())
}

fn report_classification(report: &ClassifyReport) {
    if report.classified.is_empty() {
        OutputFormatter::info("No files matched");
    } else {
        OutputFormatter::summary_table(&report.counts_by_directory(), report.classified.len());
    }
    if report.excepted > 0 {
        OutputFormatter::plain(&format!("Excepted: {}", report.excepted));
    }
    for (filename, reason) in &report.failures {
        OutputFormatter::error(&format!("{filename}: {reason}"));
    }
    if !report.failures.is_empty() {
        OutputFormatter::warning("Some files could not be moved. Please review errors above.");
    }
}
