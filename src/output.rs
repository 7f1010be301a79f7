//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored status
//! messages, progress bars, and plain-text tables. Tables are rendered to a
//! `String` without color so they can be tested and piped.

use crate::undo::UnclassifyReport;
use crate::views::{BitrateSummary, Cell, TableSection};
use colored::*;
use console::{Alignment, measure_text_width, pad_str, truncate_str};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::fmt::Write;

const COLUMN_GAP: &str = "  ";
const ELLIPSIS: &str = "...";

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for probing
/// - Summaries of classify and unclassify runs
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use vidtidy::output::OutputFormatter;
    /// OutputFormatter::success("Classified 12 files");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates and returns a progress bar for probing.
    ///
    /// # Arguments
    ///
    /// * `total` - Total number of files to probe
    ///
    /// # Example
    ///
    /// ```no_run
    /// use vidtidy::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Prints how many files went into each directory.
    ///
    /// # Arguments
    ///
    /// * `directory_counts` - Directory names mapped to file counts
    /// * `total_files` - Total number of files classified
    pub fn summary_table(directory_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let max_dir_len = directory_counts
            .keys()
            .map(|name| measure_text_width(name))
            .max()
            .unwrap_or(0)
            .max(9); // At least "Directory" width

        println!(
            "{} | {}",
            pad_str("Directory", max_dir_len, Alignment::Left, None).bold(),
            "Files".bold()
        );
        println!("{}", "-".repeat(max_dir_len + 10));

        for (directory, count) in directory_counts {
            println!(
                "{} | {} {}",
                pad_str(directory, max_dir_len, Alignment::Left, None),
                count.to_string().green(),
                plural(*count)
            );
        }

        println!("{}", "-".repeat(max_dir_len + 10));
        println!(
            "{} | {} {}",
            pad_str("Total", max_dir_len, Alignment::Left, None).bold(),
            total_files.to_string().green().bold(),
            plural(total_files)
        );
    }

    /// Prints the outcome of an unclassify run.
    pub fn unclassify_summary(report: &UnclassifyReport) {
        if report.cleared_pseudo > 0 {
            Self::success(&format!(
                "Cleared {} dry-run {}",
                report.cleared_pseudo,
                if report.cleared_pseudo == 1 { "decision" } else { "decisions" }
            ));
        }
        if !report.restored_files.is_empty() {
            Self::success(&format!(
                "Restored {} {} to the root",
                report.restored_files.len(),
                plural(report.restored_files.len())
            ));
        }
        for path in &report.collisions {
            Self::warning(&format!(
                "Name already taken at the root, left in place: {}",
                path.display()
            ));
        }
        for (path, reason) in &report.failed_restores {
            Self::error(&format!("{}: {}", path.display(), reason));
        }
        if report.is_complete_success()
            && report.cleared_pseudo == 0
            && report.restored_files.is_empty()
        {
            Self::info("Nothing to unclassify");
        }
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// Column formatting knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStyle {
    /// Display width the filename column is truncated to.
    pub filename_max_width: usize,
    /// Decimals shown for floating point cells.
    pub float_precision: usize,
}

impl Default for TableStyle {
    fn default() -> Self {
        Self {
            filename_max_width: 40,
            float_precision: 3,
        }
    }
}

/// Formats one cell as plain text.
pub fn format_cell(cell: &Cell, precision: usize) -> String {
    match cell {
        Cell::Text(text) => text.clone(),
        Cell::Int(value) => value.to_string(),
        Cell::Float(value) => format!("{value:.precision$}"),
        Cell::Empty => String::new(),
    }
}

/// Cuts `text` to at most `max_width` display columns plus an ellipsis.
///
/// Wide characters count as two columns.
pub fn truncate_display(text: &str, max_width: usize) -> String {
    if measure_text_width(text) <= max_width {
        return text.to_string();
    }
    let cut = truncate_str(text, max_width, "");
    format!("{cut}{ELLIPSIS}")
}

/// Lays out one section as aligned columns.
///
/// Numbers are right-aligned, text left-aligned. The first column is treated
/// as the filename and truncated per `style`.
pub fn render_table(headers: &[&str], rows: &[Vec<Cell>], style: &TableStyle) -> String {
    let formatted: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(i, cell)| {
                    let text = format_cell(cell, style.float_precision);
                    if i == 0 {
                        truncate_display(&text, style.filename_max_width)
                    } else {
                        text
                    }
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            formatted
                .iter()
                .filter_map(|row| row.get(i))
                .map(|text| measure_text_width(text))
                .chain(std::iter::once(measure_text_width(header)))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let numeric: Vec<bool> = (0..headers.len())
        .map(|i| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .any(Cell::is_numeric)
        })
        .collect();

    let align = |i: usize| {
        if numeric[i] {
            Alignment::Right
        } else {
            Alignment::Left
        }
    };

    let mut out = String::new();
    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| pad_str(h, widths[i], align(i), None).into_owned())
        .collect();
    push_line(&mut out, &header_line.join(COLUMN_GAP));

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &rule.join(COLUMN_GAP));

    for row in &formatted {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .take(headers.len())
            .map(|(i, text)| pad_str(text, widths[i], align(i), None).into_owned())
            .collect();
        push_line(&mut out, &line.join(COLUMN_GAP));
    }
    out
}

/// Renders every section under its title, followed by the bitrate summary
/// when one is given.
pub fn render_sections(
    sections: &[TableSection],
    summary: Option<&BitrateSummary>,
    style: &TableStyle,
) -> String {
    let mut out = String::new();

    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "[{}] {}", section.title(), section.rows.len());
        out.push_str(&render_table(&section.headers, &section.rows, style));
    }

    if let Some(summary) = summary {
        out.push_str("\n==================================\n");
        let _ = writeln!(out, "Target bitrate: {} kbps", summary.target_bitrate_kbps);
        let _ = writeln!(out, "Total size: {:.2} GB", summary.total_gb);
        let _ = writeln!(out, "Expected size after savings: {:.2} GB", summary.expected_gb);
        let _ = writeln!(out, "Expected savings: {:.2} GB", summary.savings_gb);
    }
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line.trim_end());
    out.push('\n');
}
