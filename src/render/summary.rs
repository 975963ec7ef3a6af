use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::data::datetime::format_timestamp;
use crate::error::RenderError;
use crate::processing::statistics::SeriesStats;
use crate::render::chart::sibling_with_suffix;
use crate::state::dataset::Dataset;

pub const REPORT_TITLE: &str = "CS1237 Current Measurement Analysis";

/// `<stem>_summary.txt` next to the source CSV.
pub fn summary_path(csv_path: &Path) -> PathBuf {
    sibling_with_suffix(csv_path, "_summary.txt")
}

/// Plain-text report written beside the figure.
pub fn format_summary(dataset: &Dataset, analyzed_at: NaiveDateTime) -> String {
    let mut out = String::new();
    let file_name = dataset
        .source()
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let _ = writeln!(out, "{REPORT_TITLE}");
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out);
    let _ = writeln!(out, "Data file: {file_name}");
    let _ = writeln!(out, "Analyzed at: {}", analyzed_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out);
    write_overview(&mut out, dataset);
    let _ = writeln!(out);
    write_raw_block(&mut out, dataset.raw_stats());
    let _ = writeln!(out);
    write_derived_block(&mut out, dataset.derived_stats());
    out
}

/// Statistics block printed by the analyzer on the console.
pub fn format_console_report(dataset: &Dataset) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Basic statistics");
    let _ = writeln!(out, "{rule}");
    write_overview(&mut out, dataset);
    let _ = writeln!(out);
    write_raw_block(&mut out, dataset.raw_stats());
    let _ = writeln!(out);
    write_derived_block(&mut out, dataset.derived_stats());
    out
}

pub fn write_summary(dataset: &Dataset, analyzed_at: NaiveDateTime) -> Result<PathBuf, RenderError> {
    let path = summary_path(dataset.source());
    std::fs::write(&path, format_summary(dataset, analyzed_at)).map_err(|source| RenderError::Io {
        path: path.clone(),
        source,
    })?;
    tracing::info!("Saved summary to {:?}", path);
    Ok(path)
}

fn write_overview(out: &mut String, dataset: &Dataset) {
    let _ = writeln!(out, "Records: {}", dataset.len());
    let _ = writeln!(
        out,
        "Time range: {} to {}",
        format_timestamp(dataset.start()),
        format_timestamp(dataset.end())
    );
    let _ = writeln!(out, "Duration: {:.2} s", dataset.duration_seconds());
}

fn write_raw_block(out: &mut String, s: &SeriesStats) {
    let _ = writeln!(out, "ADC raw value:");
    let _ = writeln!(out, "  Count: {}", s.count);
    let _ = writeln!(out, "  Mean: {}", group_thousands(s.mean, 2));
    let _ = writeln!(out, "  Median: {}", group_thousands(s.median, 1));
    let _ = writeln!(out, "  Std dev: {}", group_thousands(s.std_dev, 2));
    let _ = writeln!(out, "  Min: {}", group_thousands(s.min, 0));
    let _ = writeln!(out, "  Max: {}", group_thousands(s.max, 0));
    let _ = writeln!(out, "  CV: {}", format_cv(s));
}

fn write_derived_block(out: &mut String, s: &SeriesStats) {
    let _ = writeln!(out, "Current (A):");
    let _ = writeln!(out, "  Count: {}", s.count);
    let _ = writeln!(out, "  Mean: {}", fixed(s.mean, 6));
    let _ = writeln!(out, "  Median: {}", fixed(s.median, 6));
    let _ = writeln!(out, "  Std dev: {}", fixed(s.std_dev, 6));
    let _ = writeln!(out, "  Min: {}", fixed(s.min, 6));
    let _ = writeln!(out, "  Max: {}", fixed(s.max, 6));
    let _ = writeln!(out, "  CV: {}", format_cv(s));
}

fn format_cv(s: &SeriesStats) -> String {
    match s.coefficient_of_variation() {
        Some(cv) => format!("{cv:.2}%"),
        None => "n/a".to_string(),
    }
}

fn fixed(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{value:.decimals$}")
    } else {
        "n/a".to_string()
    }
}

/// `1234567.891` with 2 decimals becomes `1,234,567.89`.
pub fn group_thousands(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    let text = format!("{:.decimals$}", value.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(text.len() + int_part.len() / 3 + 1);
    if value < 0.0 && text.chars().any(|c| c.is_ascii_digit() && c != '0') {
        grouped.push('-');
    }
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}
