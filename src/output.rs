//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Process
//!
//! ```text
//! IMG_0042.jpg → IMG_0042.processed.jpg
//!     Input: image/jpeg 4032x3024
//!     Output: image/jpeg 2048x1536, 412.3 KB
//!     Orientation: 6 (rotated 90° CW)
//!     Stages: orientation, resize, convert
//! ```
//!
//! ## Inspect
//!
//! ```text
//! IMG_0042.jpg (image/jpeg, 3.1 MB)
//!     Orientation: 6 (rotated 90° CW)
//!     Tags
//!         Make: Canon
//!         Orientation: 6
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::Dimensions;
use crate::metadata::ExifTags;
use crate::process::ProcessReport;
use serde::Serialize;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count (`512 B`, `12.5 KB`, `3.1 MB`).
fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

fn format_dimensions(dims: Option<Dimensions>) -> String {
    dims.map(|d| format!(" {d}")).unwrap_or_default()
}

/// Plain-language meaning of an orientation code.
pub fn orientation_label(code: u32) -> &'static str {
    match code {
        1 => "upright",
        2 => "mirrored horizontally",
        3 => "rotated 180°",
        4 => "mirrored vertically",
        5 => "mirrored horizontally, rotated 270° CW",
        6 => "rotated 90° CW",
        7 => "mirrored horizontally, rotated 90° CW",
        8 => "rotated 270° CW",
        _ => "unspecified",
    }
}

// ============================================================================
// Process
// ============================================================================

/// Format the summary of one `process` run.
pub fn format_process_report(report: &ProcessReport, input: &Path, output: &Path) -> Vec<String> {
    let mut lines = vec![format!("{} → {}", input.display(), output.display())];

    lines.push(format!(
        "{}Input: {}{}",
        indent(1),
        report.input_mime.as_deref().unwrap_or("bitmap"),
        format_dimensions(report.input_dimensions)
    ));

    let size = report
        .output_bytes
        .map(|b| format!(", {}", format_size(b)))
        .unwrap_or_default();
    lines.push(format!(
        "{}Output: {}{}{}",
        indent(1),
        report.output_mime.as_deref().unwrap_or("bitmap"),
        format_dimensions(report.output_dimensions),
        size
    ));

    if let Some(code) = report.orientation {
        lines.push(format!(
            "{}Orientation: {} ({})",
            indent(1),
            code,
            orientation_label(code)
        ));
    }

    let stages = if report.changed.is_empty() {
        "none (passed through)".to_string()
    } else {
        report
            .changed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    lines.push(format!("{}Stages: {}", indent(1), stages));
    lines
}

pub fn print_process_report(report: &ProcessReport, input: &Path, output: &Path) {
    for line in format_process_report(report, input, output) {
        println!("{line}");
    }
}

#[derive(Serialize)]
struct JsonProcessReport<'a> {
    input: &'a Path,
    output: &'a Path,
    #[serde(flatten)]
    report: &'a ProcessReport,
}

/// The `--json` form of [`format_process_report`].
pub fn format_process_report_json(
    report: &ProcessReport,
    input: &Path,
    output: &Path,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonProcessReport {
        input,
        output,
        report,
    })
}

// ============================================================================
// Inspect
// ============================================================================

/// Format the metadata of one file for `inspect`.
pub fn format_inspect(path: &Path, mime_type: Option<&str>, size: usize, tags: &ExifTags) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({}, {})",
        path.display(),
        mime_type.unwrap_or("unknown type"),
        format_size(size)
    )];

    match tags.orientation() {
        Some(code) => lines.push(format!(
            "{}Orientation: {} ({})",
            indent(1),
            code,
            orientation_label(code)
        )),
        None => lines.push(format!("{}Orientation: none", indent(1))),
    }

    if tags.is_empty() {
        lines.push(format!("{}No EXIF metadata", indent(1)));
    } else {
        lines.push(format!("{}Tags", indent(1)));
        for (tag, value) in tags.iter() {
            lines.push(format!("{}{}: {}", indent(2), tag, value));
        }
    }
    lines
}

pub fn print_inspect(path: &Path, mime_type: Option<&str>, size: usize, tags: &ExifTags) {
    for line in format_inspect(path, mime_type, size, tags) {
        println!("{line}");
    }
}
