//! Result → human/json string formatting.
//!
//! Two modes:
//! - **Human** (default): one line per item
//! - **JSON** (`--json`): `serde_json::to_string_pretty`

use std::fmt::Display;

use frostline_backup::RunSummary;
use frostline_core::{LineageEntry, TIMESTAMP_FORMAT};

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Format an error.
pub fn format_error(err: &dyn Display, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(&serde_json::json!({
            "error": err.to_string()
        }))
        .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", err)),
        OutputMode::Human => format!("(error) {}", err),
    }
}

/// Format the active lineage of a directory.
pub fn format_entries(entries: &[LineageEntry], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => {
            serde_json::to_string_pretty(entries).unwrap_or_else(|e| format_error(&e, mode))
        }
        OutputMode::Human => {
            if entries.is_empty() {
                return "(empty list)".to_string();
            }
            entries
                .iter()
                .enumerate()
                .map(|(i, entry)| format!("{}) {}", i + 1, format_entry_human(entry)))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

fn format_entry_human(entry: &LineageEntry) -> String {
    let mut flags = Vec::new();
    if entry.is_multi_part {
        flags.push("multi-part".to_string());
    }
    if let Some(recipient) = &entry.encryption_recipient {
        flags.push(format!("encrypted for {}", recipient));
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    format!(
        "{} {} {} ({}){}",
        entry.created_at.format(TIMESTAMP_FORMAT),
        entry.vault,
        entry.remote_archive_id,
        format_size(entry.size_bytes),
        flags
    )
}

/// Format the outcome of a backup run.
pub fn format_summary(summary: &RunSummary) -> String {
    let mut lines = Vec::new();

    for dir in &summary.planned {
        lines.push(format!(
            "would back up {} as {}",
            dir.path.display(),
            dir.archive_name
        ));
    }
    for done in &summary.completed {
        lines.push(format!(
            "backed up {} -> {} ({})",
            done.directory.display(),
            done.entry.remote_archive_id,
            format_size(done.entry.size_bytes)
        ));
    }
    for skipped in &summary.skipped {
        lines.push(format!(
            "skipped {}: {}",
            skipped.directory.display(),
            skipped.reason
        ));
    }
    if summary.planned.is_empty() {
        lines.push(format!(
            "{} completed, {} skipped, {} rotated, {} rotation failures",
            summary.completed.len(),
            summary.skipped.len(),
            summary.rotated,
            summary.rotation_failures
        ));
    }
    lines.join("\n")
}

/// Byte count with a binary unit suffix.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
