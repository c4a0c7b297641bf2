//! Audit log projections: CSV export and summary statistics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::audit::entry::AuditEntry;
use crate::error::{ProvenanceError, Result};

pub const CSV_COLUMNS: [&str; 12] = [
    "timestamp",
    "entry_id",
    "pipeline_id",
    "action",
    "level",
    "stage",
    "user_id",
    "resource_type",
    "resource_id",
    "record_count",
    "duration_ms",
    "entry_hash",
];

/// Counts by action and level plus the time span of the log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditSummary {
    pub total_entries: usize,
    pub first_entry: Option<DateTime<Utc>>,
    pub last_entry: Option<DateTime<Utc>>,
    pub actions: BTreeMap<String, usize>,
    pub levels: BTreeMap<String, usize>,
    pub pipeline_id: String,
}

impl AuditSummary {
    pub fn from_entries(entries: &[AuditEntry], pipeline_id: &str) -> Self {
        let mut actions = BTreeMap::new();
        let mut levels = BTreeMap::new();

        for entry in entries {
            *actions.entry(entry.action.as_str().to_string()).or_insert(0) += 1;
            *levels.entry(entry.level.as_str().to_string()).or_insert(0) += 1;
        }

        Self {
            total_entries: entries.len(),
            first_entry: entries.first().map(|e| e.timestamp),
            last_entry: entries.last().map(|e| e.timestamp),
            actions,
            levels,
            pipeline_id: pipeline_id.to_string(),
        }
    }
}

/// Quote a field when it contains a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn optional_cell(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn csv_row(entry: &AuditEntry) -> String {
    let cells = [
        entry.timestamp.to_rfc3339(),
        entry.entry_id.clone(),
        entry.pipeline_id.clone(),
        entry.action.as_str().to_string(),
        entry.level.as_str().to_string(),
        entry.stage.clone(),
        entry.user_id.clone(),
        entry.resource_type.clone(),
        entry.resource_id.clone(),
        optional_cell(entry.record_count),
        optional_cell(entry.duration_ms),
        entry.entry_hash.clone(),
    ];
    cells
        .iter()
        .map(|cell| csv_field(cell))
        .collect::<Vec<_>>()
        .join(",")
}

/// Write entries as CSV. An empty log writes no file and returns 0.
pub fn write_csv(entries: &[AuditEntry], output_path: &Path) -> Result<usize> {
    if entries.is_empty() {
        return Ok(0);
    }

    let file = File::create(output_path).map_err(|e| ProvenanceError::io(output_path, e))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{}", CSV_COLUMNS.join(","))
        .map_err(|e| ProvenanceError::io(output_path, e))?;
    for entry in entries {
        writeln!(writer, "{}", csv_row(entry)).map_err(|e| ProvenanceError::io(output_path, e))?;
    }
    writer
        .flush()
        .map_err(|e| ProvenanceError::io(output_path, e))?;

    info!(
        "Exported {} audit entries to {}",
        entries.len(),
        output_path.display()
    );
    Ok(entries.len())
}
