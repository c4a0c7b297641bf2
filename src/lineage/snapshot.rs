//! Lineage snapshot persistence
//!
//! A snapshot is one JSON document holding the records, the derived graph
//! and the summary. Loading trusts only the records: the graph is rebuilt by
//! replaying every record through the same fold used by `record()`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{ProvenanceError, Result};
use crate::lineage::tracker::{LineageGraph, LineageSummary, LineageTracker};
use crate::lineage::types::LineageRecord;

#[derive(Debug, Clone, Serialize)]
pub struct LineageSnapshot {
    pub pipeline_id: String,
    pub run_id: String,
    pub records: Vec<LineageRecord>,
    pub graph: LineageGraph,
    pub summary: LineageSummary,
}

/// The subset of a snapshot that `load` reads
#[derive(Debug, Deserialize)]
struct SnapshotInput {
    #[serde(default)]
    pipeline_id: String,
    #[serde(default)]
    run_id: String,
    records: Vec<LineageRecord>,
}

impl LineageTracker {
    pub fn snapshot(&self) -> LineageSnapshot {
        LineageSnapshot {
            pipeline_id: self.pipeline_id().to_string(),
            run_id: self.run_id().to_string(),
            records: self.export(),
            graph: self.export_graph(),
            summary: self.summary(),
        }
    }

    /// Write the full tracker state as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ProvenanceError::io(parent, e))?;
            }
        }

        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json).map_err(|e| ProvenanceError::io(path, e))?;

        info!(
            "Saved {} lineage records to {}",
            self.records().len(),
            path.display()
        );
        Ok(())
    }

    /// Rebuild a tracker from a snapshot by replaying its records
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ProvenanceError::io(path, e))?;
        let input: SnapshotInput = serde_json::from_str(&contents)
            .map_err(|e| ProvenanceError::malformed_snapshot(path, e))?;

        let mut tracker = LineageTracker::new(&input.pipeline_id, &input.run_id);
        for record in input.records {
            tracker.append(record);
        }

        info!(
            "Loaded {} lineage records from {}",
            tracker.records().len(),
            path.display()
        );
        Ok(tracker)
    }
}
