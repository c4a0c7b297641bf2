//! Data Lineage
//!
//! Records every source -> transform -> destination step of a pipeline run
//! and answers ancestry, descendant and impact queries over them.

pub mod snapshot;
pub mod tracker;
pub mod types;

pub use snapshot::LineageSnapshot;
pub use tracker::{ImpactReport, LineageGraph, LineageSummary, LineageTracker};
pub use types::{LineageEdge, LineageNode, LineageRecord, NodeType, RecordRequest, SourceType};
