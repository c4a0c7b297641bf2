//! Lineage Types and Data Structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ProvenanceError;

pub const DEFAULT_TRANSFORMATION_VERSION: &str = "1.0.0";

/// Role of a vertex in the lineage graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Source,
    Transform,
    Destination,
    /// Intermediate storage between steps
    Staging,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Source => "source",
            NodeType::Transform => "transform",
            NodeType::Destination => "destination",
            NodeType::Staging => "staging",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of system a source or destination lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    File,
    Database,
    Api,
    Stream,
    S3,
    Gcs,
    AzureBlob,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::File => "file",
            SourceType::Database => "database",
            SourceType::Api => "api",
            SourceType::Stream => "stream",
            SourceType::S3 => "s3",
            SourceType::Gcs => "gcs",
            SourceType::AzureBlob => "azure_blob",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = ProvenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(SourceType::File),
            "database" => Ok(SourceType::Database),
            "api" => Ok(SourceType::Api),
            "stream" => Ok(SourceType::Stream),
            "s3" => Ok(SourceType::S3),
            "gcs" => Ok(SourceType::Gcs),
            "azure_blob" => Ok(SourceType::AzureBlob),
            other => Err(ProvenanceError::InvalidValue(format!(
                "unknown source type: {}",
                other
            ))),
        }
    }
}

fn new_lineage_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Twelve hex characters, used for node and edge ids
pub(crate) fn short_graph_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

fn default_version() -> String {
    DEFAULT_TRANSFORMATION_VERSION.to_string()
}

/// A vertex in the lineage graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageNode {
    pub node_id: String,
    pub node_type: NodeType,
    pub name: String,
    pub source_type: Option<SourceType>,
    pub location: String,
    pub schema_version: String,
    pub properties: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl LineageNode {
    pub fn new(node_id: String, node_type: NodeType, name: String) -> Self {
        Self {
            node_id,
            node_type,
            name,
            source_type: None,
            location: String::new(),
            schema_version: String::new(),
            properties: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }
}

/// A directed hop between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub edge_id: String,
    pub source_node_id: String,
    pub target_node_id: String,

    pub operation: String,
    pub operation_version: String,

    pub input_records: u64,
    pub output_records: u64,
    pub records_filtered: u64,
    pub records_failed: u64,

    pub input_hash: String,
    pub output_hash: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,

    pub pipeline_id: String,
    pub run_id: String,
}

impl LineageEdge {
    pub fn new(source_node_id: String, target_node_id: String, operation: String) -> Self {
        Self {
            edge_id: short_graph_id(),
            source_node_id,
            target_node_id,
            operation,
            operation_version: default_version(),
            input_records: 0,
            output_records: 0,
            records_filtered: 0,
            records_failed: 0,
            input_hash: String::new(),
            output_hash: String::new(),
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: 0,
            pipeline_id: String::new(),
            run_id: String::new(),
        }
    }
}

/// One source -> transformation -> destination step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageRecord {
    #[serde(default = "new_lineage_id")]
    pub lineage_id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    pub source_type: SourceType,
    pub source_location: String,
    #[serde(default)]
    pub source_hash: Option<String>,

    pub transformation: String,
    #[serde(default = "default_version")]
    pub transformation_version: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,

    pub destination_type: SourceType,
    pub destination_location: String,
    #[serde(default)]
    pub destination_hash: Option<String>,

    pub input_records: u64,
    pub output_records: u64,
    #[serde(default)]
    pub records_filtered: u64,
    #[serde(default)]
    pub records_failed: u64,

    /// Explicit causal link to an earlier record of the same tracker
    #[serde(default)]
    pub parent_lineage_id: Option<String>,

    #[serde(default)]
    pub pipeline_id: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Caller-supplied facts about one transformation step
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRequest {
    pub source_type: SourceType,
    pub source_location: String,
    pub transformation: String,
    pub destination_type: SourceType,
    pub destination_location: String,
    pub input_records: u64,
    pub output_records: u64,
    pub source_hash: Option<String>,
    pub destination_hash: Option<String>,
    pub transformation_version: String,
    pub parameters: BTreeMap<String, Value>,
    pub parent_lineage_id: Option<String>,
    pub records_filtered: u64,
    pub records_failed: u64,
    pub duration_ms: u64,
}

impl RecordRequest {
    pub fn new(
        source_type: SourceType,
        source_location: impl Into<String>,
        transformation: impl Into<String>,
        destination_type: SourceType,
        destination_location: impl Into<String>,
        input_records: u64,
        output_records: u64,
    ) -> Self {
        Self {
            source_type,
            source_location: source_location.into(),
            transformation: transformation.into(),
            destination_type,
            destination_location: destination_location.into(),
            input_records,
            output_records,
            source_hash: None,
            destination_hash: None,
            transformation_version: default_version(),
            parameters: BTreeMap::new(),
            parent_lineage_id: None,
            records_filtered: 0,
            records_failed: 0,
            duration_ms: 0,
        }
    }

    pub fn source_hash(mut self, hash: impl Into<String>) -> Self {
        self.source_hash = Some(hash.into());
        self
    }

    pub fn destination_hash(mut self, hash: impl Into<String>) -> Self {
        self.destination_hash = Some(hash.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.transformation_version = version.into();
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn parent(mut self, lineage_id: impl Into<String>) -> Self {
        self.parent_lineage_id = Some(lineage_id.into());
        self
    }

    pub fn filtered(mut self, count: u64) -> Self {
        self.records_filtered = count;
        self
    }

    pub fn failed(mut self, count: u64) -> Self {
        self.records_failed = count;
        self
    }

    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub(crate) fn into_record(self, pipeline_id: &str, run_id: &str) -> LineageRecord {
        LineageRecord {
            lineage_id: new_lineage_id(),
            timestamp: Utc::now(),
            source_type: self.source_type,
            source_location: self.source_location,
            source_hash: self.source_hash,
            transformation: self.transformation,
            transformation_version: self.transformation_version,
            parameters: self.parameters,
            destination_type: self.destination_type,
            destination_location: self.destination_location,
            destination_hash: self.destination_hash,
            input_records: self.input_records,
            output_records: self.output_records,
            records_filtered: self.records_filtered,
            records_failed: self.records_failed,
            parent_lineage_id: self.parent_lineage_id,
            pipeline_id: pipeline_id.to_string(),
            run_id: run_id.to_string(),
            duration_ms: self.duration_ms,
        }
    }
}
