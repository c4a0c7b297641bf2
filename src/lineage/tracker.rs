//! Lineage Tracker
//!
//! Records transformation steps as a flat ordered list and folds each one
//! into a node/edge graph. All queries are linear scans over the records of a
//! single run; the tracker is not meant to hold more than one run's history.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

use crate::config::{short_id, LineageConfig};
use crate::lineage::types::{
    LineageEdge, LineageNode, LineageRecord, NodeType, RecordRequest,
};

/// Downstream effect of a change at one location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub source: String,
    pub affected_destinations: BTreeSet<String>,
    pub affected_transforms: BTreeSet<String>,
    pub total_downstream_records: usize,
    pub total_records_impacted: u64,
}

/// Aggregate statistics over every recorded step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageSummary {
    pub pipeline_id: String,
    pub run_id: String,
    pub total_transformations: usize,
    pub total_input_records: u64,
    pub total_output_records: u64,
    pub total_filtered_records: u64,
    pub total_failed_records: u64,
    pub unique_sources: usize,
    pub unique_destinations: usize,
    pub unique_transforms: usize,
}

/// Plain node and edge lists of the lineage graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageGraph {
    pub nodes: Vec<LineageNode>,
    pub edges: Vec<LineageEdge>,
}

#[derive(Debug, Clone)]
pub struct LineageTracker {
    pipeline_id: String,
    run_id: String,
    records: Vec<LineageRecord>,
    nodes: Vec<LineageNode>,
    node_index: HashMap<String, usize>,
    edges: Vec<LineageEdge>,
}

impl Default for LineageTracker {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl LineageTracker {
    /// Create a tracker; empty ids are replaced with generated short ids
    pub fn new(pipeline_id: &str, run_id: &str) -> Self {
        Self {
            pipeline_id: if pipeline_id.is_empty() {
                short_id()
            } else {
                pipeline_id.to_string()
            },
            run_id: if run_id.is_empty() {
                short_id()
            } else {
                run_id.to_string()
            },
            records: Vec::new(),
            nodes: Vec::new(),
            node_index: HashMap::new(),
            edges: Vec::new(),
        }
    }

    pub fn from_config(config: &LineageConfig) -> Self {
        Self::new(&config.pipeline_id, &config.run_id)
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn records(&self) -> &[LineageRecord] {
        &self.records
    }

    pub fn nodes(&self) -> &[LineageNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[LineageEdge] {
        &self.edges
    }

    pub fn node(&self, node_id: &str) -> Option<&LineageNode> {
        self.node_index.get(node_id).map(|&i| &self.nodes[i])
    }

    /// Record a transformation step and add it to the graph
    pub fn record(&mut self, request: RecordRequest) -> LineageRecord {
        let record = request.into_record(&self.pipeline_id, &self.run_id);

        if let Some(parent) = &record.parent_lineage_id {
            if self.get_lineage(parent).is_none() {
                warn!(
                    lineage_id = %record.lineage_id,
                    parent = %parent,
                    "Parent lineage id does not reference a known record"
                );
            }
        }

        self.append(record.clone());
        debug!(
            lineage_id = %record.lineage_id,
            source = %record.source_location,
            transformation = %record.transformation,
            destination = %record.destination_location,
            "Recorded lineage step"
        );
        record
    }

    /// Append an existing record and fold it into the graph
    pub(crate) fn append(&mut self, record: LineageRecord) {
        self.add_to_graph(&record);
        self.records.push(record);
    }

    fn insert_node(&mut self, node: LineageNode) {
        match self.node_index.get(&node.node_id) {
            Some(&i) => self.nodes[i] = node,
            None => {
                self.node_index.insert(node.node_id.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    fn add_to_graph(&mut self, record: &LineageRecord) {
        let source_id = format!("src_{}", record.source_location);
        if !self.node_index.contains_key(&source_id) {
            let mut node = LineageNode::new(
                source_id.clone(),
                NodeType::Source,
                record.source_location.clone(),
            );
            node.source_type = Some(record.source_type);
            node.location = record.source_location.clone();
            self.insert_node(node);
        }

        // One transform node per record, never shared
        let transform_id = format!("txn_{}", record.lineage_id);
        let mut transform = LineageNode::new(
            transform_id.clone(),
            NodeType::Transform,
            record.transformation.clone(),
        );
        transform.properties.insert(
            "version".to_string(),
            record.transformation_version.clone().into(),
        );
        self.insert_node(transform);

        let dest_id = format!("dst_{}", record.destination_location);
        if !self.node_index.contains_key(&dest_id) {
            let mut node = LineageNode::new(
                dest_id.clone(),
                NodeType::Destination,
                record.destination_location.clone(),
            );
            node.source_type = Some(record.destination_type);
            node.location = record.destination_location.clone();
            self.insert_node(node);
        }

        let mut input_edge = LineageEdge::new(source_id, transform_id.clone(), "input".to_string());
        input_edge.input_records = record.input_records;
        input_edge.input_hash = record.source_hash.clone().unwrap_or_default();
        input_edge.pipeline_id = self.pipeline_id.clone();
        input_edge.run_id = self.run_id.clone();
        self.edges.push(input_edge);

        let mut output_edge =
            LineageEdge::new(transform_id, dest_id, record.transformation.clone());
        output_edge.operation_version = record.transformation_version.clone();
        output_edge.input_records = record.input_records;
        output_edge.output_records = record.output_records;
        output_edge.records_filtered = record.records_filtered;
        output_edge.records_failed = record.records_failed;
        output_edge.output_hash = record.destination_hash.clone().unwrap_or_default();
        output_edge.duration_ms = record.duration_ms;
        output_edge.pipeline_id = self.pipeline_id.clone();
        output_edge.run_id = self.run_id.clone();
        self.edges.push(output_edge);
    }

    pub fn get_lineage(&self, lineage_id: &str) -> Option<&LineageRecord> {
        self.records.iter().find(|r| r.lineage_id == lineage_id)
    }

    pub fn get_by_source(&self, source_location: &str) -> Vec<&LineageRecord> {
        self.records
            .iter()
            .filter(|r| r.source_location == source_location)
            .collect()
    }

    pub fn get_by_destination(&self, destination_location: &str) -> Vec<&LineageRecord> {
        self.records
            .iter()
            .filter(|r| r.destination_location == destination_location)
            .collect()
    }

    /// Follow `parent_lineage_id` links from `lineage_id` back to the root,
    /// child first. An unknown parent ends the chain; a repeated id stops
    /// the walk so self references and cycles terminate.
    pub fn get_ancestors(&self, lineage_id: &str) -> Vec<&LineageRecord> {
        let mut ancestors = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = Some(lineage_id);

        while let Some(id) = current {
            if !visited.insert(id) {
                warn!(lineage_id = %id, "Cycle in parent lineage chain");
                break;
            }
            let Some(record) = self.get_lineage(id) else {
                break;
            };
            ancestors.push(record);
            current = record.parent_lineage_id.as_deref();
        }

        ancestors
    }

    /// Breadth-first walk of source -> destination locations over the
    /// records. Locations match by exact string equality.
    pub fn get_descendants(&self, source_location: &str) -> Vec<&LineageRecord> {
        let mut descendants = Vec::new();
        let mut to_check: VecDeque<&str> = VecDeque::from([source_location]);
        let mut seen: HashSet<&str> = HashSet::new();

        while let Some(current) = to_check.pop_front() {
            if !seen.insert(current) {
                continue;
            }

            for record in &self.records {
                if record.source_location == current {
                    descendants.push(record);
                    to_check.push_back(&record.destination_location);
                }
            }
        }

        descendants
    }

    pub fn impact_analysis(&self, source_location: &str) -> ImpactReport {
        let descendants = self.get_descendants(source_location);

        let mut affected_destinations = BTreeSet::new();
        let mut affected_transforms = BTreeSet::new();
        let mut total_records_impacted = 0u64;

        for record in &descendants {
            affected_destinations.insert(record.destination_location.clone());
            affected_transforms.insert(record.transformation.clone());
            total_records_impacted += record.output_records;
        }

        ImpactReport {
            source: source_location.to_string(),
            affected_destinations,
            affected_transforms,
            total_downstream_records: descendants.len(),
            total_records_impacted,
        }
    }

    pub fn summary(&self) -> LineageSummary {
        let records = &self.records;
        LineageSummary {
            pipeline_id: self.pipeline_id.clone(),
            run_id: self.run_id.clone(),
            total_transformations: records.len(),
            total_input_records: records.iter().map(|r| r.input_records).sum(),
            total_output_records: records.iter().map(|r| r.output_records).sum(),
            total_filtered_records: records.iter().map(|r| r.records_filtered).sum(),
            total_failed_records: records.iter().map(|r| r.records_failed).sum(),
            unique_sources: records
                .iter()
                .map(|r| r.source_location.as_str())
                .collect::<HashSet<_>>()
                .len(),
            unique_destinations: records
                .iter()
                .map(|r| r.destination_location.as_str())
                .collect::<HashSet<_>>()
                .len(),
            unique_transforms: records
                .iter()
                .map(|r| r.transformation.as_str())
                .collect::<HashSet<_>>()
                .len(),
        }
    }

    pub fn export(&self) -> Vec<LineageRecord> {
        self.records.clone()
    }

    pub fn export_graph(&self) -> LineageGraph {
        LineageGraph {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }
}
