//! Audit Log Entry
//!
//! Defines a single immutable audit event and the closed sets of actions
//! and severity levels it can carry.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::audit::chain;
use crate::config::DEFAULT_USER_ID;
use crate::error::ProvenanceError;

/// What happened during pipeline execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Pipeline lifecycle
    PipelineStart,
    PipelineComplete,
    PipelineFailed,

    // Data operations
    DataRead,
    DataWrite,
    DataTransform,
    DataValidate,
    DataDelete,

    // Access control
    AccessGranted,
    AccessDenied,
    AccessRevoked,

    // PHI operations
    PhiAccess,
    PhiExport,
    PhiDeidentify,
    PhiRedact,

    // System events
    ConfigChange,
    Error,
    Warning,
}

impl AuditAction {
    pub const ALL: [AuditAction; 18] = [
        AuditAction::PipelineStart,
        AuditAction::PipelineComplete,
        AuditAction::PipelineFailed,
        AuditAction::DataRead,
        AuditAction::DataWrite,
        AuditAction::DataTransform,
        AuditAction::DataValidate,
        AuditAction::DataDelete,
        AuditAction::AccessGranted,
        AuditAction::AccessDenied,
        AuditAction::AccessRevoked,
        AuditAction::PhiAccess,
        AuditAction::PhiExport,
        AuditAction::PhiDeidentify,
        AuditAction::PhiRedact,
        AuditAction::ConfigChange,
        AuditAction::Error,
        AuditAction::Warning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PipelineStart => "pipeline_start",
            AuditAction::PipelineComplete => "pipeline_complete",
            AuditAction::PipelineFailed => "pipeline_failed",
            AuditAction::DataRead => "data_read",
            AuditAction::DataWrite => "data_write",
            AuditAction::DataTransform => "data_transform",
            AuditAction::DataValidate => "data_validate",
            AuditAction::DataDelete => "data_delete",
            AuditAction::AccessGranted => "access_granted",
            AuditAction::AccessDenied => "access_denied",
            AuditAction::AccessRevoked => "access_revoked",
            AuditAction::PhiAccess => "phi_access",
            AuditAction::PhiExport => "phi_export",
            AuditAction::PhiDeidentify => "phi_deidentify",
            AuditAction::PhiRedact => "phi_redact",
            AuditAction::ConfigChange => "config_change",
            AuditAction::Error => "error",
            AuditAction::Warning => "warning",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ProvenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ProvenanceError::InvalidValue(format!("unknown audit action: {}", s)))
    }
}

/// Severity of an audit event
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl AuditLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditLevel::Debug => "debug",
            AuditLevel::Info => "info",
            AuditLevel::Warning => "warning",
            AuditLevel::Error => "error",
            AuditLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditLevel {
    type Err = ProvenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(AuditLevel::Debug),
            "info" => Ok(AuditLevel::Info),
            "warning" => Ok(AuditLevel::Warning),
            "error" => Ok(AuditLevel::Error),
            "critical" => Ok(AuditLevel::Critical),
            other => Err(ProvenanceError::InvalidValue(format!(
                "unknown audit level: {}",
                other
            ))),
        }
    }
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

/// Audit log entry with hash chain fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,

    pub pipeline_id: String,
    #[serde(default)]
    pub pipeline_name: String,
    #[serde(default)]
    pub stage: String,

    pub action: AuditAction,
    #[serde(default)]
    pub level: AuditLevel,

    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub user_role: String,
    #[serde(default)]
    pub client_ip: String,

    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub resource_id: String,
    #[serde(default)]
    pub details: BTreeMap<String, Value>,

    #[serde(default)]
    pub record_count: Option<u64>,
    #[serde(default)]
    pub input_hash: Option<String>,
    #[serde(default)]
    pub output_hash: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,

    #[serde(default)]
    pub previous_hash: String,
    #[serde(default)]
    pub entry_hash: String,
}

impl AuditEntry {
    /// Create an unsealed entry stamped with a fresh id and the current time
    pub fn new(pipeline_id: impl Into<String>, action: AuditAction) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now().trunc_subsecs(6),
            pipeline_id: pipeline_id.into(),
            pipeline_name: String::new(),
            stage: String::new(),
            action,
            level: AuditLevel::Info,
            user_id: default_user_id(),
            user_role: String::new(),
            client_ip: String::new(),
            resource_type: String::new(),
            resource_id: String::new(),
            details: BTreeMap::new(),
            record_count: None,
            input_hash: None,
            output_hash: None,
            duration_ms: None,
            previous_hash: String::new(),
            entry_hash: String::new(),
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = stage.into();
        self
    }

    pub fn with_level(mut self, level: AuditLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = resource_type.into();
        self.resource_id = resource_id.into();
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_record_count(mut self, count: u64) -> Self {
        self.record_count = Some(count);
        self
    }

    pub fn with_input_hash(mut self, hash: impl Into<String>) -> Self {
        self.input_hash = Some(hash.into());
        self
    }

    pub fn with_output_hash(mut self, hash: impl Into<String>) -> Self {
        self.output_hash = Some(hash.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Recompute the digest over every field except `entry_hash`
    pub fn compute_hash(&self) -> String {
        chain::compute_entry_hash(self)
    }

    /// Bind this entry to its predecessor and compute its own hash
    pub fn seal(mut self, previous_hash: &str) -> Self {
        self.previous_hash = previous_hash.to_string();
        self.entry_hash = self.compute_hash();
        self
    }

    /// Verify the stored hash matches the entry contents
    pub fn verify_hash(&self) -> bool {
        self.entry_hash == self.compute_hash()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} [{}] {}/{} ({})",
            self.action, self.level, self.pipeline_id, self.stage, self.entry_id
        )
    }
}
