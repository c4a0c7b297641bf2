pub mod audit;
pub mod config;
pub mod error;
pub mod lineage;

pub use crate::audit::{AuditEntry, AuditLogger, IntegrityReport};
pub use crate::config::ProvenanceConfig;
pub use crate::error::{ProvenanceError, Result};
pub use crate::lineage::{LineageRecord, LineageTracker, RecordRequest};
