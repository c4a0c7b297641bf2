//! Audit Log System
//!
//! Tamper-evident, append-only logging of pipeline events using a SHA-256
//! hash chain, with integrity verification and tabular export.

pub mod chain;
pub mod entry;
pub mod export;
pub mod logger;
pub mod verify;

pub use chain::{compute_entry_hash, content_hash};
pub use entry::{AuditAction, AuditEntry, AuditLevel};
pub use export::AuditSummary;
pub use logger::{load_entries, ActionParams, AuditLogger};
pub use verify::{
    find_tampered_entries, verify_entries, verify_log_file, IntegrityReport, IntegrityViolation,
    ViolationKind,
};
