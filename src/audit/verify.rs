//! Audit Log Verification
//!
//! Replays a stored chain and collects every hash mismatch and chain break.
//! Verification never stops at the first problem and never touches the file.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::audit::entry::AuditEntry;
use crate::audit::logger::load_entries;
use crate::error::Result;

/// Kind of integrity violation detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Stored `entry_hash` does not match the recomputed digest
    HashMismatch,
    /// `previous_hash` does not match the prior entry's stored hash
    ChainBreak,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityViolation {
    pub kind: ViolationKind,
    pub index: usize,
    pub entry_id: String,
    pub expected: String,
    pub found: String,
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ViolationKind::HashMismatch => write!(
                f,
                "Entry {} ({}): Hash mismatch - expected {}, got {}",
                self.index, self.entry_id, self.expected, self.found
            ),
            ViolationKind::ChainBreak => write!(
                f,
                "Entry {} ({}): Chain broken - expected previous_hash {:?}, got {:?}",
                self.index, self.entry_id, self.expected, self.found
            ),
        }
    }
}

/// Verification result with every violation found
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    pub is_valid: bool,
    pub entry_count: usize,
    pub violations: Vec<IntegrityViolation>,
}

impl IntegrityReport {
    /// Human-readable descriptions of each violation
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.to_string()).collect()
    }

    pub fn count(&self, kind: ViolationKind) -> usize {
        self.violations.iter().filter(|v| v.kind == kind).count()
    }

    pub fn summary(&self) -> String {
        if self.is_valid {
            format!("Audit log is valid ({} entries)", self.entry_count)
        } else {
            format!(
                "Audit log is invalid ({} entries): {} hash mismatches, {} chain breaks",
                self.entry_count,
                self.count(ViolationKind::HashMismatch),
                self.count(ViolationKind::ChainBreak)
            )
        }
    }
}

/// Verify an in-memory sequence of entries in file order
pub fn verify_entries(entries: &[AuditEntry]) -> IntegrityReport {
    let mut violations = Vec::new();
    let mut previous_hash = "";

    for (i, entry) in entries.iter().enumerate() {
        let computed = entry.compute_hash();
        if entry.entry_hash != computed {
            violations.push(IntegrityViolation {
                kind: ViolationKind::HashMismatch,
                index: i,
                entry_id: entry.entry_id.clone(),
                expected: computed,
                found: entry.entry_hash.clone(),
            });
        }

        if entry.previous_hash != previous_hash {
            violations.push(IntegrityViolation {
                kind: ViolationKind::ChainBreak,
                index: i,
                entry_id: entry.entry_id.clone(),
                expected: previous_hash.to_string(),
                found: entry.previous_hash.clone(),
            });
        }

        previous_hash = entry.entry_hash.as_str();
    }

    for violation in &violations {
        warn!("{}", violation);
    }

    let report = IntegrityReport {
        is_valid: violations.is_empty(),
        entry_count: entries.len(),
        violations,
    };
    info!("{}", report.summary());
    report
}

/// Load and verify a log file. A missing file is an empty, valid log.
pub fn verify_log_file(path: &Path) -> Result<IntegrityReport> {
    info!("Verifying audit log file: {}", path.display());
    let entries = load_entries(path)?;
    Ok(verify_entries(&entries))
}

/// Indices of entries whose stored hash does not match their contents
pub fn find_tampered_entries(entries: &[AuditEntry]) -> Vec<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| !entry.verify_hash())
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::AuditAction;

    fn build_chain(n: usize) -> Vec<AuditEntry> {
        let mut entries: Vec<AuditEntry> = Vec::new();
        for i in 0..n {
            let previous = entries.last().map(|e| e.entry_hash.clone()).unwrap_or_default();
            entries.push(
                AuditEntry::new("pipe", AuditAction::DataTransform)
                    .with_record_count(i as u64)
                    .seal(&previous),
            );
        }
        entries
    }

    #[test]
    fn test_empty_log_is_valid() {
        let report = verify_entries(&[]);
        assert!(report.is_valid);
        assert!(report.violations.is_empty());
        assert_eq!(report.entry_count, 0);
    }

    #[test]
    fn test_valid_chain() {
        let report = verify_entries(&build_chain(5));
        assert!(report.is_valid);
        assert_eq!(report.entry_count, 5);
        assert!(report.summary().starts_with("Audit log is valid"));
    }

    #[test]
    fn test_field_tamper_reports_single_mismatch() {
        let mut entries = build_chain(4);
        entries[1].record_count = Some(999);

        let report = verify_entries(&entries);
        assert!(!report.is_valid);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::HashMismatch);
        assert_eq!(report.violations[0].entry_id, entries[1].entry_id);
        assert_eq!(find_tampered_entries(&entries), vec![1]);
    }

    #[test]
    fn test_rehashed_entry_breaks_successor_link() {
        let mut entries = build_chain(3);
        entries[1].record_count = Some(7);
        entries[1].entry_hash = entries[1].compute_hash();

        let report = verify_entries(&entries);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::ChainBreak);
        assert_eq!(report.violations[0].index, 2);
    }

    #[test]
    fn test_deletion_reports_chain_break_after_gap() {
        let mut entries = build_chain(5);
        entries.remove(2);

        let report = verify_entries(&entries);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::ChainBreak);
        assert_eq!(report.violations[0].index, 2);
    }

    #[test]
    fn test_all_violations_collected() {
        let mut entries = build_chain(6);
        entries[0].stage = "tampered".to_string();
        entries[3].stage = "tampered".to_string();
        entries.swap(4, 5);

        let report = verify_entries(&entries);
        assert_eq!(report.count(ViolationKind::HashMismatch), 2);
        assert_eq!(report.count(ViolationKind::ChainBreak), 2);
        assert_eq!(report.messages().len(), 4);
    }

    #[test]
    fn test_fork_is_detected() {
        let mut entries = build_chain(2);
        let fork = AuditEntry::new("pipe", AuditAction::DataWrite).seal(&entries[0].entry_hash);
        entries.push(fork.clone());

        let report = verify_entries(&entries);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::ChainBreak);
        assert_eq!(report.violations[0].entry_id, fork.entry_id);
    }

    #[test]
    fn test_violation_display() {
        let violation = IntegrityViolation {
            kind: ViolationKind::HashMismatch,
            index: 3,
            entry_id: "abc".to_string(),
            expected: "11".to_string(),
            found: "22".to_string(),
        };
        assert_eq!(
            violation.to_string(),
            "Entry 3 (abc): Hash mismatch - expected 11, got 22"
        );
    }
}
