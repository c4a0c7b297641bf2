//! Property-based tests for the audit hash chain.
//!
//! - Any sequence of logged entries verifies immediately afterwards
//! - Mutating one entry's record count yields exactly one hash mismatch
//! - Entry hashes are always 64 lowercase hex characters

use pipeline_provenance::audit::{verify_entries, AuditAction, AuditEntry, AuditLogger, ViolationKind};
use proptest::prelude::*;
use tempfile::tempdir;

fn arb_action() -> impl Strategy<Value = AuditAction> {
    prop::sample::select(AuditAction::ALL.to_vec())
}

fn arb_entry() -> impl Strategy<Value = AuditEntry> {
    (arb_action(), "[a-z]{0,12}", proptest::option::of(0u64..1_000_000), "[ -~]{0,24}").prop_map(
        |(action, stage, count, note)| {
            let mut entry = AuditEntry::new("prop", action)
                .with_stage(stage)
                .with_detail("note", note);
            entry.record_count = count;
            entry
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn logged_chain_always_verifies(entries in prop::collection::vec(arb_entry(), 0..20)) {
        let dir = tempdir().unwrap();
        let mut logger = AuditLogger::open(dir.path().join("audit.jsonl")).unwrap();
        for entry in entries.clone() {
            logger.log(entry).unwrap();
        }

        let report = logger.verify_chain_integrity().unwrap();
        prop_assert!(report.is_valid);
        prop_assert_eq!(report.entry_count, entries.len());
    }

    #[test]
    fn single_mutation_is_one_mismatch(
        entries in prop::collection::vec(arb_entry(), 1..12),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut sealed: Vec<AuditEntry> = Vec::new();
        for entry in entries {
            let previous = sealed.last().map(|e| e.entry_hash.clone()).unwrap_or_default();
            sealed.push(entry.seal(&previous));
        }

        let target = pick.index(sealed.len());
        sealed[target].record_count = Some(sealed[target].record_count.map_or(1, |c| c + 1));

        let report = verify_entries(&sealed);
        prop_assert_eq!(report.violations.len(), 1);
        prop_assert_eq!(report.violations[0].kind, ViolationKind::HashMismatch);
        prop_assert_eq!(report.violations[0].index, target);
    }

    #[test]
    fn entry_hash_shape(entry in arb_entry(), previous in "[0-9a-f]{0,64}") {
        let sealed = entry.seal(&previous);
        prop_assert_eq!(sealed.entry_hash.len(), 64);
        prop_assert!(sealed.entry_hash.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        prop_assert!(sealed.verify_hash());
    }
}
