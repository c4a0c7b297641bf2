#![allow(dead_code)]

use pipeline_provenance::audit::{AuditAction, AuditEntry, AuditLogger};
use pipeline_provenance::lineage::{RecordRequest, SourceType};
use std::path::Path;

/// Log `count` transform entries through a fresh logger on `path`
pub fn log_entries(path: &Path, count: usize) -> Vec<AuditEntry> {
    let mut logger = AuditLogger::open_with(path, "test-pipeline", "Test Pipeline", "tester")
        .expect("open audit log");
    (0..count)
        .map(|i| {
            logger
                .log(
                    AuditEntry::new("", AuditAction::DataTransform)
                        .with_stage(format!("stage-{}", i))
                        .with_record_count(i as u64 * 10),
                )
                .expect("log entry")
        })
        .collect()
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("read log")
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn write_lines(path: &Path, lines: &[String]) {
    let mut contents = lines.join("\n");
    contents.push('\n');
    std::fs::write(path, contents).expect("write log");
}

/// A file-to-file step with the given counts
pub fn file_step(source: &str, destination: &str, input: u64, output: u64) -> RecordRequest {
    RecordRequest::new(
        SourceType::File,
        source,
        format!("move_{}", destination),
        SourceType::File,
        destination,
        input,
        output,
    )
}
