use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pipeline_provenance::audit::{load_entries, verify_entries, AuditSummary};
use pipeline_provenance::config::DEFAULT_LOG_FILTER;

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("pipeline_provenance=debug,verify_audit_log=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{},verify_audit_log=info", DEFAULT_LOG_FILTER)))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let matches = Command::new("verify-audit-log")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Verify the hash chain of a pipeline audit log")
        .arg(
            Arg::new("log-path")
                .short('l')
                .long("log-path")
                .value_name("PATH")
                .help("Path to audit log file (JSONL)")
                .required(true),
        )
        .arg(
            Arg::new("export-csv")
                .long("export-csv")
                .value_name("PATH")
                .help("Also write the log as CSV to this path"),
        )
        .arg(
            Arg::new("summary")
                .short('s')
                .long("summary")
                .action(ArgAction::SetTrue)
                .help("Print counts by action and level"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppress output except errors"),
        )
        .get_matches();

    let log_path = PathBuf::from(
        matches
            .get_one::<String>("log-path")
            .context("--log-path is required")?,
    );
    let verbose = matches.get_flag("verbose");
    let quiet = matches.get_flag("quiet");
    init_tracing(verbose, quiet);

    if !log_path.exists() {
        anyhow::bail!("Audit log file not found: {}", log_path.display());
    }

    let entries = load_entries(&log_path)
        .with_context(|| format!("Failed to read audit log {}", log_path.display()))?;
    info!("Loaded {} audit log entries", entries.len());

    let report = verify_entries(&entries);

    if matches.get_flag("summary") && !quiet {
        let pipeline_id = entries
            .first()
            .map(|e| e.pipeline_id.as_str())
            .unwrap_or_default();
        let summary = AuditSummary::from_entries(&entries, pipeline_id);
        println!("Audit Log Summary:");
        println!("  Total entries: {}", summary.total_entries);
        if let (Some(first), Some(last)) = (summary.first_entry, summary.last_entry) {
            println!("  First entry: {}", first.to_rfc3339());
            println!("  Last entry: {}", last.to_rfc3339());
        }
        if let Some(head) = entries.last() {
            println!("  Head hash: {}", head.entry_hash);
        }
        println!("  Actions:");
        for (action, count) in &summary.actions {
            println!("    {}: {}", action, count);
        }
        println!("  Levels:");
        for (level, count) in &summary.levels {
            println!("    {}: {}", level, count);
        }
    }

    if let Some(csv_path) = matches.get_one::<String>("export-csv") {
        let rows = pipeline_provenance::audit::export::write_csv(&entries, std::path::Path::new(csv_path))
            .with_context(|| format!("Failed to export CSV to {}", csv_path))?;
        if !quiet {
            println!("Exported {} rows to {}", rows, csv_path);
        }
    }

    if !report.is_valid {
        for message in report.messages() {
            eprintln!("{}", message);
        }
        error!("{}", report.summary());
        std::process::exit(1);
    }

    if !quiet {
        println!("✓ {}", report.summary());
    }

    Ok(())
}
