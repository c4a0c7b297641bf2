use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pipeline_provenance::config::DEFAULT_LOG_FILTER;
use pipeline_provenance::lineage::LineageTracker;

/// Report on a saved lineage snapshot
#[derive(Parser, Debug)]
#[command(name = "lineage-report", version, about)]
struct Args {
    /// Lineage snapshot (JSON) written by a pipeline run
    #[arg(short, long, value_name = "PATH")]
    snapshot: PathBuf,

    /// Show downstream impact of a change at this location
    #[arg(short, long, value_name = "LOCATION")]
    impact: Option<String>,

    /// Show the parent chain of this lineage id
    #[arg(short, long, value_name = "ID")]
    ancestors: Option<String>,

    /// Print machine-readable JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let tracker = LineageTracker::load(&args.snapshot)
        .with_context(|| format!("Failed to load snapshot {}", args.snapshot.display()))?;

    let summary = tracker.summary();
    let impact = args.impact.as_deref().map(|loc| tracker.impact_analysis(loc));
    let ancestors = args
        .ancestors
        .as_deref()
        .map(|id| tracker.get_ancestors(id));

    if args.json {
        let output = json!({
            "summary": summary,
            "impact": impact,
            "ancestors": ancestors,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Lineage Summary ({} / {}):", summary.pipeline_id, summary.run_id);
    println!("  Transformations: {}", summary.total_transformations);
    println!("  Input records: {}", summary.total_input_records);
    println!("  Output records: {}", summary.total_output_records);
    println!("  Filtered records: {}", summary.total_filtered_records);
    println!("  Failed records: {}", summary.total_failed_records);
    println!(
        "  Unique sources/destinations/transforms: {}/{}/{}",
        summary.unique_sources, summary.unique_destinations, summary.unique_transforms
    );

    if let Some(report) = impact {
        println!("\nImpact of {}:", report.source);
        println!("  Downstream steps: {}", report.total_downstream_records);
        println!("  Records impacted: {}", report.total_records_impacted);
        for destination in &report.affected_destinations {
            println!("  -> {}", destination);
        }
        for transform in &report.affected_transforms {
            println!("  via {}", transform);
        }
    }

    if let Some(chain) = ancestors {
        println!("\nAncestors:");
        if chain.is_empty() {
            println!("  (no record with that id)");
        }
        for record in chain {
            println!(
                "  {} {} -> [{}] -> {}",
                record.lineage_id,
                record.source_location,
                record.transformation,
                record.destination_location
            );
        }
    }

    Ok(())
}
