//! Build command implementation

use anyhow::{Context, Result};
use sift_index::Pipeline;

use super::IndexArgs;

pub fn run(args: IndexArgs) -> Result<()> {
    let config = args.load_config()?;
    let pipeline = Pipeline::new(config);
    println!("Building index from {}", pipeline.config().data_dir.display());

    let report = pipeline
        .run()
        .with_context(|| format!("Build failed at stage {}", pipeline.stage()))?;
    if report.is_noop() {
        println!("Index is complete, nothing to do");
        return Ok(());
    }
    if let Some(stats) = report.tokenize {
        println!(
            "tokenize: {} documents, {} terms, {} postings, {} records skipped",
            stats.documents, stats.terms, stats.postings, stats.skipped_records
        );
    }
    if let Some(stats) = report.sort {
        println!(
            "sort: {} records, {} initial runs, {} merge rounds, peak {} resident records",
            stats.records, stats.initial_runs, stats.rounds, stats.peak_resident_records
        );
    }
    if let Some(stats) = report.build {
        println!(
            "build: {} posting lists ({} bytes), tree of {} pages, height {}",
            stats.terms, stats.posting_bytes, stats.tree_pages, stats.tree_height
        );
    }
    Ok(())
}
