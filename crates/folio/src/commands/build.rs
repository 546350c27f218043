//! Package build command.

use std::path::Path;

use anyhow::{Context, Result};
use folio_pipeline::Pipeline;

/// Run the build command.
pub fn run(config: &Path) -> Result<()> {
    let mut pipeline = Pipeline::load(config)
        .with_context(|| format!("Failed to load {}", config.display()))?;

    tracing::info!("Building {}...", pipeline.descriptor().name());

    let report = pipeline
        .run()
        .with_context(|| format!("Build of {} failed", pipeline.descriptor().name()))?;

    match (report.pages, report.drafts) {
        (Some(pages), Some(drafts)) => tracing::info!(
            "Built {} pages ({} drafts skipped) in {}ms",
            pages,
            drafts,
            report.duration_ms
        ),
        _ => tracing::info!("Built in {}ms", report.duration_ms),
    }

    tracing::info!("Installed {} files to {}", report.files, report.dest.display());
    tracing::info!("Environment: {}", report.environment);
    println!("{}", report.hash.to_reference());

    Ok(())
}
