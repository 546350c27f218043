//! Toolchain lock command.

use std::path::Path;

use anyhow::{Context, Result};
use folio_pipeline::{Descriptor, Resolver};

/// Run the lock command.
pub fn run(config: &Path) -> Result<()> {
    let descriptor =
        Descriptor::load(config).with_context(|| format!("Failed to load {}", config.display()))?;

    let environment = Resolver::new(&descriptor)
        .update()
        .context("Failed to resolve toolchain")?;

    for (role, tool) in environment.tools() {
        println!("{:<10} {} {}", role, tool.name, tool.reference);
    }

    tracing::info!("Wrote {}", descriptor.lock_path().display());

    Ok(())
}
