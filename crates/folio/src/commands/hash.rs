//! Directory hash command.

use std::path::Path;

use anyhow::{bail, Context, Result};
use folio_pipeline::hash_directory;

/// Run the hash command.
pub fn run(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!("Not a directory: {}", dir.display());
    }

    let hash = hash_directory(dir).with_context(|| format!("Failed to hash {}", dir.display()))?;
    println!("{}", hash.to_reference());

    Ok(())
}
