//! Initialize a folio package.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub fn run(config: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing folio package...");

    let root = match config.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    if config.exists() && !yes {
        tracing::warn!("{} already exists. Use --yes to overwrite.", config.display());
        return Ok(());
    }

    fs::create_dir_all(&root).context("Failed to create package directory")?;

    let name = package_name(&root);
    fs::write(config, default_config(&name))
        .with_context(|| format!("Failed to write {}", config.display()))?;
    tracing::info!("Created {}", config.display());

    let content_dir = root.join("content");
    fs::create_dir_all(content_dir.join("posts")).context("Failed to create content directory")?;

    let post_path = content_dir.join("posts").join("hello-world.md");
    if !post_path.exists() || yes {
        fs::write(&post_path, DEFAULT_POST).context("Failed to write hello-world.md")?;
        tracing::info!("Created content/posts/hello-world.md");
    }

    let draft_path = content_dir.join("posts").join("work-in-progress.md");
    if !draft_path.exists() || yes {
        fs::write(&draft_path, DEFAULT_DRAFT).context("Failed to write work-in-progress.md")?;
        tracing::info!("Created content/posts/work-in-progress.md");
    }

    let static_dir = root.join("static");
    if !static_dir.exists() {
        fs::create_dir_all(&static_dir).context("Failed to create static directory")?;
    }

    let ignore_path = root.join(".gitignore");
    if !ignore_path.exists() {
        fs::write(&ignore_path, DEFAULT_GITIGNORE).context("Failed to write .gitignore")?;
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'folio build' to build the site into result/.");

    Ok(())
}

/// Package name from the directory name, falling back to `site`.
fn package_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .and_then(|path| path.file_name().map(|n| n.to_string_lossy().replace(['"', '\\'], "")))
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "site".to_string())
}

fn default_config(name: &str) -> String {
    format!(
        r#"# Folio package descriptor

[package]
name = "{name}"
source = "."

[toolchain]
# "builtin", or an external generator on PATH (also set build.command)
generator = "builtin"

[install]
dest = "result"

[site]
title = "{name}"
description = ""
base_url = "/"
include_drafts = false
"#
    )
}

const DEFAULT_POST: &str = r#"---
title: Hello, World
date: 1980-01-01
tags: [meta]
description: The first post.
---

This site is built by **folio** from the markdown files in `content/`.

## Writing

Each post starts with a metadata header:

```yaml
---
title: Post Title
date: 2024-05-01
tags: [one, two]
draft: false
---
```

Posts marked `draft: true` are left out of the build.
"#;

const DEFAULT_DRAFT: &str = r#"---
title: Work in Progress
draft: true
---

Not published until the draft flag is removed.
"#;

const DEFAULT_GITIGNORE: &str = "/.folio/\n/result\n";
