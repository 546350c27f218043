//! Asset pipeline for the stylesheet and static files.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Asset pipeline utilities.
pub struct AssetPipeline;

impl AssetPipeline {
    /// Generate the main CSS file.
    pub fn generate_css() -> String {
        DEFAULT_CSS.to_string()
    }

    /// Minify CSS using lightningcss.
    pub fn minify_css(css: &str) -> Result<String, String> {
        use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

        let stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| format!("CSS parse error: {}", e))?;

        let minified = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| format!("CSS minify error: {}", e))?;

        Ok(minified.code)
    }

    /// Copy every file under `src` into `dest`, keeping relative paths.
    ///
    /// Files are visited in name order. Returns the number of files copied.
    pub fn copy_tree(src: &Path, dest: &Path) -> io::Result<usize> {
        let mut copied = 0;

        for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
            let target = dest.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }

        Ok(copied)
    }
}

pub(crate) const DEFAULT_CSS: &str = r#"/* folio default theme */

:root {
  --background: #fdfcfa;
  --foreground: #1f2328;
  --muted: #f3f1ed;
  --muted-foreground: #5b616b;
  --border: #e3dfd8;
  --primary: #8a3b12;
  --content-max-width: 42rem;
  --font-serif: "Iowan Old Style", "Palatino Linotype", Georgia, serif;
  --font-sans: system-ui, -apple-system, sans-serif;
  --font-mono: ui-monospace, "SFMono-Regular", Menlo, monospace;
}

@media (prefers-color-scheme: dark) {
  :root {
    --background: #15171a;
    --foreground: #e6e3de;
    --muted: #1f2226;
    --muted-foreground: #9aa0a8;
    --border: #2e3238;
    --primary: #e39b6b;
  }
}

* {
  box-sizing: border-box;
  margin: 0;
  padding: 0;
}

body {
  font-family: var(--font-serif);
  background: var(--background);
  color: var(--foreground);
  line-height: 1.7;
}

.site-header,
.site-footer,
.main {
  max-width: var(--content-max-width);
  margin: 0 auto;
  padding: 1.5rem 1.25rem;
}

.site-header {
  display: flex;
  flex-wrap: wrap;
  align-items: baseline;
  justify-content: space-between;
  gap: 1rem;
  border-bottom: 1px solid var(--border);
  font-family: var(--font-sans);
}

.nav-logo {
  font-weight: 700;
  font-size: 1.25rem;
  color: var(--foreground);
  text-decoration: none;
}

.nav-list {
  display: flex;
  gap: 1rem;
  list-style: none;
}

.nav-item a {
  color: var(--muted-foreground);
  text-decoration: none;
}

.nav-item a:hover {
  color: var(--primary);
}

.page-title {
  font-size: 2.25rem;
  line-height: 1.2;
  margin-bottom: 0.5rem;
}

.page-meta {
  font-family: var(--font-sans);
  font-size: 0.875rem;
  color: var(--muted-foreground);
  margin-bottom: 2rem;
}

.tag-list {
  display: inline-flex;
  flex-wrap: wrap;
  gap: 0.5rem;
  list-style: none;
}

.tag-list a {
  color: var(--primary);
}

.toc {
  background: var(--muted);
  border-radius: 0.5rem;
  padding: 1rem 1.25rem;
  margin-bottom: 2rem;
  font-family: var(--font-sans);
  font-size: 0.9rem;
}

.toc ul {
  list-style: none;
}

.toc-level-3 {
  margin-left: 1rem;
}

.content h2 {
  font-size: 1.5rem;
  margin: 2.5rem 0 1rem;
}

.content h3 {
  font-size: 1.2rem;
  margin: 2rem 0 0.75rem;
}

.content p,
.content ul,
.content ol,
.content blockquote,
.content table {
  margin-bottom: 1.25rem;
}

.content ul,
.content ol {
  padding-left: 1.5rem;
}

.content a {
  color: var(--primary);
  text-underline-offset: 3px;
}

.content blockquote {
  border-left: 3px solid var(--border);
  padding-left: 1rem;
  color: var(--muted-foreground);
}

.content img {
  max-width: 100%;
  height: auto;
}

.content pre {
  background: var(--muted);
  border: 1px solid var(--border);
  border-radius: 0.5rem;
  padding: 1rem;
  overflow-x: auto;
  font-size: 0.875rem;
  margin-bottom: 1.25rem;
}

.content code {
  font-family: var(--font-mono);
  font-size: 0.875em;
}

.content table {
  border-collapse: collapse;
  width: 100%;
}

.content th,
.content td {
  border: 1px solid var(--border);
  padding: 0.5rem 0.75rem;
  text-align: left;
}

.post-list {
  list-style: none;
}

.post-item {
  margin-bottom: 2rem;
}

.post-item h2 {
  font-size: 1.35rem;
  line-height: 1.3;
}

.post-item h2 a {
  color: var(--foreground);
  text-decoration: none;
}

.post-item h2 a:hover {
  color: var(--primary);
}

.post-summary {
  color: var(--muted-foreground);
}

.site-footer {
  border-top: 1px solid var(--border);
  font-family: var(--font-sans);
  font-size: 0.8rem;
  color: var(--muted-foreground);
}
"#;
