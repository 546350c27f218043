//! Static site builder.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use walkdir::WalkDir;

use folio_content::{parse_document, slugify, Document, PublishDate};

use crate::assets::AssetPipeline;
use crate::templates::{Context, NavItem, PageSummary, TagLink, TemplateEngine, TocEntry};
use crate::GENERATOR;

/// Configuration for building a static site.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory holding the markdown documents
    pub content_dir: PathBuf,

    /// Directory copied verbatim into the output
    pub static_dir: Option<PathBuf>,

    /// Directory with template overrides
    pub layouts_dir: Option<PathBuf>,

    /// Output directory
    pub output_dir: PathBuf,

    /// Minify the stylesheet
    pub minify: bool,

    /// Base URL for the site
    pub base_url: String,

    /// Site title
    pub title: String,

    /// Site description for feeds and meta tags
    pub description: String,

    /// Render documents marked `draft: true`
    pub include_drafts: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("content"),
            static_dir: Some(PathBuf::from("static")),
            layouts_dir: Some(PathBuf::from("layouts")),
            output_dir: PathBuf::from("public"),
            minify: true,
            base_url: "/".to_string(),
            title: "Notes".to_string(),
            description: String::new(),
            include_drafts: false,
        }
    }
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of content pages generated
    pub pages: usize,

    /// Number of drafts left out
    pub drafts: usize,

    /// Number of distinct tags
    pub tags: usize,

    /// Number of static and bundled files copied
    pub static_files: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to read content: {0}")]
    ReadError(String),

    #[error("Failed to parse {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("{first} and {second} both render to {path}")]
    DuplicateOutput {
        path: String,
        first: String,
        second: String,
    },

    #[error("Failed to render template: {0}")]
    TemplateError(String),

    #[error("Failed to write output: {0}")]
    WriteError(String),
}

/// A page to be built.
#[derive(Debug)]
struct PageInfo {
    /// Relative path from the content dir
    relative_path: PathBuf,

    /// Output path relative to the output dir
    output_path: PathBuf,

    /// Public URL
    url: String,

    /// Display title
    title: String,

    /// Parsed document
    doc: Document,
}

impl PageInfo {
    fn date(&self) -> Option<PublishDate> {
        self.doc.frontmatter.as_ref().and_then(|f| f.date)
    }

    fn tags(&self) -> &[String] {
        self.doc
            .frontmatter
            .as_ref()
            .map(|f| f.tags.as_slice())
            .unwrap_or_default()
    }

    fn description(&self) -> String {
        self.doc
            .frontmatter
            .as_ref()
            .and_then(|f| f.description.clone())
            .unwrap_or_else(|| self.doc.summary.clone())
    }

    /// Top-level directory under the content dir, if any.
    fn section(&self) -> Option<String> {
        let mut components = self.relative_path.components();
        let first = components.next()?;
        components.next()?;
        Some(first.as_os_str().to_string_lossy().to_string())
    }
}

/// Everything discovered under the content dir.
#[derive(Debug, Default)]
struct Discovery {
    /// Regular pages in path order
    pages: Vec<PageInfo>,

    /// `_index.md` documents (and a root `index.md`), keyed by directory
    intros: BTreeMap<PathBuf, PageInfo>,

    /// Non-markdown files living next to documents
    bundled: Vec<PathBuf>,

    /// Drafts that were left out
    drafts: usize,
}

/// A tag and the pages carrying it.
#[derive(Debug)]
struct TagInfo {
    name: String,
    pages: Vec<usize>,
}

/// Static site builder.
pub struct StaticBuilder {
    config: BuildConfig,
}

impl StaticBuilder {
    /// Create a new static builder.
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Build the static site.
    ///
    /// Every document is parsed before anything is written, so a malformed
    /// document leaves the output directory untouched.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        let discovery = self.discover()?;
        let tags = self.collect_tags(&discovery.pages);
        let sections = self.collect_sections(&discovery);
        self.check_duplicates(&discovery, &sections, &tags)?;

        let templates = TemplateEngine::with_layouts(self.config.layouts_dir.as_deref())
            .map_err(|e| BuildError::TemplateError(e.to_string()))?;

        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        for page in &discovery.pages {
            self.render_page(&templates, page, &sections, &tags)?;
        }

        self.render_home(&templates, &discovery, &sections, &tags)?;
        for (dir, title) in &sections {
            self.render_section(&templates, &discovery, &sections, &tags, dir, title)?;
        }
        self.render_tags(&templates, &discovery.pages, &sections, &tags)?;
        self.render_not_found(&templates, &sections)?;

        self.generate_assets()?;
        let static_files = self.copy_static(&discovery.bundled)?;

        let listing = listing_order(&discovery.pages);
        self.generate_sitemap(&discovery.pages, &sections, &tags)?;
        self.generate_feed(&discovery.pages, &listing)?;
        self.generate_search_index(&discovery.pages, &listing)?;

        let duration = start.elapsed();

        tracing::info!(
            "Rendered {} pages ({} drafts skipped, {} tags)",
            discovery.pages.len(),
            discovery.drafts,
            tags.len()
        );

        Ok(BuildResult {
            pages: discovery.pages.len(),
            drafts: discovery.drafts,
            tags: tags.len(),
            static_files,
            duration_ms: duration.as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        })
    }

    /// Discover and parse all documents in the content directory.
    fn discover(&self) -> Result<Discovery, BuildError> {
        let mut discovery = Discovery::default();
        let mut draft_bundles: Vec<PathBuf> = Vec::new();
        let content_dir = &self.config.content_dir;

        if !content_dir.exists() {
            tracing::warn!(
                "Content directory not found: {} (building an empty site)",
                content_dir.display()
            );
            return Ok(discovery);
        }

        let walker = WalkDir::new(content_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for entry in walker {
            let entry = entry.map_err(|e| BuildError::ReadError(e.to_string()))?;
            let path = entry.path();

            if !entry.file_type().is_file() {
                continue;
            }

            let relative_path = path.strip_prefix(content_dir).unwrap_or(path).to_path_buf();

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext != "md" && ext != "markdown" {
                discovery.bundled.push(relative_path);
                continue;
            }

            let content = fs::read_to_string(path)
                .map_err(|e| BuildError::ReadError(format!("{}: {}", path.display(), e)))?;

            let doc = parse_document(&content).map_err(|e| BuildError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

            let stem = relative_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("index")
                .to_string();
            let parent = relative_path.parent().unwrap_or(Path::new("")).to_path_buf();
            let is_intro = stem == "_index" || (stem == "index" && parent.as_os_str().is_empty());

            if doc.is_draft() && !self.config.include_drafts {
                tracing::debug!("Skipping draft {}", relative_path.display());
                discovery.drafts += 1;
                // A draft bundle takes its files with it
                if stem == "index" && !is_intro {
                    draft_bundles.push(parent);
                }
                continue;
            }

            let output_path = if is_intro {
                parent.join("index.html")
            } else {
                self.calculate_output_path(&relative_path, &doc)
                    .map_err(|message| BuildError::ParseError {
                        path: path.display().to_string(),
                        message,
                    })?
            };
            let url = self.path_to_url(&output_path);
            let title = doc
                .title()
                .map(str::to_string)
                .unwrap_or_else(|| capitalize(&stem.replace(['-', '_'], " ")));

            let page = PageInfo {
                relative_path,
                output_path,
                url,
                title,
                doc,
            };

            if is_intro {
                discovery.intros.insert(parent, page);
            } else {
                discovery.pages.push(page);
            }
        }

        discovery
            .bundled
            .retain(|file| !draft_bundles.iter().any(|dir| file.starts_with(dir)));

        Ok(discovery)
    }

    /// Calculate the output path for a regular page, relative to the output dir.
    ///
    /// A slug may only name directories below the document's own directory.
    fn calculate_output_path(&self, relative: &Path, doc: &Document) -> Result<PathBuf, String> {
        let parent = relative.parent().unwrap_or(Path::new(""));

        // Check for slug override
        if let Some(slug) = doc.frontmatter.as_ref().and_then(|f| f.slug.as_deref()) {
            let slug = slug.trim_matches('/');
            if !slug.is_empty() {
                let slug_path = Path::new(slug);
                if !slug_path.components().all(|c| matches!(c, Component::Normal(_))) {
                    return Err(format!("invalid slug '{}'", slug));
                }
                return Ok(parent.join(slug_path).join("index.html"));
            }
        }

        let stem = relative
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("index");

        if stem == "index" {
            // content/posts/bundle/index.md -> posts/bundle/index.html
            Ok(parent.join("index.html"))
        } else {
            // content/posts/hello.md -> posts/hello/index.html
            Ok(parent.join(stem).join("index.html"))
        }
    }

    /// Convert a relative output path to a URL.
    fn path_to_url(&self, path: &Path) -> String {
        let segments: Vec<String> = path
            .parent()
            .map(|p| {
                p.components()
                    .filter_map(|c| match c {
                        Component::Normal(s) => Some(s.to_string_lossy().to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if segments.is_empty() {
            self.config.base_url.clone()
        } else {
            format!("{}{}/", self.config.base_url, segments.join("/"))
        }
    }

    /// Fail when two outputs would land on the same file.
    ///
    /// Documents, bundled files and generated pages all claim their paths.
    /// The home page and section listings belong to their intro document
    /// when there is one.
    fn check_duplicates(
        &self,
        discovery: &Discovery,
        sections: &BTreeMap<String, String>,
        tags: &BTreeMap<String, TagInfo>,
    ) -> Result<(), BuildError> {
        let mut seen: BTreeMap<PathBuf, String> = BTreeMap::new();

        for page in discovery.intros.values().chain(discovery.pages.iter()) {
            claim(
                &mut seen,
                page.output_path.clone(),
                page.relative_path.display().to_string(),
            )?;
        }
        for file in &discovery.bundled {
            claim(&mut seen, file.clone(), file.display().to_string())?;
        }

        let mut generated: Vec<(PathBuf, String)> = tags
            .iter()
            .map(|(slug, tag)| {
                (
                    Path::new("tags").join(slug).join("index.html"),
                    format!("the #{} tag page", tag.name),
                )
            })
            .collect();
        generated.push((PathBuf::from("tags/index.html"), "the tag index".to_string()));
        if !discovery.intros.contains_key(Path::new("")) {
            generated.push((PathBuf::from("index.html"), "the home page".to_string()));
        }
        for dir in sections.keys() {
            if !discovery.intros.contains_key(Path::new(dir)) {
                generated.push((
                    Path::new(dir).join("index.html"),
                    format!("the {} listing", dir),
                ));
            }
        }
        for file in [
            "404.html",
            "assets/main.css",
            "sitemap.xml",
            "robots.txt",
            "index.xml",
            "search-index.json",
        ] {
            generated.push((PathBuf::from(file), format!("the generated {}", file)));
        }

        for (path, owner) in generated {
            claim(&mut seen, path, owner)?;
        }

        Ok(())
    }

    fn collect_tags(&self, pages: &[PageInfo]) -> BTreeMap<String, TagInfo> {
        let mut tags: BTreeMap<String, TagInfo> = BTreeMap::new();

        for (index, page) in pages.iter().enumerate() {
            let mut seen = BTreeSet::new();
            for name in page.tags() {
                let slug = slugify(name);
                if slug.is_empty() {
                    tracing::warn!("Ignoring tag '{}' in {}", name, page.relative_path.display());
                    continue;
                }
                if !seen.insert(slug.clone()) {
                    continue;
                }
                tags.entry(slug)
                    .or_insert_with(|| TagInfo {
                        name: name.clone(),
                        pages: Vec::new(),
                    })
                    .pages
                    .push(index);
            }
        }

        tags
    }

    /// Top-level directories with a page or an `_index.md`, mapped to their
    /// titles.
    ///
    /// A section whose index path is taken by a page bundle gets no listing.
    fn collect_sections(&self, discovery: &Discovery) -> BTreeMap<String, String> {
        let taken: BTreeSet<&Path> = discovery
            .pages
            .iter()
            .map(|p| p.output_path.as_path())
            .collect();

        let from_intros = discovery.intros.keys().filter_map(|dir| {
            let mut components = dir.components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(name)), None) => Some(name.to_string_lossy().to_string()),
                _ => None,
            }
        });
        let candidates: BTreeSet<String> = discovery
            .pages
            .iter()
            .filter_map(PageInfo::section)
            .chain(from_intros)
            .collect();

        let mut sections = BTreeMap::new();
        for section in candidates {
            if taken.contains(Path::new(&section).join("index.html").as_path()) {
                continue;
            }
            let title = discovery
                .intros
                .get(Path::new(&section))
                .map(|intro| intro.title.clone())
                .unwrap_or_else(|| capitalize(&section));
            sections.entry(section).or_insert(title);
        }

        sections
    }

    /// Build navigation, marking the item at `active` as active.
    fn build_navigation(&self, sections: &BTreeMap<String, String>, active: &str) -> Vec<NavItem> {
        let mut nav = vec![NavItem {
            title: "Home".to_string(),
            path: self.config.base_url.clone(),
            active: false,
        }];

        for (dir, title) in sections {
            nav.push(NavItem {
                title: title.clone(),
                path: format!("{}{}/", self.config.base_url, dir),
                active: false,
            });
        }

        nav.push(NavItem {
            title: "Tags".to_string(),
            path: format!("{}tags/", self.config.base_url),
            active: false,
        });

        for item in &mut nav {
            item.active = item.path == active;
        }

        nav
    }

    fn base_context(&self, title: String, nav: Vec<NavItem>) -> Context {
        Context {
            title,
            site_title: self.config.title.clone(),
            site_description: self.config.description.clone(),
            nav,
            base_url: self.config.base_url.clone(),
            generator: GENERATOR.to_string(),
            ..Default::default()
        }
    }

    fn tag_link(&self, slug: &str, tag: &TagInfo) -> TagLink {
        TagLink {
            name: tag.name.clone(),
            url: format!("{}tags/{}/", self.config.base_url, slug),
            count: tag.pages.len(),
        }
    }

    fn page_tags(&self, page: &PageInfo, tags: &BTreeMap<String, TagInfo>) -> Vec<TagLink> {
        let mut links: Vec<TagLink> = Vec::new();
        for name in page.tags() {
            let slug = slugify(name);
            if let Some(tag) = tags.get(&slug) {
                if !links.iter().any(|l| l.name == tag.name) {
                    links.push(self.tag_link(&slug, tag));
                }
            }
        }
        links
    }

    fn summarize(&self, page: &PageInfo, tags: &BTreeMap<String, TagInfo>) -> PageSummary {
        let date = page.date();
        PageSummary {
            title: page.title.clone(),
            url: page.url.clone(),
            date: date.map(|d| d.human()),
            date_iso: date.map(|d| d.to_rfc3339()),
            summary: page.description(),
            tags: self.page_tags(page, tags),
        }
    }

    /// Render a single content page.
    fn render_page(
        &self,
        templates: &TemplateEngine,
        page: &PageInfo,
        sections: &BTreeMap<String, String>,
        tags: &BTreeMap<String, TagInfo>,
    ) -> Result<(), BuildError> {
        let active = page
            .section()
            .filter(|s| sections.contains_key(s))
            .map(|s| format!("{}{}/", self.config.base_url, s))
            .unwrap_or_default();

        let date = page.date();
        let context = Context {
            content: page.doc.render_html(),
            toc: page
                .doc
                .toc
                .iter()
                .map(|e| TocEntry {
                    title: e.title.clone(),
                    id: e.id.clone(),
                    level: e.level,
                })
                .collect(),
            date: date.map(|d| d.human()),
            date_iso: date.map(|d| d.to_rfc3339()),
            tags: self.page_tags(page, tags),
            ..self.base_context(page.title.clone(), self.build_navigation(sections, &active))
        };

        let html = templates
            .render_page("page.html", &context)
            .map_err(|e| BuildError::TemplateError(format!("{}: {}", page.relative_path.display(), e)))?;

        self.write_output(&page.output_path, html)
    }

    /// Render the home page listing every page, newest first.
    fn render_home(
        &self,
        templates: &TemplateEngine,
        discovery: &Discovery,
        sections: &BTreeMap<String, String>,
        tags: &BTreeMap<String, TagInfo>,
    ) -> Result<(), BuildError> {
        let intro = discovery.intros.get(Path::new(""));

        let context = Context {
            content: intro.map(|i| i.doc.render_html()).unwrap_or_default(),
            pages: listing_order(&discovery.pages)
                .into_iter()
                .map(|i| self.summarize(&discovery.pages[i], tags))
                .collect(),
            ..self.base_context(
                intro
                    .map(|i| i.title.clone())
                    .unwrap_or_else(|| self.config.title.clone()),
                self.build_navigation(sections, &self.config.base_url),
            )
        };

        self.render_list(templates, Path::new("index.html"), &context)
    }

    /// Render the listing of a top-level section.
    fn render_section(
        &self,
        templates: &TemplateEngine,
        discovery: &Discovery,
        sections: &BTreeMap<String, String>,
        tags: &BTreeMap<String, TagInfo>,
        dir: &str,
        title: &str,
    ) -> Result<(), BuildError> {
        let intro = discovery.intros.get(Path::new(dir));
        let url = format!("{}{}/", self.config.base_url, dir);

        let context = Context {
            content: intro.map(|i| i.doc.render_html()).unwrap_or_default(),
            pages: listing_order(&discovery.pages)
                .into_iter()
                .filter(|&i| discovery.pages[i].section().as_deref() == Some(dir))
                .map(|i| self.summarize(&discovery.pages[i], tags))
                .collect(),
            ..self.base_context(title.to_string(), self.build_navigation(sections, &url))
        };

        self.render_list(templates, &Path::new(dir).join("index.html"), &context)
    }

    /// Render the tag index and one listing per tag.
    fn render_tags(
        &self,
        templates: &TemplateEngine,
        pages: &[PageInfo],
        sections: &BTreeMap<String, String>,
        tags: &BTreeMap<String, TagInfo>,
    ) -> Result<(), BuildError> {
        let tags_url = format!("{}tags/", self.config.base_url);
        let listing = listing_order(pages);

        let index = Context {
            terms: tags.iter().map(|(slug, tag)| self.tag_link(slug, tag)).collect(),
            ..self.base_context("Tags".to_string(), self.build_navigation(sections, &tags_url))
        };
        self.render_list(templates, Path::new("tags/index.html"), &index)?;

        for (slug, tag) in tags {
            let context = Context {
                pages: listing
                    .iter()
                    .filter(|&&i| tag.pages.contains(&i))
                    .map(|&i| self.summarize(&pages[i], tags))
                    .collect(),
                ..self.base_context(
                    format!("#{}", tag.name),
                    self.build_navigation(sections, &tags_url),
                )
            };
            let path = Path::new("tags").join(slug).join("index.html");
            self.render_list(templates, &path, &context)?;
        }

        Ok(())
    }

    fn render_not_found(
        &self,
        templates: &TemplateEngine,
        sections: &BTreeMap<String, String>,
    ) -> Result<(), BuildError> {
        let context = Context {
            content: "<p>The page you were looking for does not exist.</p>".to_string(),
            ..self.base_context("Page not found".to_string(), self.build_navigation(sections, ""))
        };

        let html = templates
            .render_page("page.html", &context)
            .map_err(|e| BuildError::TemplateError(e.to_string()))?;
        self.write_output(Path::new("404.html"), html)
    }

    fn render_list(
        &self,
        templates: &TemplateEngine,
        path: &Path,
        context: &Context,
    ) -> Result<(), BuildError> {
        let html = templates
            .render_page("list.html", context)
            .map_err(|e| BuildError::TemplateError(format!("{}: {}", path.display(), e)))?;
        self.write_output(path, html)
    }

    /// Write a file below the output directory.
    fn write_output(&self, relative: &Path, contents: impl AsRef<[u8]>) -> Result<(), BuildError> {
        let path = self.config.output_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::WriteError(e.to_string()))?;
        }
        fs::write(&path, contents)
            .map_err(|e| BuildError::WriteError(format!("{}: {}", path.display(), e)))
    }

    /// Generate the stylesheet.
    fn generate_assets(&self) -> Result<(), BuildError> {
        let css = AssetPipeline::generate_css();
        let css = if self.config.minify {
            AssetPipeline::minify_css(&css).unwrap_or(css)
        } else {
            css
        };
        self.write_output(Path::new("assets/main.css"), css)
    }

    /// Copy files bundled with documents, then the static directory.
    ///
    /// Static files are copied last and win over generated files.
    fn copy_static(&self, bundled: &[PathBuf]) -> Result<usize, BuildError> {
        let mut copied = 0;

        for relative in bundled {
            let target = self.config.output_dir.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| BuildError::WriteError(e.to_string()))?;
            }
            fs::copy(self.config.content_dir.join(relative), &target)
                .map_err(|e| BuildError::WriteError(format!("{}: {}", target.display(), e)))?;
            copied += 1;
        }

        if let Some(static_dir) = self.config.static_dir.as_ref().filter(|d| d.is_dir()) {
            let count = AssetPipeline::copy_tree(static_dir, &self.config.output_dir)
                .map_err(|e| BuildError::WriteError(e.to_string()))?;
            tracing::info!("Copied {} static files from {}", count, static_dir.display());
            copied += count;
        }

        Ok(copied)
    }

    /// Generate sitemap and robots.txt.
    fn generate_sitemap(
        &self,
        pages: &[PageInfo],
        sections: &BTreeMap<String, String>,
        tags: &BTreeMap<String, TagInfo>,
    ) -> Result<(), BuildError> {
        let mut entries: Vec<(String, Option<String>)> =
            vec![(self.config.base_url.clone(), None)];
        entries.extend(
            sections
                .keys()
                .map(|dir| (format!("{}{}/", self.config.base_url, dir), None)),
        );
        entries.extend(
            pages
                .iter()
                .map(|page| (page.url.clone(), page.date().map(|d| d.ymd()))),
        );
        entries.push((format!("{}tags/", self.config.base_url), None));
        entries.extend(
            tags.keys()
                .map(|slug| (format!("{}tags/{}/", self.config.base_url, slug), None)),
        );

        let urls: Vec<String> = entries
            .iter()
            .map(|(loc, lastmod)| match lastmod {
                Some(date) => format!(
                    "  <url>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n  </url>",
                    escape_xml(loc),
                    date
                ),
                None => format!("  <url>\n    <loc>{}</loc>\n  </url>", escape_xml(loc)),
            })
            .collect();

        let sitemap = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{}
</urlset>
"#,
            urls.join("\n")
        );
        self.write_output(Path::new("sitemap.xml"), sitemap)?;

        let robots = format!(
            "User-agent: *\nAllow: /\nSitemap: {}sitemap.xml\n",
            self.config.base_url
        );
        self.write_output(Path::new("robots.txt"), robots)
    }

    /// Generate an RSS 2.0 feed of all pages, newest first.
    fn generate_feed(&self, pages: &[PageInfo], listing: &[usize]) -> Result<(), BuildError> {
        let items: Vec<String> = listing
            .iter()
            .map(|&i| {
                let page = &pages[i];
                let mut item = format!(
                    "    <item>\n      <title>{}</title>\n      <link>{}</link>\n      <guid>{}</guid>\n",
                    escape_xml(&page.title),
                    escape_xml(&page.url),
                    escape_xml(&page.url)
                );
                if let Some(date) = page.date() {
                    item.push_str(&format!("      <pubDate>{}</pubDate>\n", date.to_rfc2822()));
                }
                item.push_str(&format!(
                    "      <description>{}</description>\n    </item>",
                    escape_xml(&page.description())
                ));
                item
            })
            .collect();

        let mut feed = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n  <channel>\n    <title>{}</title>\n    <link>{}</link>\n    <description>{}</description>\n    <generator>{}</generator>\n",
            escape_xml(&self.config.title),
            escape_xml(&self.config.base_url),
            escape_xml(&self.config.description),
            GENERATOR
        );
        for item in items {
            feed.push_str(&item);
            feed.push('\n');
        }
        feed.push_str("  </channel>\n</rss>\n");

        self.write_output(Path::new("index.xml"), feed)
    }

    /// Generate search index.
    fn generate_search_index(&self, pages: &[PageInfo], listing: &[usize]) -> Result<(), BuildError> {
        let index: Vec<serde_json::Value> = listing
            .iter()
            .map(|&i| {
                let page = &pages[i];
                serde_json::json!({
                    "title": page.title,
                    "description": page.description(),
                    "url": page.url,
                    "date": page.date().map(|d| d.to_rfc3339()),
                    "tags": page.tags(),
                    "content": page.doc.summary,
                })
            })
            .collect();

        let json = serde_json::to_string_pretty(&index)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        self.write_output(Path::new("search-index.json"), json)
    }
}

fn claim(seen: &mut BTreeMap<PathBuf, String>, path: PathBuf, owner: String) -> Result<(), BuildError> {
    if let Some(first) = seen.get(&path) {
        return Err(BuildError::DuplicateOutput {
            path: path.display().to_string(),
            first: first.clone(),
            second: owner,
        });
    }
    seen.insert(path, owner);
    Ok(())
}

/// Indices of `pages` in listing order: dated pages newest first, then
/// undated pages, ties broken by URL.
fn listing_order(pages: &[PageInfo]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..pages.len()).collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (&pages[a], &pages[b]);
        let by_date = match (a.date(), b.date()) {
            (Some(da), Some(db)) => db.cmp(&da),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date.then_with(|| a.url.cmp(&b.url))
    });
    order
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Capitalize first letter of a string.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
