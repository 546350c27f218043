//! Template engine for rendering site pages.

use std::path::Path;

use minijinja::{path_loader, Environment};

/// A navigation item.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct NavItem {
    /// Display title
    pub title: String,
    /// URL path
    pub path: String,
    /// Whether this is the active page
    pub active: bool,
}

/// A table of contents entry.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TocEntry {
    /// Heading text
    pub title: String,
    /// Anchor ID
    pub id: String,
    /// Heading level (1-6)
    pub level: u8,
}

/// A tag as linked from a page or listed on the tag index.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TagLink {
    /// Tag as authored
    pub name: String,
    /// URL of the tag page
    pub url: String,
    /// Number of pages carrying the tag
    pub count: usize,
}

/// A page as shown in a listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PageSummary {
    pub title: String,
    pub url: String,
    pub date: Option<String>,
    pub date_iso: Option<String>,
    pub summary: String,
    pub tags: Vec<TagLink>,
}

/// Context for rendering a template.
///
/// Page templates read `content`, `toc`, `date` and `tags`; list templates
/// read `content` as an introduction plus `pages` and `terms`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Context {
    /// Page title
    pub title: String,
    /// Site title
    pub site_title: String,
    /// Site description
    pub site_description: String,
    /// Rendered content HTML
    pub content: String,
    /// Navigation items
    pub nav: Vec<NavItem>,
    /// Table of contents
    pub toc: Vec<TocEntry>,
    /// Base URL
    pub base_url: String,
    /// Human readable publication date
    pub date: Option<String>,
    /// Machine readable publication date
    pub date_iso: Option<String>,
    /// Tags of this page
    pub tags: Vec<TagLink>,
    /// Pages of a listing
    pub pages: Vec<PageSummary>,
    /// Tags of a tag index
    pub terms: Vec<TagLink>,
    /// Generator identity for the meta tag
    pub generator: String,
}

/// Names of the built-in templates with their sources.
pub(crate) const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("base.html", BASE_TEMPLATE),
    ("page.html", PAGE_TEMPLATE),
    ("list.html", LIST_TEMPLATE),
    ("nav.html", NAV_TEMPLATE),
];

/// Template engine using minijinja.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create a template engine with the built-in templates only.
    pub fn new() -> Result<Self, minijinja::Error> {
        Self::with_layouts(None)
    }

    /// Create a template engine where files in `layouts_dir` replace the
    /// built-in templates of the same name.
    pub fn with_layouts(layouts_dir: Option<&Path>) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();

        let layouts_dir = layouts_dir.filter(|dir| dir.is_dir());
        if let Some(dir) = layouts_dir {
            tracing::debug!("Loading layout overrides from {}", dir.display());
            env.set_loader(path_loader(dir));
        }

        for (name, source) in BUILTIN_TEMPLATES {
            if layouts_dir.is_some_and(|dir| dir.join(name).is_file()) {
                tracing::info!("Using layout override for {}", name);
                continue;
            }
            env.add_template(name, source)?;
        }

        Ok(Self { env })
    }

    /// Render a page using the specified template.
    pub fn render_page(&self, template: &str, context: &Context) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template(template)?;
        tmpl.render(context)
    }
}

const BASE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <meta name="generator" content="{{ generator }}">
  {% if site_description %}<meta name="description" content="{{ site_description }}">
  {% endif %}<title>{% if title and title != site_title %}{{ title }} - {% endif %}{{ site_title }}</title>
  <link rel="stylesheet" href="{{ base_url }}assets/main.css">
  <link rel="alternate" type="application/rss+xml" title="{{ site_title }}" href="{{ base_url }}index.xml">
</head>
<body>
  <header class="site-header">
    {% include "nav.html" %}
  </header>
  <main class="main">
    {% block content %}{% endblock %}
  </main>
  <footer class="site-footer">
    <p>{{ site_title }}</p>
  </footer>
</body>
</html>"##;

const PAGE_TEMPLATE: &str = r##"{% extends "base.html" %}

{% block content %}
<article class="post">
  <h1 class="page-title">{{ title }}</h1>
  {% if date or tags %}
  <div class="page-meta">
    {% if date %}<time datetime="{{ date_iso }}">{{ date }}</time>{% endif %}
    {% if tags %}
    <ul class="tag-list">
    {% for tag in tags %}<li><a href="{{ tag.url }}">#{{ tag.name }}</a></li>{% endfor %}
    </ul>
    {% endif %}
  </div>
  {% endif %}

  {% if toc | length > 2 %}
  <nav class="toc">
    <ul>
    {% for entry in toc %}
      <li class="toc-level-{{ entry.level }}"><a href="#{{ entry.id }}">{{ entry.title }}</a></li>
    {% endfor %}
    </ul>
  </nav>
  {% endif %}

  <div class="content">
    {{ content | safe }}
  </div>
</article>
{% endblock %}"##;

const LIST_TEMPLATE: &str = r##"{% extends "base.html" %}

{% block content %}
<section class="listing">
  <h1 class="page-title">{{ title }}</h1>
  {% if content %}
  <div class="content">
    {{ content | safe }}
  </div>
  {% endif %}

  {% if terms %}
  <ul class="tag-list">
  {% for term in terms %}
    <li><a href="{{ term.url }}">#{{ term.name }}</a> ({{ term.count }})</li>
  {% endfor %}
  </ul>
  {% endif %}

  {% if pages %}
  <ul class="post-list">
  {% for page in pages %}
    <li class="post-item">
      <h2><a href="{{ page.url }}">{{ page.title }}</a></h2>
      {% if page.date %}<p class="page-meta"><time datetime="{{ page.date_iso }}">{{ page.date }}</time></p>{% endif %}
      {% if page.summary %}<p class="post-summary">{{ page.summary }}</p>{% endif %}
    </li>
  {% endfor %}
  </ul>
  {% endif %}
</section>
{% endblock %}"##;

const NAV_TEMPLATE: &str = r##"<a href="{{ base_url }}" class="nav-logo">{{ site_title }}</a>
<nav>
  <ul class="nav-list">
  {% for item in nav %}
    <li class="nav-item{% if item.active %} active{% endif %}"><a href="{{ item.path }}">{{ item.title }}</a></li>
  {% endfor %}
  </ul>
</nav>"##;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn context(title: &str) -> Context {
        Context {
            title: title.to_string(),
            site_title: "UI Paradigms".to_string(),
            base_url: "/".to_string(),
            generator: "folio-site test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn renders_basic_page() {
        let engine = TemplateEngine::new().unwrap();

        let ctx = Context {
            content: "<p>Hello world</p>".to_string(),
            date: Some("March 1, 2024".to_string()),
            date_iso: Some("2024-03-01T00:00:00+00:00".to_string()),
            ..context("Immediate Mode")
        };

        let html = engine.render_page("page.html", &ctx).unwrap();

        assert!(html.contains("<title>Immediate Mode - UI Paradigms</title>"));
        assert!(html.contains("<p>Hello world</p>"));
        assert!(html.contains(r#"<time datetime="2024-03-01T00:00:00+00:00">March 1, 2024</time>"#));
    }

    #[test]
    fn escapes_titles() {
        let engine = TemplateEngine::new().unwrap();

        let html = engine
            .render_page("page.html", &context("<script>alert(1)</script>"))
            .unwrap();

        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn renders_navigation() {
        let engine = TemplateEngine::new().unwrap();

        let ctx = Context {
            nav: vec![
                NavItem {
                    title: "Home".to_string(),
                    path: "/".to_string(),
                    active: true,
                },
                NavItem {
                    title: "Tags".to_string(),
                    path: "/tags/".to_string(),
                    active: false,
                },
            ],
            ..context("Home")
        };

        let html = engine.render_page("list.html", &ctx).unwrap();

        // minijinja escapes `/` inside attributes, so match on the link text
        assert!(html.contains(r#"<li class="nav-item active"><a href="#));
        assert!(html.contains(">Home</a></li>"));
        assert!(html.contains(">Tags</a></li>"));
    }

    #[test]
    fn renders_listing() {
        let engine = TemplateEngine::new().unwrap();

        let ctx = Context {
            pages: vec![PageSummary {
                title: "Retained Mode".to_string(),
                url: "/posts/retained-mode/".to_string(),
                date: None,
                date_iso: None,
                summary: "Scene graphs.".to_string(),
                tags: vec![],
            }],
            ..context("UI Paradigms")
        };

        let html = engine.render_page("list.html", &ctx).unwrap();

        assert!(html.contains("<title>UI Paradigms</title>"));
        assert!(html.contains(">Retained Mode</a></h2>"));
        assert!(html.contains("Scene graphs."));
    }

    #[test]
    fn layout_overrides_builtin() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("page.html"),
            "<h1>{{ title }}</h1>{{ content | safe }}",
        )
        .unwrap();

        let engine = TemplateEngine::with_layouts(Some(temp.path())).unwrap();
        let ctx = Context {
            content: "<p>Body</p>".to_string(),
            ..context("Custom")
        };

        let html = engine.render_page("page.html", &ctx).unwrap();

        assert_eq!(html, "<h1>Custom</h1><p>Body</p>");
    }
}
