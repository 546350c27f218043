//! Markdown document parser.

use std::collections::HashSet;

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};

use crate::frontmatter::{extract_frontmatter, Frontmatter, FrontmatterError};

/// A parsed content document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Parsed metadata header (if present)
    pub frontmatter: Option<Frontmatter>,

    /// Markdown content (without the header)
    pub content: String,

    /// Table of contents entries
    pub toc: Vec<TocEntry>,

    /// Plain text of the first paragraph
    pub summary: String,
}

/// A table of contents entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    /// Heading text
    pub title: String,
    /// Anchor ID
    pub id: String,
    /// Heading level (1-6)
    pub level: u8,
}

/// Errors that can occur when parsing a document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Metadata header error: {0}")]
    Frontmatter(#[from] FrontmatterError),
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_SMART_PUNCTUATION
}

/// Parse a content document.
///
/// Extracts the metadata header, builds a table of contents with unique
/// anchor IDs and captures the first paragraph as a summary.
pub fn parse_document(source: &str) -> Result<Document, ParseError> {
    let (frontmatter, content) = extract_frontmatter(source)?;

    let mut toc = Vec::new();
    let mut used_ids = HashSet::new();
    let mut current_heading: Option<(u8, String)> = None; // (level, text)
    let mut summary = String::new();
    let mut in_first_paragraph = false;
    let mut seen_paragraph = false;

    for event in Parser::new_ext(content, markdown_options()) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current_heading = Some((level as u8, String::new()));
            }

            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, title)) = current_heading.take() {
                    let id = unique_id(slugify(&title), &mut used_ids);
                    toc.push(TocEntry { title, id, level });
                }
            }

            Event::Start(Tag::Paragraph) if !seen_paragraph => {
                in_first_paragraph = true;
                seen_paragraph = true;
            }

            Event::End(TagEnd::Paragraph) => {
                in_first_paragraph = false;
            }

            Event::Text(text) | Event::Code(text) => {
                if let Some((_, ref mut heading_text)) = current_heading {
                    heading_text.push_str(&text);
                } else if in_first_paragraph {
                    summary.push_str(&text);
                }
            }

            Event::SoftBreak | Event::HardBreak if in_first_paragraph => {
                summary.push(' ');
            }

            _ => {}
        }
    }

    Ok(Document {
        frontmatter,
        content: content.to_string(),
        toc,
        summary: summary.trim().to_string(),
    })
}

impl Document {
    /// Title from the header, if any.
    pub fn title(&self) -> Option<&str> {
        self.frontmatter.as_ref().map(|f| f.title.as_str())
    }

    /// Whether the header marks this document as a draft.
    pub fn is_draft(&self) -> bool {
        self.frontmatter.as_ref().is_some_and(|f| f.draft)
    }

    /// Render the body to HTML.
    ///
    /// Headings without an explicit `{#id}` get the anchor IDs from the
    /// table of contents, in document order.
    pub fn render_html(&self) -> String {
        let mut ids = self.toc.iter().map(|entry| entry.id.clone());

        let parser = Parser::new_ext(&self.content, markdown_options()).map(|event| match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                let generated = ids.next();
                let id = id.or_else(|| generated.map(CowStr::from));
                Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                })
            }
            other => other,
        });

        let mut html_output = String::new();
        html::push_html(&mut html_output, parser);
        html_output
    }
}

fn unique_id(base: String, used: &mut HashSet<String>) -> String {
    let base = if base.is_empty() {
        "section".to_string()
    } else {
        base
    };

    if used.insert(base.clone()) {
        return base;
    }

    let mut n = 1;
    loop {
        let candidate = format!("{}-{}", base, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Convert text to a URL-safe slug.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
