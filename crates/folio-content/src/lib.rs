//! Markdown documents with metadata headers.
//!
//! This crate parses the content files of a folio site: a leading metadata
//! block (YAML between `---` fences or TOML between `+++` fences) followed by
//! a markdown body.

pub mod date;
pub mod document;
pub mod frontmatter;

pub use date::{DateError, PublishDate};
pub use document::{parse_document, slugify, Document, ParseError, TocEntry};
pub use frontmatter::{Frontmatter, FrontmatterError, HeaderFormat};
