//! Metadata header extraction and parsing.

use serde::Deserialize;

use crate::date::PublishDate;

/// Parsed metadata header of a content file.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct Frontmatter {
    /// Page title (required)
    pub title: String,

    /// Publication date
    #[serde(default)]
    pub date: Option<PublishDate>,

    /// Drafts are left out of the site unless drafts are enabled
    #[serde(default)]
    pub draft: bool,

    /// Tags in authored order
    #[serde(default)]
    pub tags: Vec<String>,

    /// Short description for listings and feeds
    #[serde(default)]
    pub description: Option<String>,

    /// Custom slug override
    #[serde(default)]
    pub slug: Option<String>,
}

/// Syntax of a metadata block, chosen by its fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFormat {
    /// `---` fences
    Yaml,
    /// `+++` fences
    Toml,
}

impl HeaderFormat {
    fn fence(self) -> &'static str {
        match self {
            Self::Yaml => "---",
            Self::Toml => "+++",
        }
    }

    fn detect(first_line: &str) -> Option<Self> {
        match first_line.trim_end() {
            "---" => Some(Self::Yaml),
            "+++" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Extract the metadata header from a content file.
///
/// Returns the parsed header and the remaining body after the closing fence.
/// A file without a leading fence has no header and is returned unchanged.
pub fn extract_frontmatter(source: &str) -> Result<(Option<Frontmatter>, &str), FrontmatterError> {
    let trimmed = source.trim_start_matches('\u{feff}').trim_start();

    let first_line = trimmed.lines().next().unwrap_or("");
    let Some(format) = HeaderFormat::detect(first_line) else {
        return Ok((None, source));
    };

    // Find the closing fence
    let after_open = &trimmed[first_line.len()..];
    let closing = format!("\n{}", format.fence());
    let Some(close_pos) = after_open.find(&closing) else {
        return Err(FrontmatterError::Unclosed(format));
    };

    let header = after_open[..close_pos].trim();
    let remaining = &after_open[close_pos + closing.len()..];

    let frontmatter = match format {
        HeaderFormat::Yaml => serde_yaml::from_str(header)
            .map_err(|e| FrontmatterError::InvalidYaml(e.to_string()))?,
        HeaderFormat::Toml => parse_toml(header)?,
    };

    Ok((Some(frontmatter), remaining.trim_start()))
}

/// TOML has a native datetime type; turn it back into text so `PublishDate`
/// sees the same input as it does from YAML.
fn parse_toml(header: &str) -> Result<Frontmatter, FrontmatterError> {
    let mut table: toml::Table =
        toml::from_str(header).map_err(|e| FrontmatterError::InvalidToml(e.to_string()))?;

    if let Some(toml::Value::Datetime(dt)) = table.get("date") {
        let text = dt.to_string();
        table.insert("date".to_string(), toml::Value::String(text));
    }

    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| FrontmatterError::InvalidToml(e.to_string()))
}

/// Errors that can occur when parsing a metadata header.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("Unclosed metadata header - missing closing {}", .0.fence())]
    Unclosed(HeaderFormat),

    #[error("Invalid YAML in metadata header: {0}")]
    InvalidYaml(String),

    #[error("Invalid TOML in metadata header: {0}")]
    InvalidToml(String),
}
