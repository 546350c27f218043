//! Publication dates from metadata headers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A publication timestamp.
///
/// Accepts RFC 3339 (`2024-03-01T09:30:00+01:00`), a naive date-time
/// (`2024-03-01 09:30:00` or `2024-03-01T09:30:00`, read as UTC) or a bare
/// date (`2024-03-01`, midnight UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublishDate(DateTime<FixedOffset>);

/// Error returned for a date string in none of the accepted formats.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid date '{0}': expected RFC 3339, 'YYYY-MM-DD HH:MM:SS' or 'YYYY-MM-DD'")]
pub struct DateError(pub String);

impl PublishDate {
    /// The underlying timestamp.
    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.0
    }

    /// RFC 3339 form, used in machine-readable outputs.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// RFC 2822 form, used by RSS.
    pub fn to_rfc2822(&self) -> String {
        self.0.to_rfc2822()
    }

    /// `YYYY-MM-DD`, used by sitemaps.
    pub fn ymd(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    /// Human readable form such as `March 1, 2024`.
    pub fn human(&self) -> String {
        self.0.format("%B %-d, %Y").to_string()
    }
}

impl FromStr for PublishDate {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self(dt));
        }

        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(Self(naive.and_utc().fixed_offset()));
            }
        }

        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| Self(naive.and_utc().fixed_offset()))
            .ok_or_else(|| DateError(s.to_string()))
    }
}

impl fmt::Display for PublishDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl Serialize for PublishDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for PublishDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
