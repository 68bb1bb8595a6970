use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Store-assigned comment identifier.
///
/// Hosted stores hand out either integer keys or uuids, so both JSON numbers
/// and strings are accepted and kept in their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CommentId(pub String);

impl CommentId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for CommentId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Number(number) => Self(number.to_string()),
        })
    }
}

/// A guest comment as the feed renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: CommentId,
    pub name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A comment row as the store returns it, timestamps still in text form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRow {
    pub id: CommentId,
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("unrecognized timestamp '{0}'")]
    InvalidTimestamp(String),
}

impl CommentRow {
    /// Parses the row-creation time; the feed orders and labels by it.
    pub fn normalize(self) -> Result<Comment, RowError> {
        let timestamp = parse_timestamp(&self.created_at)?;
        Ok(Comment {
            id: self.id,
            name: self.name,
            message: self.message,
            timestamp,
        })
    }
}

/// Insert payload. Fields are expected to be trimmed by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// What the invitation hands to a share sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareData {
    pub title: String,
    pub text: String,
    pub url: String,
}

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses a store timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RowError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed.and_utc());
        }
    }
    Err(RowError::InvalidTimestamp(raw.to_string()))
}
