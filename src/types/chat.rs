//! Chat and platform identifiers

use crate::constants::chat::{UNKNOWN_CHAT, UNKNOWN_PLATFORM};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stable identifier of a conversation, independent of its display name
///
/// Empty or whitespace-only keys are normalized to [`UNKNOWN_CHAT`] so that
/// accounting never fragments on blank identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChatKey(String);

impl ChatKey {
    /// Create a chat key, normalizing blank input
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            Self(UNKNOWN_CHAT.to_string())
        } else if trimmed.len() == key.len() {
            Self(key)
        } else {
            Self(trimmed.to_string())
        }
    }

    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key is the placeholder for blank input
    #[must_use]
    #[inline]
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CHAT
    }
}

impl<'de> Deserialize<'de> for ChatKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl From<&str> for ChatKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ChatKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl From<i64> for ChatKey {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for ChatKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of conversation a request originates from
///
/// Each kind has its own independent per-minute and per-hour limits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    #[default]
    Private,
    Group,
    Supergroup,
}

impl ChatType {
    /// Every chat type, in display order
    pub const ALL: [ChatType; 3] = [Self::Private, Self::Group, Self::Supergroup];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
            Self::Supergroup => "supergroup",
        }
    }

    /// Parse a chat type, falling back to [`ChatType::Private`] for unknown input
    ///
    /// Used at the API boundary where rejecting a request over a malformed
    /// chat type would be worse than applying the strictest limit set.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_else(|e: ParseChatTypeError| {
            tracing::warn!(input = %e.0, "Unknown chat type, treating as private");
            Self::Private
        })
    }
}

/// Error returned when a string is not a known chat type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown chat type: {0}")]
pub struct ParseChatTypeError(pub String);

impl FromStr for ChatType {
    type Err = ParseChatTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "group" => Ok(Self::Group),
            "supergroup" => Ok(Self::Supergroup),
            _ => Err(ParseChatTypeError(s.to_string())),
        }
    }
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content platform tag (e.g. `tiktok`, `instagram`)
///
/// Stored lowercase and trimmed so that breakdowns do not split on casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Platform(String);

impl Platform {
    #[must_use]
    pub fn new(tag: impl AsRef<str>) -> Self {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            Self(UNKNOWN_PLATFORM.to_string())
        } else {
            Self(tag.to_ascii_lowercase())
        }
    }

    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl From<&str> for Platform {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
