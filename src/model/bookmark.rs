use crate::util::{normalize_url, UrlValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum title length in characters (matches the form's `maxLength`).
pub const MAX_TITLE_LEN: usize = 200;

// ============================================================================
// Error Types
// ============================================================================

/// Bad user input or a malformed record. Shown inline; never dispatched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent or blank.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Title too long ({len} characters, max {max})")]
    TitleTooLong { len: usize, max: usize },

    #[error(transparent)]
    Url(#[from] UrlValidationError),
}

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque bookmark identifier assigned by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkId(String);

impl BookmarkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookmarkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the user owning a bookmark.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// Bookmark
// ============================================================================

/// A saved bookmark as stored by the backend.
///
/// Field names on the wire follow the backend table (`user_id`, `favicon_url`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    #[serde(rename = "user_id")]
    pub owner_id: OwnerId,
    pub title: String,
    pub url: String,
    #[serde(rename = "favicon_url", default)]
    pub favicon_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bookmark {
    /// Shape check for records arriving from the backend or the change feed.
    ///
    /// Serde already rejects absent fields; this rejects blank ones and
    /// over-long titles.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.as_str().trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        if self.owner_id.as_str().trim().is_empty() {
            return Err(ValidationError::MissingField("owner_id"));
        }
        check_title(&self.title)?;
        if self.url.trim().is_empty() {
            return Err(ValidationError::MissingField("url"));
        }
        Ok(())
    }

    /// Sort key: newest first, ties broken by id.
    pub(crate) fn sort_key(&self) -> (std::cmp::Reverse<DateTime<Utc>>, &BookmarkId) {
        (std::cmp::Reverse(self.created_at), &self.id)
    }
}

fn check_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::MissingField("title"));
    }
    let len = title.chars().count();
    if len > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong {
            len,
            max: MAX_TITLE_LEN,
        });
    }
    Ok(())
}

// ============================================================================
// NewBookmark
// ============================================================================

/// Insert payload built from raw form input.
///
/// The record store assigns `id`, `created_at` and `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewBookmark {
    #[serde(rename = "user_id")]
    pub owner_id: OwnerId,
    pub title: String,
    pub url: String,
    #[serde(rename = "favicon_url")]
    pub favicon_ref: Option<String>,
}

impl NewBookmark {
    /// Normalize the URL, trim the title, and validate both.
    ///
    /// The URL is checked first so the user sees URL problems before title ones.
    pub fn new(owner_id: OwnerId, raw_title: &str, raw_url: &str) -> Result<Self, ValidationError> {
        let normalized = normalize_url(raw_url)?;
        let title = raw_title.trim();
        check_title(title)?;

        Ok(Self {
            owner_id,
            title: title.to_string(),
            url: normalized.url,
            favicon_ref: normalized.favicon_ref,
        })
    }
}
