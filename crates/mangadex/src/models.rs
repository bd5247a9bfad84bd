//! MangaDex wire schema (versioned JSON, owned by the remote service).
//!
//! Every response uses the same envelope: `result`/`errors` plus `data` and
//! pagination counters. Attributes marked required here (`id`, `attributes`)
//! are the fields the mapping step cannot do without; their absence is a
//! schema mismatch, not a default.

use std::collections::BTreeMap;

use comic_talker_core::error::TalkerError;
use serde::{Deserialize, Serialize};

/// Localized string map, keyed by language code ("en", "ja", ...).
pub type LocalizedString = BTreeMap<String, String>;

/// Pick a display string: English first, then romanized Japanese, then
/// whatever the map offers. "en" is not guaranteed by the API.
pub fn preferred_text(map: &LocalizedString) -> Option<&str> {
    for lang in ["en", "ja-ro", "ja"] {
        if let Some(s) = map.get(lang) {
            return Some(s.as_str());
        }
    }
    map.values().next().map(|s| s.as_str())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub result: Option<String>,
    pub response: Option<String>,
    #[serde(default)]
    pub errors: Vec<ApiError>,
    pub data: Option<T>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub total: Option<u32>,
}

impl<T> ApiResponse<T> {
    /// Surface an envelope-level error (`result == "error"`).
    pub fn ensure_ok(self) -> Result<Self, TalkerError> {
        if self.result.as_deref() == Some("error") || !self.errors.is_empty() {
            let detail = self
                .errors
                .iter()
                .map(ApiError::describe)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(TalkerError::Network(format!("API error: {}", detail)));
        }
        Ok(self)
    }

    /// Surface an envelope-level error, then unwrap `data`. A success
    /// envelope with no data is a schema mismatch.
    pub fn into_data(self) -> Result<T, TalkerError> {
        self.ensure_ok()?
            .data
            .ok_or_else(|| TalkerError::SchemaMismatch {
                path: "data".to_string(),
                detail: "missing field".to_string(),
            })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ApiError {
    fn describe(&self) -> String {
        match (&self.title, &self.detail) {
            (Some(t), Some(d)) => format!("{}: {}", t, d),
            (Some(t), None) => t.clone(),
            (None, Some(d)) => d.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Series (the API calls these "manga")
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub id: String,
    pub attributes: SeriesAttributes,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeriesAttributes {
    pub title: LocalizedString,
    pub alt_titles: Vec<LocalizedString>,
    pub description: LocalizedString,
    pub original_language: Option<String>,
    pub last_volume: Option<String>,
    pub last_chapter: Option<String>,
    pub publication_demographic: Option<String>,
    pub status: Option<String>,
    pub year: Option<i32>,
    pub content_rating: Option<String>,
    pub tags: Vec<Tag>,
    pub state: Option<String>,
    pub version: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub attributes: TagAttributes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TagAttributes {
    pub name: LocalizedString,
    pub description: LocalizedString,
    /// Tag grouping: "genre", "format", "theme", or "content".
    pub group: String,
}

impl Tag {
    pub fn name_en(&self) -> Option<&str> {
        preferred_text(&self.attributes.name)
    }
}

// ---------------------------------------------------------------------------
// Chapters (what the host calls issues)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub attributes: ChapterAttributes,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChapterAttributes {
    pub volume: Option<String>,
    pub chapter: Option<String>,
    pub title: Option<String>,
    pub translated_language: Option<String>,
    pub external_url: Option<String>,
    pub publish_at: Option<String>,
    pub readable_at: Option<String>,
    pub pages: Option<u32>,
    pub version: Option<u32>,
    /// Not from the API: volume cover URL injected before caching, so cached
    /// chapters keep their cover assignment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

// ---------------------------------------------------------------------------
// Covers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cover {
    pub id: String,
    pub attributes: CoverAttributes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverAttributes {
    pub volume: Option<String>,
    pub file_name: String,
    pub locale: Option<String>,
}

// ---------------------------------------------------------------------------
// Relationships (heterogeneous: author, artist, cover_art, scanlation_group,
// manga). One catch-all attribute shape covers the fields we read.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: RelationshipAttributes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationshipAttributes {
    /// Person or group name (author, artist, scanlation_group).
    pub name: Option<String>,
    /// Whether a scanlation group is the official publisher.
    pub official: Option<bool>,
    /// Cover image filename (cover_art).
    pub file_name: Option<String>,
}

pub fn relationship<'a>(relationships: &'a [Relationship], kind: &str) -> Option<&'a Relationship> {
    relationships.iter().find(|r| r.kind == kind)
}
