//! Normalized metadata records — the only artifacts that cross the talker
//! boundary back to the host application.

use serde::{Deserialize, Serialize};

/// Which talker a record came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataOrigin {
    /// Talker id (registry key), e.g. "mangadex".
    pub id: String,
    /// Display name, e.g. "MangaDex".
    pub name: String,
}

/// A credited person and their role (writer, artist, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub person: String,
    pub role: String,
}

/// Lightweight series match candidate returned from a search. The host shows
/// these for selection; full issue data is fetched separately.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesRecord {
    /// Opaque id assigned by the remote service (use for fetch calls).
    pub id: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub start_year: Option<u32>,
    pub count_of_issues: Option<u32>,
    pub count_of_volumes: Option<u32>,
    pub publisher: Option<String>,
    pub format: Option<String>,
    pub description: Option<String>,
    /// Cover thumbnail URL, if the remote exposes one.
    pub image_url: Option<String>,
}

/// The host's normalized issue metadata shape. Every field is a pure function
/// of the fetched remote records plus talker settings; talkers never return a
/// partially populated record on a schema failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub origin: Option<MetadataOrigin>,
    pub issue_id: Option<String>,
    pub series_id: Option<String>,

    pub series: Option<String>,
    pub series_aliases: Vec<String>,
    /// Issue (chapter) number in canonical display form.
    pub issue: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,

    pub issue_count: Option<u32>,
    pub volume: Option<u32>,
    pub volume_count: Option<u32>,

    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub format: Option<String>,
    pub language: Option<String>,
    pub maturity_rating: Option<String>,
    pub manga: bool,

    pub year: Option<u32>,
    pub month: Option<u32>,
    pub day: Option<u32>,

    pub web_link: Option<String>,
    pub cover_image: Option<String>,
    pub credits: Vec<Credit>,
}

impl MetadataRecord {
    /// Add a credit, skipping exact duplicates (same person, same role).
    pub fn add_credit(&mut self, person: impl Into<String>, role: impl Into<String>) {
        let credit = Credit {
            person: person.into(),
            role: role.into(),
        };
        if !self.credits.contains(&credit) {
            self.credits.push(credit);
        }
    }

    /// Add a series alias, skipping duplicates and the primary name.
    pub fn add_series_alias(&mut self, alias: impl Into<String>) {
        let alias = alias.into();
        if self.series.as_deref() == Some(alias.as_str()) {
            return;
        }
        if !self.series_aliases.contains(&alias) {
            self.series_aliases.push(alias);
        }
    }
}
