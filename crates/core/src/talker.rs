//! Talker contract: the capability interface a metadata source implements,
//! and the registry the host uses to discover talkers by id at load time.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::TalkerError;
use crate::metadata::{MetadataRecord, SeriesRecord};

/// A search request, constructed per call. The title is free text; year and
/// volume are optional hints a talker may use to narrow matches.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub title: String,
    pub year: Option<u32>,
    pub volume: Option<u32>,
    /// Search for the title exactly as given: no sanitization, no fuzzy
    /// early-stop while paging, no cached results.
    pub literal: bool,
}

impl SearchQuery {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Static identity of a talker. `id` is the registry key the host uses for
/// discovery and for per-talker config tables.
#[derive(Debug, Clone)]
pub struct TalkerInfo {
    pub id: String,
    pub name: String,
    pub website: String,
    /// Attribution line the host must display alongside fetched metadata.
    pub attribution: String,
    pub logo_url: Option<String>,
}

/// A pluggable metadata source. Calls are blocking and independent; the host
/// schedules or parallelizes them as it sees fit, so implementations must be
/// shareable across threads and keep no per-call state.
pub trait Talker: Send + Sync {
    fn info(&self) -> &TalkerInfo;

    /// Cheap connectivity probe against the remote service.
    fn health_check(&self) -> Result<(), TalkerError>;

    /// Search for series by title. Zero matches is `Ok(vec![])`, not an error.
    fn search_series(&self, query: &SearchQuery) -> Result<Vec<SeriesRecord>, TalkerError>;

    /// Full series info for a previously returned id.
    fn fetch_series(&self, series_id: &str) -> Result<SeriesRecord, TalkerError>;

    /// All issues of a series, mapped to the host schema.
    fn fetch_issues_in_series(&self, series_id: &str)
        -> Result<Vec<MetadataRecord>, TalkerError>;

    /// Full metadata for one issue. `NotFound` if the id no longer resolves.
    fn fetch_issue(&self, issue_id: &str) -> Result<MetadataRecord, TalkerError>;

    /// Issues matching an issue number across several candidate series, for
    /// auto-identification. `year` is a hint; talkers may ignore it.
    fn fetch_issues_by_number(
        &self,
        series_ids: &[String],
        issue_number: &str,
        year: Option<u32>,
    ) -> Result<Vec<MetadataRecord>, TalkerError>;
}

/// Registry of loaded talkers, keyed by `TalkerInfo::id`. The host builds one
/// at startup and resolves the user's chosen source against it.
#[derive(Default)]
pub struct TalkerRegistry {
    talkers: HashMap<String, Arc<dyn Talker>>,
}

impl TalkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a talker under its own id. A talker re-registering under an
    /// already-used id replaces the previous one.
    pub fn register(&mut self, talker: Arc<dyn Talker>) {
        let id = talker.info().id.clone();
        if self.talkers.insert(id.clone(), talker).is_some() {
            tracing::warn!(talker = %id, "replaced previously registered talker");
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Talker>> {
        self.talkers.get(id).cloned()
    }

    /// Registered ids, sorted for stable presentation.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.talkers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.talkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.talkers.is_empty()
    }
}

impl std::fmt::Debug for TalkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TalkerRegistry")
            .field("talkers", &self.ids())
            .finish()
    }
}
