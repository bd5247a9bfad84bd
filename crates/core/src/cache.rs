//! Raw-record cache shared by talkers.
//!
//! Stores the raw JSON blobs a talker fetched (search results, series info,
//! issues) keyed by source id, so repeated lookups skip the remote API.
//! Records are cached **unfiltered**; talkers re-apply their own content
//! filters after retrieval, so toggling a filter setting never requires a
//! re-fetch. Entries carry a version stamp and expire after a TTL.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// A raw remote record: opaque id plus the JSON text exactly as fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    pub data: String,
}

/// An issue record also remembers which series it belongs to, so a cached
/// issue can be remapped without refetching the series relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedIssue {
    pub record: RawRecord,
    pub series_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Entry<T> {
    version: String,
    stored_at: u64,
    records: T,
}

const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// File-per-entry cache rooted at a directory the host hands to the talker.
#[derive(Debug, Clone)]
pub struct RecordCache {
    root: PathBuf,
    /// Cache-format/application version; a mismatch invalidates the entry.
    version: String,
    ttl: Duration,
}

impl RecordCache {
    pub fn new(root: impl AsRef<Path>, version: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            version: version.into(),
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    // -----------------------------------------------------------------------
    // Search results (keyed by search term)
    // -----------------------------------------------------------------------

    pub fn add_search_results(
        &self,
        source: &str,
        term: &str,
        records: &[RawRecord],
    ) -> Result<(), CacheError> {
        self.store(&self.search_path(source, term), records)
    }

    /// Cached results for a search term; `None` on miss, expiry, or version
    /// mismatch.
    pub fn get_search_results(
        &self,
        source: &str,
        term: &str,
    ) -> Result<Option<Vec<RawRecord>>, CacheError> {
        self.load(&self.search_path(source, term))
    }

    // -----------------------------------------------------------------------
    // Series info (keyed by series id)
    // -----------------------------------------------------------------------

    pub fn add_series(&self, source: &str, record: &RawRecord) -> Result<(), CacheError> {
        self.store(&self.series_path(source, &record.id), record)
    }

    pub fn get_series(&self, source: &str, series_id: &str) -> Result<Option<RawRecord>, CacheError> {
        self.load(&self.series_path(source, series_id))
    }

    // -----------------------------------------------------------------------
    // Issues (keyed by issue id, indexed by series id)
    // -----------------------------------------------------------------------

    /// Store a batch of issues for one series: the per-series index plus one
    /// entry per issue id. The index is additive — new records merge into
    /// whatever is already indexed, so caching a single issue never drops the
    /// rest of a cached feed.
    pub fn add_issues(
        &self,
        source: &str,
        series_id: &str,
        records: &[RawRecord],
    ) -> Result<(), CacheError> {
        let index_path = self.series_issues_path(source, series_id);
        let mut index: Vec<RawRecord> = self.load(&index_path)?.unwrap_or_default();
        for record in records {
            match index.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => index.push(record.clone()),
            }
            let cached = CachedIssue {
                record: record.clone(),
                series_id: series_id.to_string(),
            };
            self.store(&self.issue_path(source, &record.id), &cached)?;
        }
        self.store(&index_path, &index)
    }

    pub fn get_issue(&self, source: &str, issue_id: &str) -> Result<Option<CachedIssue>, CacheError> {
        self.load(&self.issue_path(source, issue_id))
    }

    pub fn get_series_issues(
        &self,
        source: &str,
        series_id: &str,
    ) -> Result<Option<Vec<RawRecord>>, CacheError> {
        self.load(&self.series_issues_path(source, series_id))
    }

    /// Drop everything cached for one source.
    pub fn clear(&self, source: &str) -> Result<(), CacheError> {
        let dir = self.root.join(source);
        if dir.is_dir() {
            std::fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Storage
    // -----------------------------------------------------------------------

    fn store<T: Serialize + ?Sized>(&self, path: &Path, records: &T) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entry = Entry {
            version: self.version.clone(),
            stored_at: unix_now(),
            records,
        };
        let json = serde_json::to_string(&entry)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn load<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> Result<Option<T>, CacheError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: Entry<T> = match serde_json::from_str(&content) {
            Ok(e) => e,
            // a corrupt entry is a miss, not a failure
            Err(_) => return Ok(None),
        };
        if entry.version != self.version {
            return Ok(None);
        }
        if unix_now().saturating_sub(entry.stored_at) > self.ttl.as_secs() {
            return Ok(None);
        }
        Ok(Some(entry.records))
    }

    fn search_path(&self, source: &str, term: &str) -> PathBuf {
        self.root
            .join(source)
            .join("search")
            .join(format!("{}.json", file_key(term)))
    }

    fn series_path(&self, source: &str, id: &str) -> PathBuf {
        self.root
            .join(source)
            .join("series")
            .join(format!("{}.json", file_key(id)))
    }

    fn series_issues_path(&self, source: &str, series_id: &str) -> PathBuf {
        self.root
            .join(source)
            .join("series-issues")
            .join(format!("{}.json", file_key(series_id)))
    }

    fn issue_path(&self, source: &str, id: &str) -> PathBuf {
        self.root
            .join(source)
            .join("issues")
            .join(format!("{}.json", file_key(id)))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Filesystem-safe key: readable prefix plus a hash to keep distinct terms
/// distinct after lossy character replacement.
fn file_key(raw: &str) -> String {
    let mut hasher = DefaultHasher::new();
    raw.hash(&mut hasher);
    let safe: String = raw
        .chars()
        .take(48)
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    format!("{}-{:016x}", safe.trim_matches('-'), hasher.finish())
}
