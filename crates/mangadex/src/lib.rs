//! MangaDex metadata talker.
//!
//! Bridges the talker contract to the MangaDex HTTP API: title search with
//! fuzzy early-stop paging, series/chapter fetches, client-side content
//! filters, and mapping into the host's normalized records. Raw responses
//! are cached unfiltered, so filter settings can change without refetching.

pub mod client;
pub mod map;
pub mod models;

use std::sync::Arc;

use serde::Deserialize;

use comic_talker_core::cache::{RawRecord, RecordCache};
use comic_talker_core::config::{self, AppConfig, HttpConfig};
use comic_talker_core::error::{CacheError, TalkerError};
use comic_talker_core::metadata::{MetadataOrigin, MetadataRecord, SeriesRecord};
use comic_talker_core::talker::{SearchQuery, Talker, TalkerInfo, TalkerRegistry};
use comic_talker_core::title::{sanitize_title, titles_match, DEFAULT_MATCH_THRESHOLD};

use client::{decode_json, ApiClient};
use map::MapOptions;
use models::{ApiResponse, Chapter, Cover, Series};

pub const TALKER_ID: &str = "mangadex";
const DEFAULT_API_URL: &str = "https://api.mangadex.org";
const COVER_URL_BASE: &str = "https://uploads.mangadex.org/covers";
const WEBSITE: &str = "https://mangadex.org";
const LOGO_URL: &str = "https://mangadex.org/img/brand/mangadex-logo.svg";

const PAGE_SIZE: u32 = 100;
/// Sanity cap on search paging (5 pages).
const MAX_SEARCH_RESULTS: u32 = 500;

const SEARCH_INCLUDES: [&str; 5] = ["cover_art", "artist", "author", "creator", "tag"];
const ALL_CONTENT_RATINGS: [&str; 4] = ["safe", "suggestive", "erotica", "pornographic"];

/// Settings from the host's `[talkers.mangadex]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MangaDexSettings {
    /// Include content rated "erotica"/"pornographic".
    pub adult_content: bool,
    /// Exclude content tagged "Doujinshi".
    pub exclude_doujin: bool,
    /// Attach volume covers to chapters for image matching.
    pub use_volume_cover_matching: bool,
    /// Attach volume covers to chapters in the issue selection window.
    pub use_volume_cover_window: bool,
    /// Use the current issue count for series still marked ongoing.
    pub use_ongoing_issue_count: bool,
    /// Report the series start year as the volume number.
    pub use_series_start_as_volume: bool,
    /// Fuzzy match threshold (percent) for the search early stop.
    pub series_match_threshold: u32,
    /// Alternate API base URL.
    pub api_url: Option<String>,
}

impl Default for MangaDexSettings {
    fn default() -> Self {
        Self {
            adult_content: false,
            exclude_doujin: false,
            use_volume_cover_matching: false,
            use_volume_cover_window: false,
            use_ongoing_issue_count: false,
            use_series_start_as_volume: false,
            series_match_threshold: DEFAULT_MATCH_THRESHOLD,
            api_url: None,
        }
    }
}

pub struct MangaDexTalker {
    info: TalkerInfo,
    client: ApiClient,
    cache: Option<RecordCache>,
    settings: MangaDexSettings,
}

impl MangaDexTalker {
    pub fn new(
        settings: MangaDexSettings,
        http: &HttpConfig,
        cache: Option<RecordCache>,
    ) -> Result<Self, TalkerError> {
        let info = TalkerInfo {
            id: TALKER_ID.to_string(),
            name: "MangaDex".to_string(),
            website: WEBSITE.to_string(),
            attribution: "Metadata provided by MangaDex".to_string(),
            logo_url: Some(LOGO_URL.to_string()),
        };
        let base_url = settings.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
        let user_agent = http
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("comic-talker/{}", env!("CARGO_PKG_VERSION")));
        let client = ApiClient::new(base_url, TALKER_ID, &user_agent, http.timeout())?;
        Ok(Self {
            info,
            client,
            cache,
            settings,
        })
    }

    /// Build from the shared config file: `[talkers.mangadex]` settings,
    /// `[cache]`, and `[http]`.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, TalkerError> {
        let settings: MangaDexSettings = config::talker_settings(cfg, TALKER_ID);
        let cache = config::cache_from_config(&cfg.cache, env!("CARGO_PKG_VERSION"));
        Self::new(settings, &cfg.http, cache)
    }

    /// Entry-point registration: construct from config and add to the host's
    /// registry under [`TALKER_ID`].
    pub fn register(registry: &mut TalkerRegistry, cfg: &AppConfig) -> Result<(), TalkerError> {
        registry.register(Arc::new(Self::from_config(cfg)?));
        Ok(())
    }

    fn origin(&self) -> MetadataOrigin {
        MetadataOrigin {
            id: self.info.id.clone(),
            name: self.info.name.clone(),
        }
    }

    fn map_options(&self) -> MapOptions {
        MapOptions {
            origin: self.origin(),
            website: WEBSITE.to_string(),
            cover_url_base: COVER_URL_BASE.to_string(),
            use_ongoing_issue_count: self.settings.use_ongoing_issue_count,
            use_series_start_as_volume: self.settings.use_series_start_as_volume,
        }
    }

    fn wants_volume_covers(&self) -> bool {
        self.settings.use_volume_cover_matching || self.settings.use_volume_cover_window
    }

    // -----------------------------------------------------------------------
    // Fetch plumbing
    // -----------------------------------------------------------------------

    /// Fetch all pages of a list endpoint. `keep_paging` sees each fetched
    /// page and may stop early; `max_results` caps the total.
    fn fetch_paged<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        base_params: &[(&str, String)],
        max_results: u32,
        mut keep_paging: impl FnMut(&[T]) -> bool,
    ) -> Result<Vec<T>, TalkerError> {
        let mut out: Vec<T> = Vec::new();
        let mut offset: u32 = 0;
        loop {
            let mut params = base_params.to_vec();
            params.push(("limit", PAGE_SIZE.to_string()));
            params.push(("offset", offset.to_string()));

            let page: ApiResponse<Vec<T>> = self.client.get(path, &params)?;
            let page = page.ensure_ok()?;
            let total = page.total;
            let data = page.data.ok_or_else(|| TalkerError::SchemaMismatch {
                path: "data".to_string(),
                detail: "missing field".to_string(),
            })?;

            let fetched = data.len() as u32;
            let keep_going = keep_paging(&data);
            out.extend(data);
            offset += PAGE_SIZE;

            let total = total.unwrap_or(out.len() as u32).min(max_results);
            if fetched == 0 || out.len() as u32 >= total || !keep_going {
                break;
            }
            tracing::debug!(path, offset, total, "fetching next page of results");
        }
        Ok(out)
    }

    /// Series info, cache-first. Search already caches full series records,
    /// so this mostly hits.
    fn fetch_series_raw(&self, series_id: &str) -> Result<Series, TalkerError> {
        if let Some(cache) = &self.cache {
            if let Some(raw) = cache.get_series(TALKER_ID, series_id)? {
                return decode_json(&raw.data);
            }
        }

        let params: Vec<(&str, String)> = SEARCH_INCLUDES
            .iter()
            .map(|inc| ("includes[]", inc.to_string()))
            .collect();
        let series: Series = self
            .client
            .get::<ApiResponse<Series>>(&format!("manga/{}", series_id), &params)?
            .into_data()?;

        if let Some(cache) = &self.cache {
            cache.add_series(TALKER_ID, &raw_record(&series.id, &series)?)?;
        }
        Ok(series)
    }

    fn fetch_volume_covers(&self, series_id: &str) -> Result<Vec<Cover>, TalkerError> {
        let params = vec![("manga[]", series_id.to_string())];
        self.fetch_paged("cover", &params, u32::MAX, |_page: &[Cover]| true)
    }

    fn chapters_to_metadata(
        &self,
        chapters: &[Chapter],
        series: &Series,
    ) -> Result<Vec<MetadataRecord>, TalkerError> {
        let opts = self.map_options();
        chapters
            .iter()
            .map(|ch| map::issue_to_metadata(ch, series, &opts))
            .collect()
    }

    /// Apply the client-side filters and the search's year hint, then format.
    fn filter_and_format(
        &self,
        mut series: Vec<Series>,
        query: &SearchQuery,
    ) -> Result<Vec<SeriesRecord>, TalkerError> {
        if !self.settings.adult_content {
            series = map::filter_adult(series);
        }
        if self.settings.exclude_doujin {
            series = map::filter_doujin(series);
        }

        let mut records = series
            .iter()
            .map(|s| map::series_to_record(s, COVER_URL_BASE))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(year) = query.year {
            records.retain(|r| r.start_year.map_or(true, |y| y == year));
        }
        // a finished series with fewer volumes than the hint cannot contain it
        if let Some(volume) = query.volume {
            records.retain(|r| r.count_of_volumes.map_or(true, |count| count >= volume));
        }
        Ok(records)
    }
}

impl Talker for MangaDexTalker {
    fn info(&self) -> &TalkerInfo {
        &self.info
    }

    fn health_check(&self) -> Result<(), TalkerError> {
        let body = self.client.get_text("ping")?;
        if body != "pong" {
            return Err(TalkerError::Network(format!(
                "unexpected ping response: {}",
                body
            )));
        }
        Ok(())
    }

    fn search_series(&self, query: &SearchQuery) -> Result<Vec<SeriesRecord>, TalkerError> {
        let term = sanitize_title(&query.title, query.literal);
        tracing::info!(talker = TALKER_ID, search = %term, "searching for series");

        // literal searches always go online
        if !query.literal {
            if let Some(cache) = &self.cache {
                if let Some(raw) = cache.get_search_results(TALKER_ID, &query.title)? {
                    let series = raw
                        .iter()
                        .map(|r| decode_json::<Series>(&r.data))
                        .collect::<Result<Vec<_>, _>>()?;
                    return self.filter_and_format(series, query);
                }
            }
        }

        let mut params: Vec<(&str, String)> = vec![("title", term.clone())];
        params.extend(SEARCH_INCLUDES.iter().map(|inc| ("includes[]", inc.to_string())));
        // request every rating so the cached results stay filter-independent
        params.extend(
            ALL_CONTENT_RATINGS
                .iter()
                .map(|r| ("contentRating[]", r.to_string())),
        );

        let threshold = self.settings.series_match_threshold;
        let literal = query.literal;
        let series: Vec<Series> =
            self.fetch_paged("manga", &params, MAX_SEARCH_RESULTS, |page: &[Series]| {
                if literal {
                    return true;
                }
                // stop paging once any result drifts below the match threshold
                page.iter().all(|s| {
                    models::preferred_text(&s.attributes.title)
                        .map_or(false, |t| titles_match(&term, t, threshold))
                })
            })?;

        if !query.literal {
            if let Some(cache) = &self.cache {
                let raw = series
                    .iter()
                    .map(|s| raw_record(&s.id, s))
                    .collect::<Result<Vec<_>, _>>()?;
                cache.add_search_results(TALKER_ID, &query.title, &raw)?;
            }
        }

        self.filter_and_format(series, query)
    }

    fn fetch_series(&self, series_id: &str) -> Result<SeriesRecord, TalkerError> {
        let series = self.fetch_series_raw(series_id)?;
        map::series_to_record(&series, COVER_URL_BASE)
    }

    fn fetch_issues_in_series(
        &self,
        series_id: &str,
    ) -> Result<Vec<MetadataRecord>, TalkerError> {
        let series = self.fetch_series_raw(series_id)?;

        if let Some(cache) = &self.cache {
            if let Some(raw) = cache.get_series_issues(TALKER_ID, series_id)? {
                let chapters = raw
                    .iter()
                    .map(|r| decode_json::<Chapter>(&r.data))
                    .collect::<Result<Vec<_>, _>>()?;
                return self.chapters_to_metadata(&chapters, &series);
            }
        }

        let mut params: Vec<(&str, String)> =
            vec![("includes[]", "scanlation_group".to_string())];
        params.extend(
            ALL_CONTENT_RATINGS
                .iter()
                .map(|r| ("contentRating[]", r.to_string())),
        );
        params.push(("translatedLanguage[]", "en".to_string()));

        let chapters: Vec<Chapter> = self.fetch_paged(
            &format!("manga/{}/feed", series_id),
            &params,
            u32::MAX,
            |_page: &[Chapter]| true,
        )?;
        let mut chapters = map::dedupe_chapters(chapters);

        if self.wants_volume_covers() {
            let covers = self.fetch_volume_covers(series_id)?;
            map::assign_volume_covers(series_id, &mut chapters, &covers, COVER_URL_BASE);
        }

        if let Some(cache) = &self.cache {
            let raw = chapters
                .iter()
                .map(|ch| raw_record(&ch.id, ch))
                .collect::<Result<Vec<_>, _>>()?;
            cache.add_issues(TALKER_ID, series_id, &raw)?;
        }

        self.chapters_to_metadata(&chapters, &series)
    }

    fn fetch_issue(&self, issue_id: &str) -> Result<MetadataRecord, TalkerError> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get_issue(TALKER_ID, issue_id)? {
                let chapter: Chapter = decode_json(&cached.record.data)?;
                let series = self.fetch_series_raw(&cached.series_id)?;
                return map::issue_to_metadata(&chapter, &series, &self.map_options());
            }
        }

        let params = vec![("includes[]", "scanlation_group".to_string())];
        let chapter: Chapter = self
            .client
            .get::<ApiResponse<Chapter>>(&format!("chapter/{}", issue_id), &params)?
            .into_data()?;

        let series_id = models::relationship(&chapter.relationships, "manga")
            .and_then(|r| r.id.clone())
            .ok_or_else(|| TalkerError::SchemaMismatch {
                path: "data.relationships".to_string(),
                detail: "chapter has no manga relationship".to_string(),
            })?;
        let series = self.fetch_series_raw(&series_id)?;

        if let Some(cache) = &self.cache {
            cache.add_issues(TALKER_ID, &series_id, &[raw_record(&chapter.id, &chapter)?])?;
        }

        map::issue_to_metadata(&chapter, &series, &self.map_options())
    }

    fn fetch_issues_by_number(
        &self,
        series_ids: &[String],
        issue_number: &str,
        _year: Option<u32>,
    ) -> Result<Vec<MetadataRecord>, TalkerError> {
        // not cached, so the content-rating filter can run server-side
        let mut ratings = vec!["safe", "suggestive"];
        if self.settings.adult_content {
            ratings.push("erotica");
            ratings.push("pornographic");
        }

        let mut issues = Vec::new();
        for series_id in series_ids {
            let mut params: Vec<(&str, String)> = vec![
                ("manga", series_id.clone()),
                ("chapter", issue_number.to_string()),
                ("includes[]", "scanlation_group".to_string()),
                ("translatedLanguage[]", "en".to_string()),
            ];
            params.extend(ratings.iter().map(|r| ("contentRating[]", r.to_string())));

            let chapters: Vec<Chapter> =
                self.fetch_paged("chapter", &params, u32::MAX, |_page: &[Chapter]| true)?;
            let mut chapters = map::dedupe_chapters(chapters);

            if self.wants_volume_covers() {
                let covers = self.fetch_volume_covers(series_id)?;
                map::assign_volume_covers(series_id, &mut chapters, &covers, COVER_URL_BASE);
            }

            let series = self.fetch_series_raw(series_id)?;
            issues.extend(self.chapters_to_metadata(&chapters, &series)?);
        }
        Ok(issues)
    }
}

impl std::fmt::Debug for MangaDexTalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MangaDexTalker")
            .field("client", &self.client)
            .field("cached", &self.cache.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Serialize a fetched record back to JSON text for the raw-record cache.
fn raw_record<T: serde::Serialize>(id: &str, value: &T) -> Result<RawRecord, TalkerError> {
    let data = serde_json::to_string(value).map_err(CacheError::from)?;
    Ok(RawRecord {
        id: id.to_string(),
        data,
    })
}
