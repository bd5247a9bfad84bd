//! Blocking HTTP client for the MangaDex API.
//!
//! One pooled `reqwest` client shared across calls (safe for concurrent
//! reuse); request pacing to stay under the service's 5 req/s limit; at most
//! three attempts per request with a short pause on server errors and
//! Retry-After handling on 429. Permanent failures (4xx, schema errors) are
//! never retried.

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use comic_talker_core::error::TalkerError;
use serde::de::DeserializeOwned;

const MAX_ATTEMPTS: u32 = 3;
const SERVER_ERROR_PAUSE: Duration = Duration::from_secs(1);
/// MangaDex default limit is 5 calls per second.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(200);
/// Upper bound on honoring a Retry-After hint inside one call.
const MAX_RATELIMIT_WAIT: Duration = Duration::from_secs(30);
const FALLBACK_RATELIMIT_WAIT: Duration = Duration::from_secs(10);

pub struct ApiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    source_name: String,
    last_request: Mutex<Option<Instant>>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        source_name: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, TalkerError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| TalkerError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            source_name: source_name.to_string(),
            last_request: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Keep at least `MIN_REQUEST_INTERVAL` between outbound requests.
    fn pace(&self) {
        let wait = {
            let mut last = self.last_request.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let wait = match *last {
                Some(prev) => MIN_REQUEST_INTERVAL.checked_sub(now.duration_since(prev)),
                None => None,
            };
            *last = Some(now + wait.unwrap_or_default());
            wait
        };
        if let Some(wait) = wait {
            std::thread::sleep(wait);
        }
    }

    /// GET returning the raw body, for the `ping` health probe. Retries and
    /// rate-limit handling are the same as for JSON requests.
    pub fn get_text(&self, path: &str) -> Result<String, TalkerError> {
        let resp = self.request(path, &[])?;
        resp.text().map_err(request_error)
    }

    /// GET with query parameters, decoded as JSON. Decode failures carry the
    /// JSON path of the offending field.
    pub fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, TalkerError> {
        let resp = self.request(path, params)?;
        let body = resp.text().map_err(request_error)?;
        decode_json(&body)
    }

    /// One paced GET with the shared retry/status policy, returning the
    /// successful response.
    fn request(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::blocking::Response, TalkerError> {
        let url = self.url(path);
        for attempt in 1..=MAX_ATTEMPTS {
            self.pace();
            let resp = self
                .http
                .get(&url)
                .query(params)
                .send()
                .map_err(request_error)?;
            let status = resp.status();

            if status.is_success() {
                return Ok(resp);
            }

            if status.is_server_error() {
                tracing::debug!(%url, %status, attempt, "server error, will retry");
                if attempt < MAX_ATTEMPTS {
                    std::thread::sleep(SERVER_ERROR_PAUSE);
                }
                continue;
            }

            match status.as_u16() {
                404 => return Err(TalkerError::NotFound(url.clone())),
                429 => {
                    let wait = retry_after(resp.headers());
                    tracing::debug!(%url, wait_secs = wait.as_secs(), attempt, "rate limited");
                    if attempt < MAX_ATTEMPTS {
                        std::thread::sleep(wait.min(MAX_RATELIMIT_WAIT));
                        continue;
                    }
                    return Err(TalkerError::RateLimited {
                        service: self.source_name.clone(),
                        retry_after_secs: wait.as_secs(),
                    });
                }
                _ => {
                    let body = resp.text().unwrap_or_default();
                    return Err(TalkerError::Network(format!(
                        "{} returned {}: {}",
                        url, status, body
                    )));
                }
            }
        }
        Err(TalkerError::Network(format!(
            "{} failed after {} attempts",
            url, MAX_ATTEMPTS
        )))
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("source_name", &self.source_name)
            .finish()
    }
}

fn request_error(e: reqwest::Error) -> TalkerError {
    if e.is_timeout() {
        TalkerError::Network("request timed out".to_string())
    } else {
        TalkerError::Network(e.to_string())
    }
}

pub fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T, TalkerError> {
    let deserializer = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(deserializer).map_err(|e| TalkerError::SchemaMismatch {
        path: e.path().to_string(),
        detail: e.inner().to_string(),
    })
}

/// MangaDex sends `x-ratelimit-retry-after` as a unix timestamp; an elapsed
/// timestamp means retry immediately.
fn retry_after(headers: &reqwest::header::HeaderMap) -> Duration {
    let stamp = headers
        .get("x-ratelimit-retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    match stamp {
        Some(at) => {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            Duration::from_secs(at.saturating_sub(now))
        }
        None => FALLBACK_RATELIMIT_WAIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApiResponse, Series};

    #[test]
    fn decode_reports_json_path() {
        // attributes.title must be an object, not a number
        let body = r#"{"id": "x", "attributes": {"title": 7}}"#;
        let err = decode_json::<Series>(body).unwrap_err();
        match err {
            TalkerError::SchemaMismatch { path, .. } => {
                assert!(path.contains("attributes.title"), "path was {}", path);
            }
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn decode_accepts_envelope() {
        let body = r#"{"result": "ok", "data": [], "total": 0}"#;
        let resp: ApiResponse<Vec<Series>> = decode_json(body).unwrap();
        assert_eq!(resp.total, Some(0));
    }

    #[test]
    fn retry_after_header_parsing() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(retry_after(&headers), FALLBACK_RATELIMIT_WAIT);

        // elapsed timestamp: no wait
        headers.insert("x-ratelimit-retry-after", "1".parse().unwrap());
        assert_eq!(retry_after(&headers), Duration::from_secs(0));
    }

    #[test]
    fn url_join_handles_slashes() {
        let client = ApiClient::new(
            "https://api.example.invalid/",
            "mangadex",
            "test",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            client.url("/manga"),
            "https://api.example.invalid/manga"
        );
        assert_eq!(
            client.url("manga/abc/feed"),
            "https://api.example.invalid/manga/abc/feed"
        );
    }
}
