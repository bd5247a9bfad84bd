//! Integration tests against a mocked MangaDex API.
//!
//! The talker is blocking, so each test owns a small tokio runtime that
//! hosts the wiremock server while the talker is driven from the test
//! thread.

use comic_talker_core::config::HttpConfig;
use comic_talker_core::error::TalkerError;
use comic_talker_core::talker::{SearchQuery, Talker};
use comic_talker_mangadex::{MangaDexSettings, MangaDexTalker};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct MockApi {
    server: MockServer,
    rt: tokio::runtime::Runtime,
}

impl MockApi {
    fn start() -> Self {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        Self { server, rt }
    }

    fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    fn uri(&self) -> String {
        self.server.uri()
    }
}

fn talker(api: &MockApi) -> MangaDexTalker {
    talker_at(&api.uri())
}

fn talker_at(uri: &str) -> MangaDexTalker {
    let settings = MangaDexSettings {
        api_url: Some(uri.to_string()),
        ..Default::default()
    };
    let http = HttpConfig {
        timeout_secs: Some(5),
        user_agent: None,
    };
    MangaDexTalker::new(settings, &http, None).unwrap()
}

fn series_json(id: &str, title: &str, year: u32) -> Value {
    json!({
        "id": id,
        "type": "manga",
        "attributes": {
            "title": {"en": title},
            "altTitles": [{"ja": "別名"}],
            "description": {"en": "A description."},
            "lastChapter": "10",
            "lastVolume": "2",
            "status": "completed",
            "year": year,
            "contentRating": "safe",
            "tags": [
                {"id": "t1", "type": "tag", "attributes": {"name": {"en": "Action"}, "group": "genre"}}
            ]
        },
        "relationships": [
            {"id": "a1", "type": "author", "attributes": {"name": "Some Author"}},
            {"id": "c1", "type": "cover_art", "attributes": {"fileName": "cover.jpg"}}
        ]
    })
}

fn chapter_json(id: &str, series_id: &str, number: &str, official: bool) -> Value {
    json!({
        "id": id,
        "type": "chapter",
        "attributes": {
            "volume": "1",
            "chapter": number,
            "title": "A Chapter",
            "translatedLanguage": "en",
            "publishAt": "2020-01-02T00:00:00+00:00",
            "pages": 20
        },
        "relationships": [
            {"id": series_id, "type": "manga"},
            {"id": "g1", "type": "scanlation_group",
             "attributes": {"name": if official { "Official Press" } else { "Fans" }, "official": official}}
        ]
    })
}

fn collection(data: Vec<Value>, total: usize) -> Value {
    json!({
        "result": "ok",
        "response": "collection",
        "data": data,
        "limit": 100,
        "offset": 0,
        "total": total
    })
}

fn entity(data: Value) -> Value {
    json!({"result": "ok", "response": "entity", "data": data})
}

#[test]
fn search_returns_results_in_remote_order() {
    let api = MockApi::start();
    api.mount(
        Mock::given(method("GET"))
            .and(path("/manga"))
            .and(query_param("title", "alpha"))
            .respond_with(ResponseTemplate::new(200).set_body_json(collection(
                vec![
                    series_json("s2", "Alpha Two", 2001),
                    series_json("s1", "Alpha One", 2000),
                ],
                2,
            ))),
    );

    let results = talker(&api)
        .search_series(&SearchQuery::new("Alpha!"))
        .unwrap();

    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["s2", "s1"]);
    assert_eq!(results[0].name, "Alpha Two");
    assert_eq!(results[0].count_of_issues, Some(10));
    assert_eq!(
        results[0].image_url.as_deref(),
        Some("https://uploads.mangadex.org/covers/s2/cover.jpg")
    );
}

#[test]
fn search_with_no_matches_is_empty_not_an_error() {
    let api = MockApi::start();
    api.mount(
        Mock::given(method("GET"))
            .and(path("/manga"))
            .respond_with(ResponseTemplate::new(200).set_body_json(collection(vec![], 0))),
    );

    let results = talker(&api)
        .search_series(&SearchQuery::new("no such series"))
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn search_fetches_additional_pages() {
    let api = MockApi::start();
    let page1: Vec<Value> = (0..100)
        .map(|i| series_json(&format!("s{}", i), "Alpha", 2000))
        .collect();
    let page2: Vec<Value> = (100..150)
        .map(|i| series_json(&format!("s{}", i), "Alpha", 2000))
        .collect();

    api.mount(
        Mock::given(method("GET"))
            .and(path("/manga"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(collection(page1, 150))),
    );
    api.mount(
        Mock::given(method("GET"))
            .and(path("/manga"))
            .and(query_param("offset", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "ok", "response": "collection",
                "data": page2, "limit": 100, "offset": 100, "total": 150
            }))),
    );

    let results = talker(&api).search_series(&SearchQuery::new("alpha")).unwrap();
    assert_eq!(results.len(), 150);
}

#[test]
fn search_stops_paging_when_titles_drift() {
    let api = MockApi::start();
    // claims 300 results, but the first page already contains a non-match
    api.mount(
        Mock::given(method("GET"))
            .and(path("/manga"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(collection(
                vec![
                    series_json("s1", "Alpha", 2000),
                    series_json("s2", "Completely Different", 2000),
                ],
                300,
            ))),
    );
    // no mock for offset=100: a second page request would 404 into an error

    let results = talker(&api).search_series(&SearchQuery::new("alpha")).unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn fetch_issue_maps_chapter_and_series() {
    let api = MockApi::start();
    api.mount(
        Mock::given(method("GET"))
            .and(path("/chapter/ch1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(entity(chapter_json("ch1", "s1", "003", true))),
            ),
    );
    api.mount(
        Mock::given(method("GET"))
            .and(path("/manga/s1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(entity(series_json("s1", "Alpha", 2000))),
            ),
    );

    let md = talker(&api).fetch_issue("ch1").unwrap();
    assert_eq!(md.issue_id.as_deref(), Some("ch1"));
    assert_eq!(md.series_id.as_deref(), Some("s1"));
    assert_eq!(md.series.as_deref(), Some("Alpha"));
    assert_eq!(md.issue.as_deref(), Some("3"));
    assert_eq!(md.publisher.as_deref(), Some("Official Press"));
    assert_eq!((md.year, md.month, md.day), (Some(2020), Some(1), Some(2)));
    assert!(md.manga);
}

#[test]
fn fetch_issue_is_idempotent() {
    let api = MockApi::start();
    api.mount(
        Mock::given(method("GET"))
            .and(path("/chapter/ch1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(entity(chapter_json("ch1", "s1", "3", true))),
            ),
    );
    api.mount(
        Mock::given(method("GET"))
            .and(path("/manga/s1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(entity(series_json("s1", "Alpha", 2000))),
            ),
    );

    let t = talker(&api);
    let first = t.fetch_issue("ch1").unwrap();
    let second = t.fetch_issue("ch1").unwrap();
    assert_eq!(first, second);
}

#[test]
fn cached_issue_survives_remote_outage() {
    let api = MockApi::start();
    api.mount(
        Mock::given(method("GET"))
            .and(path("/chapter/ch1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(entity(chapter_json("ch1", "s1", "3", true))),
            ),
    );
    api.mount(
        Mock::given(method("GET"))
            .and(path("/manga/s1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(entity(series_json("s1", "Alpha", 2000))),
            ),
    );

    let cache_dir = tempfile::tempdir().unwrap();
    let settings = MangaDexSettings {
        api_url: Some(api.uri()),
        ..Default::default()
    };
    let http = HttpConfig {
        timeout_secs: Some(5),
        user_agent: None,
    };
    let cache = comic_talker_core::cache::RecordCache::new(cache_dir.path(), "test");
    let t = MangaDexTalker::new(settings, &http, Some(cache)).unwrap();

    let first = t.fetch_issue("ch1").unwrap();
    drop(api); // remote goes away
    let second = t.fetch_issue("ch1").unwrap();
    assert_eq!(first, second);
}

#[test]
fn single_issue_fetch_keeps_cached_feed() {
    let api = MockApi::start();
    api.mount(
        Mock::given(method("GET"))
            .and(path("/manga/s1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(entity(series_json("s1", "Alpha", 2000))),
            ),
    );
    api.mount(
        Mock::given(method("GET"))
            .and(path("/manga/s1/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(collection(
                vec![
                    chapter_json("ch1", "s1", "1", true),
                    chapter_json("ch2", "s1", "2", true),
                ],
                2,
            ))),
    );
    api.mount(
        Mock::given(method("GET"))
            .and(path("/chapter/ch3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(entity(chapter_json("ch3", "s1", "3", true))),
            ),
    );

    let cache_dir = tempfile::tempdir().unwrap();
    let settings = MangaDexSettings {
        api_url: Some(api.uri()),
        ..Default::default()
    };
    let http = HttpConfig {
        timeout_secs: Some(5),
        user_agent: None,
    };
    let cache = comic_talker_core::cache::RecordCache::new(cache_dir.path(), "test");
    let t = MangaDexTalker::new(settings, &http, Some(cache)).unwrap();

    assert_eq!(t.fetch_issues_in_series("s1").unwrap().len(), 2);
    t.fetch_issue("ch3").unwrap();

    // the one-off fetch extends the cached feed instead of replacing it
    let issues = t.fetch_issues_in_series("s1").unwrap();
    let ids: Vec<&str> = issues.iter().filter_map(|i| i.issue_id.as_deref()).collect();
    assert_eq!(ids, vec!["ch1", "ch2", "ch3"]);
}

#[test]
fn search_volume_hint_skips_shorter_finished_series() {
    let api = MockApi::start();
    let short = series_json("s-short", "Alpha", 2000); // lastVolume "2"
    let mut long = series_json("s-long", "Alpha", 2000);
    long["attributes"]["lastVolume"] = json!("5");
    let mut open = series_json("s-open", "Alpha", 2000);
    open["attributes"]["lastVolume"] = Value::Null;

    api.mount(
        Mock::given(method("GET"))
            .and(path("/manga"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(collection(vec![short, long, open], 3)),
            ),
    );

    let query = SearchQuery {
        volume: Some(4),
        ..SearchQuery::new("alpha")
    };
    let results = talker(&api).search_series(&query).unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    // unknown volume counts are kept; a series finished at volume 2 is not
    assert_eq!(ids, vec!["s-long", "s-open"]);
}

#[test]
fn fetch_issue_unknown_id_is_not_found() {
    let api = MockApi::start();
    api.mount(
        Mock::given(method("GET"))
            .and(path("/chapter/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "result": "error",
                "errors": [{"status": 404, "title": "not_found_http_exception"}]
            }))),
    );

    let err = talker(&api).fetch_issue("missing").unwrap_err();
    assert!(matches!(err, TalkerError::NotFound(_)), "got {:?}", err);
}

#[test]
fn missing_required_field_is_schema_mismatch() {
    let api = MockApi::start();
    // chapter without an id: the mapping cannot produce a record
    api.mount(
        Mock::given(method("GET"))
            .and(path("/chapter/bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "ok",
                "response": "entity",
                "data": {"type": "chapter", "attributes": {"chapter": "1"}}
            }))),
    );

    let err = talker(&api).fetch_issue("bad").unwrap_err();
    match err {
        TalkerError::SchemaMismatch { path, .. } => {
            assert!(path.starts_with("data"), "path was {}", path);
        }
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
}

#[test]
fn rate_limit_surfaces_after_bounded_retries() {
    let api = MockApi::start();
    // elapsed retry-after timestamp: the client retries immediately, then
    // gives up after its attempt budget
    api.mount(
        Mock::given(method("GET"))
            .and(path("/chapter/ch1"))
            .respond_with(
                ResponseTemplate::new(429).insert_header("x-ratelimit-retry-after", "1"),
            ),
    );

    let err = talker(&api).fetch_issue("ch1").unwrap_err();
    assert!(matches!(err, TalkerError::RateLimited { .. }), "got {:?}", err);
}

#[test]
fn server_errors_surface_as_network_after_retries() {
    let api = MockApi::start();
    api.mount(
        Mock::given(method("GET"))
            .and(path("/manga"))
            .respond_with(ResponseTemplate::new(500)),
    );

    let err = talker(&api)
        .search_series(&SearchQuery::new("alpha"))
        .unwrap_err();
    assert!(matches!(err, TalkerError::Network(_)), "got {:?}", err);
}

#[test]
fn connection_failure_is_network_error() {
    // nothing listens here; the call must fail fast, not retry-loop
    let t = talker_at("http://127.0.0.1:9");
    let err = t.search_series(&SearchQuery::new("alpha")).unwrap_err();
    assert!(matches!(err, TalkerError::Network(_)), "got {:?}", err);
}

#[test]
fn fetch_issues_in_series_dedupes_releases() {
    let api = MockApi::start();
    api.mount(
        Mock::given(method("GET"))
            .and(path("/manga/s1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(entity(series_json("s1", "Alpha", 2000))),
            ),
    );
    api.mount(
        Mock::given(method("GET"))
            .and(path("/manga/s1/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(collection(
                vec![
                    chapter_json("fan", "s1", "1", false),
                    chapter_json("official", "s1", "1", true),
                    chapter_json("two", "s1", "2", false),
                ],
                3,
            ))),
    );

    let issues = talker(&api).fetch_issues_in_series("s1").unwrap();
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].issue_id.as_deref(), Some("official"));
    assert_eq!(issues[0].issue.as_deref(), Some("1"));
    assert_eq!(issues[1].issue.as_deref(), Some("2"));
}

#[test]
fn health_check_requires_pong() {
    let api = MockApi::start();
    api.mount(
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong")),
    );
    assert!(talker(&api).health_check().is_ok());

    let api2 = MockApi::start();
    api2.mount(
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>")),
    );
    assert!(talker(&api2).health_check().is_err());
}

#[test]
fn health_check_surfaces_rate_limiting() {
    let api = MockApi::start();
    api.mount(
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(
                ResponseTemplate::new(429).insert_header("x-ratelimit-retry-after", "1"),
            ),
    );

    let err = talker(&api).health_check().unwrap_err();
    assert!(matches!(err, TalkerError::RateLimited { .. }), "got {:?}", err);
}
