//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the MediaWiki action API and the
//! pageviews REST API, and run the full crawl cycle end-to-end against a
//! real checkpoint on disk.

use obit_crawl::config::{parse_config, Config};
use obit_crawl::crawler::{run_crawl, shutdown_channel};
use obit_crawl::output::{compute_statistics, write_csv};
use obit_crawl::storage::{CheckpointStore, SqliteCheckpointStore};
use obit_crawl::{CrawlOutcome, ObitError};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing both APIs at the mock server
fn create_test_config(server: &MockServer, dir: &Path) -> Config {
    let base_url = server.uri();
    parse_config(&format!(
        r#"
[run]
start-year = 1950
stop-year = 1950
metric-range-start = "20200101"
metric-range-end = "20210101"

[crawler]
max-concurrent-fetches = 2
max-retries = 1
retry-base-delay-ms = 1
retry-max-delay-ms = 5

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[source]
wiki-api-url = "{base}/w/api.php"
article-url-prefix = "{base}/wiki/"
metrics-api-url = "{base}/api/rest_v1"

[output]
checkpoint-dir = "{dir}"
log-dir = "{dir}"
"#,
        base = base_url,
        dir = dir.display()
    ))
    .expect("Failed to parse test config")
}

fn pageviews_path(slug: &str) -> String {
    format!(
        "/api/rest_v1/metrics/pageviews/per-article/en.wikipedia.org/all-access/all-agents/{}/monthly/20200101/20210101",
        slug
    )
}

async fn mount_category(server: &MockServer, title: &str, members: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("list", "categorymembers"))
        .and(query_param("cmtitle", title))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "batchcomplete": true,
            "query": {
                "pages": [ { "ns": 14, "title": title, "pageid": 1 } ],
                "categorymembers": members
            }
        })))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, title: &str, page: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("prop", "info"))
        .and(query_param("titles", title))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "query": { "pages": [ page ] } })),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_single_year() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    let dir = TempDir::new().unwrap();

    mount_category(
        &server,
        "Category:Deaths by year",
        json!([
            { "ns": 14, "title": "Category:1949 deaths" },
            { "ns": 14, "title": "Category:1950 deaths" }
        ]),
    )
    .await;
    mount_category(
        &server,
        "Category:1950 deaths",
        json!([
            { "ns": 0, "title": "Alice Able" },
            { "ns": 0, "title": "Bob Gone" },
            { "ns": 0, "title": "Carol Quiet" },
            { "ns": 0, "title": "List of people who died in 1950" },
            { "ns": 14, "title": "Category:1950 murders" }
        ]),
    )
    .await;

    mount_page(
        &server,
        "Alice Able",
        json!({ "ns": 0, "title": "Alice Able", "fullurl": format!("{}/wiki/Alice_Able", base_url) }),
    )
    .await;
    mount_page(
        &server,
        "Bob Gone",
        json!({ "ns": 0, "title": "Bob Gone", "missing": true }),
    )
    .await;
    mount_page(
        &server,
        "Carol Quiet",
        json!({ "ns": 0, "title": "Carol Quiet", "fullurl": format!("{}/wiki/Carol_Quiet", base_url) }),
    )
    .await;

    Mock::given(method("GET"))
        .and(path(pageviews_path("Alice_Able")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "article": "Alice_Able", "timestamp": "2020010100", "views": 30 },
                { "article": "Alice_Able", "timestamp": "2020020100", "views": 12 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(pageviews_path("Carol_Quiet")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "type": "https://mediawiki.org/wiki/HyperSwitch/errors/not_found",
            "title": "Not found."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, dir.path());
    let run_id = config.run_params().unwrap().run_id();
    let report = run_crawl(config, false, shutdown_channel().1)
        .await
        .expect("Crawl failed");

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.recorded, 2);
    assert_eq!(report.zeroed, 1);
    assert_eq!(report.unresolvable, 1);
    assert_eq!(report.excluded, 2);

    let state = SqliteCheckpointStore::new(dir.path())
        .load(&run_id)
        .unwrap()
        .expect("checkpoint written");
    let year = state.year(1950).unwrap();
    assert_eq!(year.len(), 2);
    assert_eq!(year.get("Alice Able").unwrap().views, 42);
    assert_eq!(year.get("Alice Able").unwrap().slug, "Alice_Able");
    assert_eq!(year.get("Carol Quiet").unwrap().views, 0);
    assert!(!year.contains("Bob Gone"));

    let root = state.root_category.as_ref().unwrap();
    assert_eq!(root.members.len(), 2);

    let stats = compute_statistics(&state);
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.zero_views, 1);

    let mut csv = Vec::new();
    write_csv(&state, &mut csv).unwrap();
    assert_eq!(
        String::from_utf8(csv).unwrap(),
        "person,year,views\nAlice Able,1950,42\nCarol Quiet,1950,0\n"
    );
}

#[tokio::test]
async fn test_missing_root_category_aborts() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": {
                "pages": [ { "ns": 14, "title": "Category:Deaths by year", "missing": true } ],
                "categorymembers": []
            }
        })))
        .mount(&server)
        .await;

    let config = create_test_config(&server, dir.path());
    let err = run_crawl(config, false, shutdown_channel().1)
        .await
        .unwrap_err();

    assert!(matches!(err, ObitError::RootCategoryNotFound { .. }));
}

#[tokio::test]
async fn test_server_errors_are_retried_then_skipped() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    let dir = TempDir::new().unwrap();

    mount_category(
        &server,
        "Category:Deaths by year",
        json!([ { "ns": 14, "title": "Category:1950 deaths" } ]),
    )
    .await;
    mount_category(
        &server,
        "Category:1950 deaths",
        json!([ { "ns": 0, "title": "Dan Down" } ]),
    )
    .await;
    mount_page(
        &server,
        "Dan Down",
        json!({ "ns": 0, "title": "Dan Down", "fullurl": format!("{}/wiki/Dan_Down", base_url) }),
    )
    .await;

    // One attempt plus one retry
    Mock::given(method("GET"))
        .and(path(pageviews_path("Dan_Down")))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let config = create_test_config(&server, dir.path());
    let run_id = config.run_params().unwrap().run_id();
    let report = run_crawl(config, false, shutdown_channel().1).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.recorded, 0);

    let state = SqliteCheckpointStore::new(dir.path())
        .load(&run_id)
        .unwrap()
        .unwrap();
    assert_eq!(state.entry_count(), 0);
    assert!(state.root_category.is_some());
}

#[tokio::test]
async fn test_lagged_year_listing_is_retried_not_emptied() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    let dir = TempDir::new().unwrap();

    mount_category(
        &server,
        "Category:Deaths by year",
        json!([ { "ns": 14, "title": "Category:1950 deaths" } ]),
    )
    .await;

    // First listing attempt answers with a lag error inside an HTTP 200
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("cmtitle", "Category:1950 deaths"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "code": "maxlag", "info": "Waiting for a database server: 6 seconds lagged." }
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_category(
        &server,
        "Category:1950 deaths",
        json!([ { "ns": 0, "title": "Eve Early" } ]),
    )
    .await;
    mount_page(
        &server,
        "Eve Early",
        json!({ "ns": 0, "title": "Eve Early", "fullurl": format!("{}/wiki/Eve_Early", base_url) }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(pageviews_path("Eve_Early")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [ { "article": "Eve_Early", "timestamp": "2020010100", "views": 5 } ]
        })))
        .mount(&server)
        .await;

    let config = create_test_config(&server, dir.path());
    let run_id = config.run_params().unwrap().run_id();
    let report = run_crawl(config, false, shutdown_channel().1).await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.recorded, 1);

    let state = SqliteCheckpointStore::new(dir.path())
        .load(&run_id)
        .unwrap()
        .unwrap();
    assert_eq!(state.year(1950).unwrap().get("Eve Early").unwrap().views, 5);
}
