//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use recipe_harvester::config::SiteProfile;
use recipe_harvester::crawler::{run_crawl, Backoff, FetchOptions, FetchResult, Fetcher};
use recipe_harvester::storage::{self, LogSink, RecipeStore, SharedStorage};
use recipe_harvester::{HarvestError, Harvester, ProgressBoard, ProgressKind, RunStatus, UploadConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html; charset=utf-8")
}

fn page(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    format!("<html><head><title>Page</title></head><body>{}</body></html>", anchors)
}

fn recipe_page(title: &str) -> String {
    format!(
        r#"<html><head><title>{}</title>
        <script type="application/ld+json">{{"@context":"https://schema.org","@type":"Recipe","name":"{}"}}</script>
        </head><body><h1>{}</h1></body></html>"#,
        title, title, title
    )
}

/// Creates a fast test profile for the mock server
fn test_site(server: &MockServer) -> SiteProfile {
    let mut site = SiteProfile::new(7, "mock", format!("{}/", server.uri()));
    site.max_concurrency = 2;
    site.request_delay_seconds = 0.0;
    site.retries = 0;
    site.request_timeout_seconds = 5;
    site
}

fn test_storage(dir: &tempfile::TempDir) -> SharedStorage {
    storage::open_shared(&dir.path().join("recipes.db")).expect("Failed to open storage")
}

async fn mount_page(server: &MockServer, at: &str, body: String, times: u64) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(html(body))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_drains_and_fetches_each_page_once() {
    let server = MockServer::start().await;

    mount_page(&server, "/", page(&["/a", "/b", "/a?ref=dup", "/#top"]), 1).await;
    mount_page(&server, "/a", page(&["/", "/b", "/a"]), 1).await;
    mount_page(&server, "/b", page(&["/a", "/c"]), 1).await;
    mount_page(&server, "/c", page(&[]), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let progress = Arc::new(ProgressBoard::new());
    let snapshot = run_crawl(
        Some(test_site(&server)),
        test_storage(&dir),
        Arc::clone(&progress),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(snapshot.status, RunStatus::Done);
    assert_eq!(snapshot.pages, 4);
    assert_eq!(snapshot.recipes_found, 0);
    assert_eq!(snapshot.site_id, Some(7));
    assert!(snapshot.ended_at.is_some());
    assert_eq!(progress.crawl(), snapshot);
}

#[tokio::test]
async fn test_page_budget_stops_crawl() {
    let server = MockServer::start().await;

    let links: Vec<String> = (0..60).map(|i| format!("/page/{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    mount_page(&server, "/", page(&link_refs), 1).await;
    Mock::given(method("GET"))
        .respond_with(html(page(&[])))
        .mount(&server)
        .await;

    let mut site = test_site(&server);
    site.max_pages = Some(5);
    site.max_concurrency = 4;

    let dir = tempfile::tempdir().unwrap();
    let snapshot = run_crawl(
        Some(site),
        test_storage(&dir),
        Arc::new(ProgressBoard::new()),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(snapshot.status, RunStatus::Stopped);
    assert!(snapshot.pages <= 5, "fetched {} pages", snapshot.pages);

    let requests = server.received_requests().await.unwrap();
    assert!(requests.len() <= 5, "server saw {} requests", requests.len());
}

#[tokio::test]
async fn test_recipe_linked_twice_is_stored_once() {
    let server = MockServer::start().await;

    mount_page(&server, "/", page(&["/recipes/soup", "/a", "/recipes/soup?print=1"]), 1).await;
    mount_page(&server, "/a", page(&["/recipes/soup", "/recipes/stew"]), 1).await;
    mount_page(&server, "/recipes/soup", recipe_page("Pea Soup"), 1).await;
    mount_page(&server, "/recipes/stew", recipe_page("Beef Stew"), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let storage = test_storage(&dir);
    let snapshot = run_crawl(
        Some(test_site(&server)),
        storage.clone(),
        Arc::new(ProgressBoard::new()),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(snapshot.status, RunStatus::Done);
    assert_eq!(snapshot.recipes_found, 2);
    assert_eq!(snapshot.pages, 2);

    let store = storage::lock(&storage);
    assert_eq!(store.count_total().unwrap(), 2);
    let soup = store
        .get_recipe_by_url(&format!("{}/recipes/soup", server.uri()))
        .unwrap()
        .expect("soup should be stored");
    assert_eq!(soup.title.as_deref(), Some("Pea Soup"));
    assert_eq!(soup.site_id, Some(7));
}

#[tokio::test]
async fn test_second_crawl_does_not_duplicate_records() {
    let server = MockServer::start().await;

    mount_page(&server, "/", page(&["/recipes/soup"]), 2).await;
    mount_page(&server, "/recipes/soup", recipe_page("Soup"), 2).await;

    let dir = tempfile::tempdir().unwrap();
    let storage = test_storage(&dir);
    for _ in 0..2 {
        let snapshot = run_crawl(
            Some(test_site(&server)),
            storage.clone(),
            Arc::new(ProgressBoard::new()),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(snapshot.status, RunStatus::Done);
    }

    assert_eq!(storage::lock(&storage).count_total().unwrap(), 1);
}

#[tokio::test]
async fn test_negative_candidates_are_leaves() {
    let server = MockServer::start().await;

    mount_page(&server, "/", page(&["/recipes/roundup"]), 1).await;
    mount_page(&server, "/recipes/roundup", page(&["/hidden"]), 1).await;
    mount_page(&server, "/hidden", page(&[]), 0).await;

    let dir = tempfile::tempdir().unwrap();
    let storage = test_storage(&dir);
    let snapshot = run_crawl(
        Some(test_site(&server)),
        storage.clone(),
        Arc::new(ProgressBoard::new()),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(snapshot.status, RunStatus::Done);
    assert_eq!(snapshot.recipes_found, 0);
    assert_eq!(storage::lock(&storage).count_total().unwrap(), 0);
}

#[tokio::test]
async fn test_links_resolve_against_redirect_target() {
    let server = MockServer::start().await;

    mount_page(&server, "/", page(&["/old"]), 1).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/section/"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/section/", page(&["next"]), 1).await;
    mount_page(&server, "/section/next", page(&[]), 1).await;
    mount_page(&server, "/next", page(&[]), 0).await;

    let dir = tempfile::tempdir().unwrap();
    let snapshot = run_crawl(
        Some(test_site(&server)),
        test_storage(&dir),
        Arc::new(ProgressBoard::new()),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(snapshot.status, RunStatus::Done);
    assert_eq!(snapshot.pages, 3);
}

#[tokio::test]
async fn test_links_to_other_hosts_are_never_fetched() {
    let server = MockServer::start().await;
    let elsewhere = MockServer::start().await;

    let away_page = format!("{}/about", elsewhere.uri());
    let away_recipe = format!("{}/recipes/stew", elsewhere.uri());
    mount_page(&server, "/", page(&["/local", &away_page, &away_recipe]), 1).await;
    mount_page(&server, "/local", page(&[&away_page]), 1).await;
    Mock::given(method("GET"))
        .respond_with(html(recipe_page("Stew")))
        .expect(0)
        .mount(&elsewhere)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = test_storage(&dir);
    let snapshot = run_crawl(
        Some(test_site(&server)),
        storage.clone(),
        Arc::new(ProgressBoard::new()),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(snapshot.status, RunStatus::Done);
    assert_eq!(snapshot.pages, 2);
    assert_eq!(snapshot.recipes_found, 0);
    assert_eq!(storage::lock(&storage).count_total().unwrap(), 0);
}

#[tokio::test]
async fn test_selector_classification_and_custom_pattern() {
    let server = MockServer::start().await;

    let dish = r#"<html><head><title>Dal</title></head><body>
        <ul class="ingredients"><li>Lentils</li></ul>
        <ol class="method"><li>Simmer</li></ol>
    </body></html>"#;
    let half_dish = r#"<html><head><title>Half</title></head><body>
        <ul class="ingredients"><li>Lentils</li></ul>
    </body></html>"#;

    mount_page(&server, "/", page(&["/dish/dal", "/dish/half", "/recipes/ignored"]), 1).await;
    mount_page(&server, "/dish/dal", dish.to_string(), 1).await;
    mount_page(&server, "/dish/half", half_dish.to_string(), 1).await;
    mount_page(&server, "/recipes/ignored", page(&[]), 1).await;

    let mut site = test_site(&server);
    site.recipe_pattern = Some("/dish/".to_string());
    site.ingredients_selector = Some(".ingredients li".to_string());
    site.method_selector = Some(".method li".to_string());

    let dir = tempfile::tempdir().unwrap();
    let storage = test_storage(&dir);
    let snapshot = run_crawl(
        Some(site),
        storage.clone(),
        Arc::new(ProgressBoard::new()),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(snapshot.status, RunStatus::Done);
    assert_eq!(snapshot.recipes_found, 1);
    // `/recipes/ignored` does not match the configured pattern, so it is traversed
    assert_eq!(snapshot.pages, 2);

    let urls = storage::lock(&storage).all_urls().unwrap();
    assert_eq!(urls, vec![format!("{}/dish/dal", server.uri())]);
}

#[tokio::test]
async fn test_recipe_budget_stops_crawl() {
    let server = MockServer::start().await;

    mount_page(&server, "/", page(&["/recipes/a", "/recipes/b", "/recipes/c"]), 1).await;
    for name in ["a", "b", "c"] {
        Mock::given(method("GET"))
            .and(path(format!("/recipes/{}", name)))
            .respond_with(html(recipe_page(name)))
            .mount(&server)
            .await;
    }

    let mut site = test_site(&server);
    site.max_recipes = Some(1);

    let dir = tempfile::tempdir().unwrap();
    let storage = test_storage(&dir);
    let snapshot = run_crawl(
        Some(site),
        storage.clone(),
        Arc::new(ProgressBoard::new()),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(snapshot.status, RunStatus::Stopped);
    assert_eq!(snapshot.recipes_found, 1);
    assert_eq!(storage::lock(&storage).count_total().unwrap(), 1);
}

#[tokio::test]
async fn test_failed_pages_are_logged_and_skipped() {
    let server = MockServer::start().await;

    mount_page(&server, "/", page(&["/gone", "/data", "/ok"]), 1).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/ok", page(&[]), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let storage = test_storage(&dir);
    let snapshot = run_crawl(
        Some(test_site(&server)),
        storage.clone(),
        Arc::new(ProgressBoard::new()),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(snapshot.status, RunStatus::Done);
    assert_eq!(snapshot.pages, 4);

    let logs = storage::lock(&storage).recent_logs(20).unwrap();
    let failures: Vec<_> = logs
        .iter()
        .filter(|entry| entry.message.starts_with("Page unavailable"))
        .collect();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|entry| entry.site_id == Some(7)));
}

#[tokio::test]
async fn test_start_while_running_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html(page(&[])).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let harvester = Harvester::new(test_storage(&dir), UploadConfig::default());

    harvester.start_crawl(Some(test_site(&server))).unwrap();
    assert!(harvester.is_running(ProgressKind::Crawl));

    let second = harvester.start_crawl(Some(test_site(&server)));
    assert!(matches!(
        second,
        Err(HarvestError::AlreadyRunning {
            kind: ProgressKind::Crawl
        })
    ));

    harvester.stop_crawl();
    let snapshot = harvester.wait_crawl().await;
    assert_eq!(snapshot.status, RunStatus::Stopped);
    assert!(!harvester.is_running(ProgressKind::Crawl));

    // Once the stopped run has fully ended a new one may start
    harvester.start_crawl(Some(test_site(&server))).unwrap();
    harvester.stop_crawl();
    harvester.wait_crawl().await;
}

fn retry_options(retries: u32) -> FetchOptions {
    FetchOptions {
        user_agent: "TestCrawler/1.0".to_string(),
        timeout: Duration::from_secs(5),
        delay: Duration::ZERO,
        retries,
        backoff: Backoff {
            base: Duration::from_millis(40),
            cap: Duration::from_millis(60),
        },
    }
}

#[tokio::test]
async fn test_fetcher_retries_transient_errors_then_gives_up() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let options = retry_options(2);
    let expected_pause: Duration = options.backoff.schedule(2).iter().sum();
    let fetcher = Fetcher::new(options).unwrap();

    let started = Instant::now();
    let result = fetcher.fetch(&format!("{}/flaky", server.uri())).await;

    assert!(matches!(
        result,
        FetchResult::HttpError {
            status_code: 503,
            attempts: 3
        }
    ));
    assert!(started.elapsed() >= expected_pause);
    assert!(result.into_html().is_none());
}

#[tokio::test]
async fn test_fetcher_recovers_after_transient_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(html("<html><title>ok</title></html>"))
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(retry_options(2)).unwrap();
    let body = fetcher.fetch_html(&format!("{}/busy", server.uri())).await;
    assert_eq!(body.as_deref(), Some("<html><title>ok</title></html>"));
}

#[tokio::test]
async fn test_fetcher_does_not_retry_permanent_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/image"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 8], "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(retry_options(2)).unwrap();

    let missing = fetcher.fetch(&format!("{}/missing", server.uri())).await;
    assert!(matches!(
        missing,
        FetchResult::HttpError {
            status_code: 404,
            attempts: 1
        }
    ));

    let image = fetcher.fetch(&format!("{}/image", server.uri())).await;
    assert!(matches!(image, FetchResult::NotHtml { .. }));
}
