//! Integration tests for the upload pipeline
//!
//! A wiremock server stands in for the recipe manager's import API.

use recipe_harvester::storage::{self, RecipeStore, SharedStorage};
use recipe_harvester::upload::{probe_api, run_upload, UploadPipeline};
use recipe_harvester::{HarvestError, Harvester, ProgressBoard, ProgressKind, RunStatus, UploadConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-token";

fn upload_config(base: String, rate_limit_seconds: f64) -> UploadConfig {
    UploadConfig {
        api_base: Some(base),
        api_key: Some(API_KEY.to_string()),
        rate_limit_seconds,
        timeout_seconds: 5,
    }
}

fn seeded_storage(dir: &tempfile::TempDir, urls: &[&str]) -> SharedStorage {
    let storage = storage::open_shared(&dir.path().join("recipes.db")).unwrap();
    {
        let mut store = storage::lock(&storage);
        for url in urls {
            store.insert_if_absent(url, 1, None).unwrap();
        }
    }
    storage
}

async fn mount_import(server: &MockServer, at: &str, recipe_url: &str, status: u16) {
    Mock::given(method("POST"))
        .and(path(at))
        .and(header("authorization", format!("Bearer {}", API_KEY).as_str()))
        .and(body_json(json!({ "url": recipe_url })))
        .respond_with(ResponseTemplate::new(status))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_failed_upload_stays_pending() {
    let server = MockServer::start().await;
    let recipes = [
        "https://example.com/recipes/a",
        "https://example.com/recipes/b",
        "https://example.com/recipes/c",
    ];
    mount_import(&server, "/api/recipes/import", recipes[0], 201).await;
    mount_import(&server, "/api/recipes/import", recipes[1], 201).await;
    mount_import(&server, "/api/recipes/import", recipes[2], 500).await;

    let dir = tempfile::tempdir().unwrap();
    let storage = seeded_storage(&dir, &recipes);
    let progress = Arc::new(ProgressBoard::new());

    let snapshot = run_upload(
        upload_config(server.uri(), 0.0),
        storage.clone(),
        Arc::clone(&progress),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(snapshot.status, RunStatus::Done);
    assert_eq!(snapshot.total, 3);
    assert_eq!(snapshot.done, 3);
    assert_eq!(snapshot.uploaded, 2);
    assert_eq!(snapshot.failed, 1);
    assert_eq!(progress.upload(), snapshot);

    let store = storage::lock(&storage);
    assert_eq!(store.count_uploaded().unwrap(), 2);
    let pending = store.list_pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].url, recipes[2]);

    let uploaded = store.get_recipe_by_url(recipes[0]).unwrap().unwrap();
    assert!(uploaded.uploaded_at.is_some());
}

#[tokio::test]
async fn test_next_run_retries_only_pending() {
    let server = MockServer::start().await;
    let recipes = ["https://example.com/recipes/a", "https://example.com/recipes/b"];

    Mock::given(method("POST"))
        .and(path("/api/recipes/import"))
        .and(body_json(json!({ "url": recipes[0] })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/recipes/import"))
        .and(body_json(json!({ "url": recipes[1] })))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/recipes/import"))
        .and(body_json(json!({ "url": recipes[1] })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = seeded_storage(&dir, &recipes);

    let first = run_upload(
        upload_config(server.uri(), 0.0),
        storage.clone(),
        Arc::new(ProgressBoard::new()),
        CancellationToken::new(),
    )
    .await;
    assert_eq!(first.uploaded, 1);

    let second = run_upload(
        upload_config(server.uri(), 0.0),
        storage.clone(),
        Arc::new(ProgressBoard::new()),
        CancellationToken::new(),
    )
    .await;
    assert_eq!(second.total, 1);
    assert_eq!(second.uploaded, 1);
    assert_eq!(storage::lock(&storage).count_pending().unwrap(), 0);
}

#[tokio::test]
async fn test_base_ending_in_api_resolves_endpoint() {
    let server = MockServer::start().await;
    let recipe = "https://example.com/recipes/a";
    mount_import(&server, "/api/recipes/import", recipe, 201).await;

    let config = upload_config(format!("{}/api/", server.uri()), 0.0);
    let pipeline = UploadPipeline::from_config(&config).unwrap();
    assert_eq!(pipeline.endpoint(), format!("{}/api/recipes/import", server.uri()));

    let dir = tempfile::tempdir().unwrap();
    let storage = seeded_storage(&dir, &[recipe]);
    let snapshot = pipeline
        .run(&storage, &ProgressBoard::new(), &CancellationToken::new())
        .await;
    assert_eq!(snapshot.uploaded, 1);
}

#[tokio::test]
async fn test_missing_key_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = seeded_storage(&dir, &["https://example.com/recipes/a"]);
    let config = UploadConfig {
        api_base: Some(server.uri()),
        api_key: None,
        ..UploadConfig::default()
    };

    let snapshot = run_upload(
        config,
        storage.clone(),
        Arc::new(ProgressBoard::new()),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(snapshot.status, RunStatus::Error);
    assert!(snapshot.message.unwrap().contains("api-key"));
    assert_eq!(storage::lock(&storage).count_pending().unwrap(), 1);
}

#[tokio::test]
async fn test_stop_during_last_record_still_completes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/recipes/import"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = seeded_storage(&dir, &["https://example.com/recipes/only"]);
    let harvester = Harvester::new(storage.clone(), upload_config(server.uri(), 0.0));
    let progress = harvester.progress();

    harvester.start_upload().unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while progress.upload().last_url.is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("upload should begin");

    harvester.stop_upload();
    let snapshot = harvester.wait_upload().await;

    assert_eq!(snapshot.status, RunStatus::Done);
    assert_eq!(snapshot.done, 1);
    assert_eq!(snapshot.uploaded, 1);
    assert_eq!(storage::lock(&storage).count_pending().unwrap(), 0);
}

#[tokio::test]
async fn test_stop_between_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/recipes/import"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = seeded_storage(
        &dir,
        &[
            "https://example.com/recipes/a",
            "https://example.com/recipes/b",
            "https://example.com/recipes/c",
        ],
    );
    let harvester = Harvester::new(storage.clone(), upload_config(server.uri(), 30.0));
    let progress = harvester.progress();

    harvester.start_upload().unwrap();
    assert!(matches!(
        harvester.start_upload(),
        Err(HarvestError::AlreadyRunning {
            kind: ProgressKind::Upload
        })
    ));

    tokio::time::timeout(Duration::from_secs(5), async {
        while progress.upload().done < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first upload should finish");

    harvester.stop_upload();
    let snapshot = harvester.wait_upload().await;

    assert_eq!(snapshot.status, RunStatus::Stopped);
    assert_eq!(snapshot.done, 1);
    assert_eq!(snapshot.uploaded, 1);
    assert_eq!(storage::lock(&storage).count_pending().unwrap(), 2);
}

#[tokio::test]
async fn test_probe_api_tries_candidates_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/app/about"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .and(header("authorization", format!("Bearer {}", API_KEY).as_str()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/self"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let message = probe_api(&upload_config(server.uri(), 0.0)).await.unwrap();
    assert!(message.contains("/api/health"));
}

#[tokio::test]
async fn test_probe_api_reports_last_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&server)
        .await;

    let result = probe_api(&upload_config(server.uri(), 0.0)).await;
    match result {
        Err(HarvestError::ApiCheck(message)) => {
            assert!(message.contains("/api/users/self"));
            assert!(message.contains("401"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}
