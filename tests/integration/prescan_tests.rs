//! Integration tests for site prescan
//!
//! A wiremock server serves a small site whose links and markup drive the
//! pattern and selector guesses.

use recipe_harvester::crawler::{prescan, prescan_with, Backoff, FetchOptions, Fetcher};
use recipe_harvester::HarvestError;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html; charset=utf-8")
}

fn fast_fetcher() -> Fetcher {
    Fetcher::new(FetchOptions {
        user_agent: "TestCrawler/1.0".to_string(),
        timeout: Duration::from_secs(5),
        delay: Duration::ZERO,
        retries: 0,
        backoff: Backoff::default(),
    })
    .unwrap()
}

fn index_page() -> String {
    let mut anchors = String::new();
    anchors.push_str(r#"<a href="/about">About</a>"#);
    anchors.push_str(r#"<a href="https://elsewhere.example.org/dish/x">Foreign</a>"#);
    for i in 0..2 {
        anchors.push_str(&format!(r#"<a href="/dish/{}">Dish {}</a>"#, i, i));
    }
    for i in 0..10 {
        anchors.push_str(&format!(r#"<a href="/recipe/{}">Recipe {}</a>"#, i, i));
    }
    format!("<html><body>{}</body></html>", anchors)
}

const SAMPLE_RECIPE: &str = r#"<html><body>
    <h1>Tomato Soup</h1>
    <h2>Ingredients</h2>
    <ul class="ingredient-list wprm"><li>Tomatoes</li><li>Salt</li></ul>
    <h2>Instructions</h2>
    <ol id="recipe-steps"><li>Chop</li><li>Simmer</li></ol>
</body></html>"#;

#[tokio::test]
async fn test_prescan_guesses_majority_pattern_and_selectors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(index_page()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recipe/0"))
        .respond_with(html(SAMPLE_RECIPE))
        .expect(1)
        .mount(&server)
        .await;

    let report = prescan_with(&fast_fetcher(), &format!("{}/", server.uri()))
        .await
        .unwrap();

    assert_eq!(report.recipe_pattern, "/recipe/");
    assert_eq!(report.sample_url, Some(format!("{}/recipe/0", server.uri())));
    assert_eq!(report.links_sampled, 13);
    assert_eq!(
        report.ingredients_selector.as_deref(),
        Some("ul.ingredient-list.wprm li")
    );
    assert_eq!(report.method_selector.as_deref(), Some("ol#recipe-steps li"));
}

#[tokio::test]
async fn test_prescan_without_matching_links_uses_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<html><body><a href="/about">About</a></body></html>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html(
            r#"<html><head><script type="application/ld+json">{"@type":"Recipe"}</script></head></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let report = prescan(&format!("{}/", server.uri())).await.unwrap();

    assert_eq!(report.recipe_pattern, "/recipe");
    assert_eq!(report.sample_url, Some(format!("{}/about", server.uri())));
    assert_eq!(report.ingredients_selector, None);
    assert_eq!(report.method_selector, None);
}

#[tokio::test]
async fn test_prescan_unreachable_start_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = prescan_with(&fast_fetcher(), &format!("{}/", server.uri())).await;
    assert!(matches!(result, Err(HarvestError::Prescan(_))));
}

#[tokio::test]
async fn test_prescan_rejects_invalid_url() {
    let result = prescan_with(&fast_fetcher(), "not a url").await;
    assert!(matches!(result, Err(HarvestError::Url(_))));
}
