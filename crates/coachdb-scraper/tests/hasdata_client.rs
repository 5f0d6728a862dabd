//! Integration tests for `HasDataClient` against a local `wiremock` server.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use coachdb_scraper::{ClientSettings, HasDataClient, ProfileProvider, ScraperError};

fn test_client(server: &MockServer) -> HasDataClient {
    let settings = ClientSettings {
        timeout_secs: 5,
        user_agent: "coachdb-test/0.1".to_owned(),
        max_retries: 0,
        backoff_base_ms: 0,
    };
    HasDataClient::with_base_url("hd-key", &settings, &server.uri())
        .expect("failed to build test HasDataClient")
}

#[tokio::test]
async fn fetch_one_sends_handle_and_api_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/scrape/instagram/profile"))
        .and(query_param("handle", "lena.yoga"))
        .and(header("x-api-key", "hd-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "77",
            "username": "lena.yoga",
            "fullName": "Lena Berger",
            "biography": "Yoga & Achtsamkeit in Wien",
            "profilePicUrl": "https://cdn.example.com/lena.jpg",
            "profilePicUrlHD": "https://cdn.example.com/lena_hd.jpg",
            "followersCount": 2400,
            "followsCount": 180,
            "postsCount": 95,
            "isBusinessAccount": true,
            "verified": false,
            "private": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = test_client(&server)
        .fetch_one("lena.yoga")
        .await
        .expect("fetch succeeds")
        .expect("profile present");

    assert_eq!(fetched.profile.id, "77");
    assert_eq!(fetched.profile.username, "lena.yoga");
    assert_eq!(fetched.profile.niche, "Health & Wellness");
    assert_eq!(fetched.profile.followers_count, 2400);
    assert!(fetched.profile.is_business_account);
    assert!(fetched.related.is_empty());
}

#[tokio::test]
async fn fetch_one_returns_none_on_404() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/scrape/instagram/profile"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = test_client(&server).fetch_one("ghost").await;
    assert!(matches!(result, Ok(None)), "got: {result:?}");
}

#[tokio::test]
async fn fetch_one_skips_private_profile() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/scrape/instagram/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "9",
            "username": "hidden",
            "biography": "Coach aus Hamburg",
            "isPrivate": true
        })))
        .mount(&server)
        .await;

    let result = test_client(&server).fetch_one("hidden").await;
    assert!(matches!(result, Ok(None)), "got: {result:?}");
}

#[tokio::test]
async fn fetch_one_maps_429_to_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/scrape/instagram/profile"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server).fetch_one("anna").await.unwrap_err();
    assert!(
        matches!(
            err,
            ScraperError::RateLimited {
                retry_after_secs: 60,
                ..
            }
        ),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn fetch_one_reports_generic_message_without_error_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/scrape/instagram/profile"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let err = test_client(&server).fetch_one("anna").await.unwrap_err();
    match err {
        ScraperError::Provider {
            status, message, ..
        } => {
            assert_eq!(status, 401);
            assert_eq!(message, "API error: 401");
        }
        other => panic!("expected Provider error, got: {other:?}"),
    }
}
