//! Integration tests for `TwitterClient` using wiremock HTTP mocks.

use ftrack_core::{Channel, CollectionSettings, Platform};
use ftrack_sources::{ClientConfig, PageSizes, SourceClient, SourceError, TwitterClient};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> ClientConfig {
    ClientConfig {
        timeout_secs: 5,
        user_agent: "ftrack-test".to_string(),
        page_sizes: PageSizes {
            primary: 2,
            secondary: 500,
        },
    }
}

fn test_client(base_url: &str) -> TwitterClient {
    TwitterClient::with_base_url(Some("test-token"), &config(), base_url)
        .expect("client construction should not fail")
}

fn channel(handle: &str, is_primary: bool) -> Channel {
    Channel {
        id: 2,
        forecaster_id: 1,
        forecaster_name: "Macro Maven".to_string(),
        platform: Platform::Twitter,
        external_id: handle.to_string(),
        display_name: handle.to_string(),
        url: None,
        is_primary,
        is_active: true,
        settings: CollectionSettings {
            check_interval_secs: 900,
            last_checked_at: None,
            enabled: true,
        },
    }
}

async fn mount_user_lookup(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users/by/username/MacroMaven"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "id": "12345", "name": "Macro Maven", "username": "MacroMaven" }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetches_recent_tweets() {
    let server = MockServer::start().await;
    mount_user_lookup(&server).await;

    Mock::given(method("GET"))
        .and(path("/users/12345/tweets"))
        .and(query_param("tweet.fields", "created_at"))
        .and(query_param("max_results", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {
                    "id": "1001",
                    "text": "BTC breaks 100k by June\nMark it.",
                    "created_at": "2025-03-01T12:00:00.000Z"
                },
                { "id": "1000", "text": "gm" }
            ],
            "meta": { "result_count": 2 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = test_client(&server.uri())
        .fetch_recent_items(&channel("MacroMaven", true))
        .await
        .expect("should fetch tweets");

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].external_id, "1001");
    assert!(items[0].title.is_empty());
    assert_eq!(items[0].body, "BTC breaks 100k by June\nMark it.");
    assert_eq!(items[0].combined_text(), "BTC breaks 100k by June\nMark it.");
    assert!(items[0].published_at.is_some());
    assert!(items[1].published_at.is_none());
}

#[tokio::test]
async fn page_size_is_clamped_to_api_maximum() {
    let server = MockServer::start().await;
    mount_user_lookup(&server).await;

    Mock::given(method("GET"))
        .and(path("/users/12345/tweets"))
        .and(query_param("max_results", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "meta": { "result_count": 0 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = test_client(&server.uri())
        .fetch_recent_items(&channel("MacroMaven", false))
        .await
        .expect("timeline without data is empty");
    assert!(items.is_empty());
}

#[tokio::test]
async fn unknown_user_is_channel_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/by/username/nobody"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errors": [{ "title": "Not Found Error", "detail": "Could not find user" }]
        })))
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .fetch_recent_items(&channel("nobody", false))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::ChannelNotFound { .. }));
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/by/username/MacroMaven"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "60"))
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .fetch_recent_items(&channel("MacroMaven", true))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SourceError::RateLimited {
            retry_after_secs: Some(60),
            ..
        }
    ));
}

#[tokio::test]
async fn rejected_token_is_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .fetch_recent_items(&channel("MacroMaven", true))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Unauthorized { status: 401, .. }));
}

#[tokio::test]
async fn missing_token_fails_without_network() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = TwitterClient::with_base_url(None, &config(), &server.uri()).unwrap();
    let err = client
        .fetch_recent_items(&channel("MacroMaven", true))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SourceError::MissingCredentials {
            platform: Platform::Twitter
        }
    ));
}
