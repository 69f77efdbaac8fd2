//! Integration tests for `TwitchSource` using wiremock HTTP mocks.

use chrono::NaiveDate;
use reachdb_core::{
    CollectContext, ContentItem, DateRange, Platform, PlatformSource, Show, SourceErrorKind,
    TwitchCredentials,
};
use reachdb_platforms::TwitchSource;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_source(server: &MockServer, credentials: &TwitchCredentials) -> TwitchSource {
    TwitchSource::with_base_urls(
        credentials,
        5,
        "reachdb-test/0.1",
        &format!("{}/helix", server.uri()),
        &server.uri(),
    )
    .expect("client construction should not fail")
}

fn with_token() -> TwitchCredentials {
    TwitchCredentials {
        client_id: Some("cid".to_string()),
        client_secret: None,
        access_token: Some("tok".to_string()),
    }
}

fn with_secret() -> TwitchCredentials {
    TwitchCredentials {
        client_id: Some("cid".to_string()),
        client_secret: Some("shh".to_string()),
        access_token: None,
    }
}

fn channel() -> Show {
    Show {
        platform: Platform::Twitch,
        platform_id: "141981764".to_string(),
        name: "SoyPete01".to_string(),
        description: None,
        author: Some("soypete01".to_string()),
        categories: vec![],
        language: None,
        raw_data: json!({}),
    }
}

fn vod(id: &str) -> ContentItem {
    ContentItem {
        platform_item_id: id.to_string(),
        title: "stream".to_string(),
        description: None,
        content_type: Some("twitch_archive".to_string()),
        url: None,
        duration_seconds: None,
        published_at: None,
        season_number: None,
        episode_number: None,
        raw_data: json!({}),
    }
}

fn window() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2026, 9, 18).unwrap(),
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
    )
}

#[tokio::test]
async fn fetch_show_sends_client_id_and_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/helix/users"))
        .and(query_param("login", "soypete01"))
        .and(header("client-id", "cid"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "141981764",
                "login": "soypete01",
                "display_name": "SoyPete01",
                "description": "streams",
                "broadcaster_type": "affiliate"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = test_source(&server, &with_token());
    let show = source
        .fetch_show(&CollectContext::background(), "soypete01")
        .await
        .unwrap();
    assert_eq!(show.platform_id, "141981764");
    assert_eq!(show.name, "SoyPete01");
}

#[tokio::test]
async fn unknown_user_is_a_format_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/helix/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let source = test_source(&server, &with_token());
    let err = source
        .fetch_show(&CollectContext::background(), "ghost")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SourceErrorKind::Format);
}

#[tokio::test]
async fn missing_token_is_an_authentication_error_without_a_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(0)
        .mount(&server)
        .await;

    let source = test_source(&server, &with_secret());
    let err = source
        .fetch_show(&CollectContext::background(), "soypete01")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SourceErrorKind::Authentication);
}

#[tokio::test]
async fn authenticate_exchanges_client_credentials_for_a_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(query_param("client_id", "cid"))
        .and(query_param("client_secret", "shh"))
        .and(query_param("grant_type", "client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "expires_in": 5_000_000,
            "token_type": "bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/helix/channels/followers"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 1234, "data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let source = test_source(&server, &with_secret());
    assert!(source.needs_token().await);

    let ctx = CollectContext::background();
    source.authenticate(&ctx).await.expect("token exchange");
    assert!(!source.needs_token().await);

    let metrics = source
        .fetch_aggregate_metrics(&ctx, &channel(), window())
        .await
        .unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].followers_total, Some(1234));
    assert_eq!(
        metrics[0].metric_date,
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    );
}

#[tokio::test]
async fn rejected_credentials_surface_as_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "invalid client"})))
        .mount(&server)
        .await;

    let source = test_source(&server, &with_secret());
    let err = source
        .authenticate(&CollectContext::background())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SourceErrorKind::Authentication);
    assert!(source.needs_token().await);
}

#[tokio::test]
async fn videos_are_listed_with_parsed_durations() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/helix/videos"))
        .and(query_param("user_id", "141981764"))
        .and(query_param("first", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "v1", "title": "one", "duration": "1h0m0s", "type": "archive",
                 "created_at": "2026-10-10T00:00:00Z"},
                {"id": "v2", "title": "two", "duration": "12m30s", "type": "highlight",
                 "created_at": "2026-10-11T00:00:00Z"}
            ]
        })))
        .mount(&server)
        .await;

    let source = test_source(&server, &with_token());
    let items = source
        .fetch_items(&CollectContext::background(), &channel())
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].duration_seconds, Some(3600));
    assert_eq!(items[1].duration_seconds, Some(750));
    assert_eq!(items[1].content_type.as_deref(), Some("twitch_highlight"));
}

#[tokio::test]
async fn item_metrics_are_one_snapshot_on_the_last_window_day() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/helix/videos"))
        .and(query_param("id", "v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "v1", "view_count": 88}]
        })))
        .mount(&server)
        .await;

    let source = test_source(&server, &with_token());
    let metrics = source
        .fetch_item_metrics(&CollectContext::background(), &vod("v1"), window())
        .await
        .unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].views, Some(88));
    assert_eq!(
        metrics[0].metric_date,
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    );
}

#[tokio::test]
async fn comments_are_an_empty_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let source = test_source(&server, &with_token());
    let comments = source
        .fetch_comments(&CollectContext::background(), &vod("v1"))
        .await
        .expect("unsupported comments must not be an error");
    assert!(comments.is_empty());
}
