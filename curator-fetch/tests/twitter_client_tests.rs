//! HTTP-level tests of the REST client against a mock server.

use std::time::Duration;

use curator_core::{ApiEndpoint, CurationSelectors, PageOptions, PublicationId, Token, TokenKind};
use curator_fetch::{ApiError, PublicationApi, RetryStrategy, TwitterClient};
use serde_json::json;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> TwitterClient {
    TwitterClient::new(&format!("{}/1.1/", server.uri()), Duration::from_secs(5))
        .unwrap()
        .with_consumer("consumer-key", "consumer-secret")
        .with_retry(RetryStrategy::new(3).with_base_delay(0))
}

fn token() -> Token {
    Token::new("12345678-access", "access-secret")
}

#[tokio::test]
async fn test_fetch_page_parses_timeline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/statuses/user_timeline.json"))
        .and(query_param("screen_name", "pierrec"))
        .and(query_param("max_id", "99"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id_str": "1405555555555555555",
                "full_text": "newest",
                "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                "user": {"screen_name": "pierrec"}
            },
            {
                "id_str": "98",
                "text": "oldest",
                "created_at": "Tue Oct 09 20:19:24 +0000 2018",
                "user": {"screen_name": "pierrec"}
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let options = PageOptions::unbounded(200).with_max_id(PublicationId::from(99));
    let page = client(&server)
        .fetch_page(&token(), &CurationSelectors::new("pierrec"), &options)
        .await
        .unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id.as_str(), "1405555555555555555");
    assert_eq!(page[0].text, "newest");
    assert_eq!(page[1].text, "oldest");
    assert!(page[1].created_at.is_some());
}

#[tokio::test]
async fn test_likes_use_favorites_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/favorites/list.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let selectors = CurationSelectors::new("pierrec").with_likes(true);
    let page = client(&server)
        .fetch_page(&token(), &selectors, &PageOptions::default())
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_rate_limited_error_carries_reset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/statuses/user_timeline.json"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-rate-limit-reset", "1700000000")
                .set_body_json(json!({"errors": [{"code": 88, "message": "Rate limit exceeded"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_page(&token(), &CurationSelectors::new("pierrec"), &PageOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_rate_limited());
    assert_eq!(err.reset_at().unwrap().timestamp(), 1_700_000_000);
}

#[tokio::test]
async fn test_suspended_and_not_found_members() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/users/show.json"))
        .and(query_param("screen_name", "gone"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"errors": [{"code": 63, "message": "User has been suspended."}]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1.1/users/show.json"))
        .and(query_param("screen_name", "nobody"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"errors": [{"code": 50, "message": "User not found."}]})),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(matches!(
        client.fetch_member_profile(&token(), "gone").await,
        Err(ApiError::Suspended(_))
    ));
    assert!(matches!(
        client.fetch_member_profile(&token(), "nobody").await,
        Err(ApiError::MemberNotFound(_))
    ));
}

#[tokio::test]
async fn test_protected_timeline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/statuses/user_timeline.json"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"request": "/1.1/statuses/user_timeline.json", "error": "Not authorized."})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_page(&token(), &CurationSelectors::new("locked"), &PageOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Protected(_)));
}

#[tokio::test]
async fn test_over_capacity_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/users/show.json"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(json!({"errors": [{"code": 130, "message": "Over capacity"}]})),
        )
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_member_profile(&token(), "pierrec")
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_profile_and_rate_limit_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/users/show.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_str": "42",
            "screen_name": "pierrec",
            "statuses_count": 5000,
            "favourites_count": 12,
            "protected": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1.1/application/rate_limit_status.json"))
        .and(query_param("resources", "statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": {
                "statuses": {
                    "/statuses/user_timeline": {"limit": 900, "remaining": 12, "reset": 1_700_000_000}
                }
            }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let profile = client.fetch_member_profile(&token(), "pierrec").await.unwrap();
    assert_eq!(profile.statuses_count, 5000);

    let status = client
        .check_rate_limit(&token(), ApiEndpoint::UserTimeline)
        .await
        .unwrap();
    assert_eq!(status.remaining, 12);
    assert!(status.is_nearly_exhausted());
}

#[tokio::test]
async fn test_application_token_uses_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/favorites/list.json"))
        .and(wiremock::matchers::header("authorization", "Bearer app-bearer-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let token = Token::new("app-bearer-token", "unused").with_kind(TokenKind::Application);
    let selectors = CurationSelectors::new("pierrec").with_likes(true);
    client(&server)
        .fetch_page(&token, &selectors, &PageOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_user_token_without_consumer_is_rejected_locally() {
    let server = MockServer::start().await;
    let client = TwitterClient::new(&server.uri(), Duration::from_secs(5)).unwrap();

    let err = client
        .fetch_member_profile(&token(), "pierrec")
        .await
        .unwrap_err();
    assert!(err.is_bad_authentication());
}
