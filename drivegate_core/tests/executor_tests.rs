mod common;

use common::*;
use drivegate_core::{GatewayError, RemoteRequest};
use reqwest::Method;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn attaches_bearer_token_and_caches_it() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/drives/d1/items/a"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "a"})))
        .expect(2)
        .mount(&server)
        .await;

    let exec = executor(&server);
    for _ in 0..2 {
        let body = exec
            .execute_json(RemoteRequest::get("/drives/d1/items/a"))
            .await
            .unwrap();
        assert_eq!(body["id"], "a");
    }
}

#[tokio::test]
async fn retries_rate_limit_honoring_retry_after() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/drives/d1/items/a"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drives/d1/items/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "a"})))
        .expect(1)
        .mount(&server)
        .await;

    let body = executor(&server)
        .execute_json(RemoteRequest::get("/drives/d1/items/a"))
        .await
        .unwrap();
    assert_eq!(body["id"], "a");
}

#[tokio::test]
async fn rate_limit_exhaustion_fails_after_budget() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/drives/d1/items/a"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let err = executor(&server)
        .execute(RemoteRequest::get("/drives/d1/items/a"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::RateLimitExceeded { attempts: 4 }));
}

#[tokio::test]
async fn per_call_retry_budget_overrides_policy() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/drives/d1/items/a"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let err = executor(&server)
        .execute_with_retries(RemoteRequest::get("/drives/d1/items/a"), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::RateLimitExceeded { attempts: 1 }));
}

#[tokio::test]
async fn single_unauthorized_triggers_one_reauthentication() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/drives/d1/items/a"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drives/d1/items/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "a"})))
        .expect(1)
        .mount(&server)
        .await;

    let body = executor(&server)
        .execute_json(RemoteRequest::get("/drives/d1/items/a"))
        .await
        .unwrap();
    assert_eq!(body["id"], "a");
}

#[tokio::test]
async fn second_unauthorized_is_fatal() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/drives/d1/items/a"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": "InvalidAuthenticationToken", "message": "Access token is empty."}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let err = executor(&server)
        .execute(RemoteRequest::get("/drives/d1/items/a"))
        .await
        .unwrap_err();
    match err {
        GatewayError::Authentication(message) => assert!(message.contains("Access token is empty.")),
        other => panic!("expected authentication error, got {:?}", other),
    }
}

#[tokio::test]
async fn server_errors_exhaust_into_transient_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/drives/d1/items/a"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(4)
        .mount(&server)
        .await;

    let err = executor(&server)
        .execute(RemoteRequest::get("/drives/d1/items/a"))
        .await
        .unwrap_err();
    match err {
        GatewayError::TransientServer {
            status,
            attempts,
            message,
        } => {
            assert_eq!(status, 503);
            assert_eq!(attempts, 4);
            assert_eq!(message, "unavailable");
        }
        other => panic!("expected transient server error, got {:?}", other),
    }
}

#[tokio::test]
async fn client_errors_fail_immediately_with_graph_message() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/drives/d1/items/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "itemNotFound", "message": "The resource could not be found."}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = executor(&server)
        .execute(RemoteRequest::get("/drives/d1/items/missing"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("The resource could not be found."));
}

#[tokio::test]
async fn no_content_yields_success_marker() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("DELETE"))
        .and(path("/drives/d1/items/a"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let body = executor(&server)
        .execute_json(RemoteRequest::delete("/drives/d1/items/a"))
        .await
        .unwrap();
    assert_eq!(body, json!({"success": true}));
}

#[tokio::test]
async fn rejected_credentials_surface_as_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = executor(&server)
        .execute(RemoteRequest::get("/drives/d1/items/a"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Authentication(ref m) if m.contains("AADSTS7000215")));
    assert!(graph_requests(&server).await.is_empty());
}

#[tokio::test]
async fn absolute_targets_are_sent_without_token() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;
    Mock::given(method("GET"))
        .and(path("/monitor/op-1"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"status": "inProgress"})))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/monitor/op-1", server.uri());
    let resp = executor(&server)
        .execute(RemoteRequest::absolute(Method::GET, url))
        .await
        .unwrap();
    assert_eq!(resp.status, 202);

    let requests = graph_requests(&server).await;
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}
