#![allow(dead_code)]

use drivegate_core::{DriveClient, Gateway, GatewayConfig, GraphExecutor};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "tenant";
pub const DRIVE: &str = "/drives/d1";

/// Graph and the identity endpoint both point at the mock server; backoff is 1ms.
pub fn config_for(server: &MockServer) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.graph.base_url = server.uri();
    config.graph.authority_url = server.uri();
    config.graph.backoff_base_ms = 1;
    config.graph.request_timeout_secs = 5;
    config.graph.drive_id = Some("d1".to_string());
    config.credentials.client_id = Some("client".to_string());
    config.credentials.client_secret = Some("secret".to_string());
    config.credentials.tenant_id = Some(TENANT.to_string());
    config
}

pub async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/{}/oauth2/v2.0/token", TENANT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3600,
            "access_token": "tok-1"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub fn executor(server: &MockServer) -> Arc<GraphExecutor> {
    Arc::new(GraphExecutor::from_config(&config_for(server)).unwrap())
}

pub fn drive_client(server: &MockServer) -> DriveClient {
    DriveClient::new(executor(server)).with_drive_id(Some("d1".to_string()))
}

pub fn gateway(server: &MockServer) -> Gateway {
    Gateway::from_config(&config_for(server)).unwrap()
}

pub fn args(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// Requests that reached Graph, excluding the token endpoint.
pub async fn graph_requests(server: &MockServer) -> Vec<wiremock::Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| !r.url.path().ends_with("/oauth2/v2.0/token"))
        .collect()
}
