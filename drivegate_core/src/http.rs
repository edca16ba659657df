//! REST and JSON-RPC surfaces over HTTP.
//!
//! Routes:
//! - `GET  /`, `/health`, `/docs`: public
//! - `GET  /tools`: tool names and descriptions
//! - `POST /invoke/:tool`: flat argument map in, `{success, data|error}` out
//! - `POST /mcp`: JSON-RPC 2.0
//!
//! Everything except the public routes requires the `X-API-Key` header or
//! query parameter when a key is configured.

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::config::API_KEY_NAME;
use crate::error::Result;
use crate::mcp_server::{http_status_for, JsonRpcHandler, McpServer};
use crate::operation::{Gateway, Operation, ToolOutcome};

const PUBLIC_PATHS: [&str; 3] = ["/", "/health", "/docs"];

#[derive(Clone)]
pub struct AppState {
    gateway: Arc<Gateway>,
    rpc: Arc<JsonRpcHandler>,
    api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(gateway: Arc<Gateway>, api_key: Option<String>) -> Self {
        let rpc = Arc::new(JsonRpcHandler::new(McpServer::new(gateway.clone())));
        if api_key.is_none() {
            warn!("No API key configured; the HTTP gateway accepts unauthenticated requests");
        }
        Self {
            gateway,
            rpc,
            api_key: api_key.map(Arc::from),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/docs", get(docs))
        .route("/tools", get(list_tools))
        .route("/invoke/:tool", post(invoke))
        .route("/mcp", post(mcp))
        .layer(middleware::from_fn_with_state(state.clone(), api_key_auth))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Gateway listening on http://{}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Gateway stopped");
    Ok(())
}

fn provided_key(request: &Request) -> Option<String> {
    if let Some(v) = request
        .headers()
        .get(API_KEY_NAME)
        .and_then(|v| v.to_str().ok())
    {
        return Some(v.to_string());
    }
    request.uri().query().and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(k, _)| k == API_KEY_NAME)
            .map(|(_, v)| v.into_owned())
    })
}

fn keys_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

async fn api_key_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    match provided_key(&request) {
        Some(key) if keys_match(&key, expected) => next.run(request).await,
        Some(key) => {
            warn!(
                path = %request.uri().path(),
                provided_len = key.len(),
                expected_len = expected.len(),
                "Rejected request: API key mismatch"
            );
            unauthorized()
        }
        None => {
            warn!(path = %request.uri().path(), "Rejected request: no API key");
            unauthorized()
        }
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "Unauthorized: Invalid API Key").into_response()
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "drivegate",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "OneDrive operations over Microsoft Graph",
        "endpoints": {
            "health": "/health",
            "docs": "/docs",
            "tools": "/tools",
            "invoke": "/invoke/{tool}",
            "mcp": "/mcp"
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn docs() -> Html<String> {
    let rows: String = Operation::ALL
        .iter()
        .map(|op| {
            format!(
                "<tr><td><code>POST /invoke/{}</code></td><td>{}</td></tr>\n",
                op.as_str(),
                op.description()
            )
        })
        .collect();
    Html(format!(
        "<!doctype html><html><head><title>drivegate</title></head><body>\
         <h1>drivegate {}</h1>\
         <p>Send a JSON object of arguments. Authenticate with the <code>{}</code> header.</p>\
         <table>\n{}</table>\
         <p>JSON-RPC 2.0: <code>POST /mcp</code> with <code>tools/list</code> and <code>tools/call</code>.</p>\
         </body></html>",
        env!("CARGO_PKG_VERSION"),
        API_KEY_NAME,
        rows
    ))
}

async fn list_tools() -> Json<Value> {
    let tools: Vec<Value> = Operation::ALL
        .iter()
        .map(|op| json!({ "name": op.as_str(), "description": op.description() }))
        .collect();
    Json(json!({ "tools": tools }))
}

/// Empty bodies count as `{}`.
fn parse_arguments(body: &[u8]) -> std::result::Result<Map<String, Value>, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("Request body must be a JSON object".to_string()),
        Err(e) => Err(format!("Invalid JSON body: {}", e)),
    }
}

async fn invoke(
    State(state): State<AppState>,
    Path(tool): Path<String>,
    body: Bytes,
) -> (StatusCode, Json<ToolOutcome>) {
    if let Err(e) = tool.parse::<Operation>() {
        return (StatusCode::BAD_REQUEST, Json(ToolOutcome::failed(e.to_string())));
    }
    let args = match parse_arguments(&body) {
        Ok(args) => args,
        Err(message) => return (StatusCode::BAD_REQUEST, Json(ToolOutcome::failed(message))),
    };
    debug!(tool = %tool, "REST invocation");
    let outcome = state.gateway.invoke_rendered(&tool, &args).await;
    (StatusCode::OK, Json(outcome))
}

async fn mcp(State(state): State<AppState>, body: Bytes) -> Response {
    match state.rpc.handle_body(&body).await {
        None => StatusCode::ACCEPTED.into_response(),
        Some(response) => {
            let status = StatusCode::from_u16(http_status_for(&response))
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(response)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_comparison_is_exact() {
        assert!(keys_match("s3cret", "s3cret"));
        assert!(!keys_match("s3cres", "s3cret"));
        assert!(!keys_match("s3cret-longer", "s3cret"));
        assert!(!keys_match("", "s3cret"));
    }

    #[test]
    fn empty_body_is_empty_argument_map() {
        assert!(parse_arguments(b"").unwrap().is_empty());
        assert!(parse_arguments(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(parse_arguments(b"[1,2]").is_err());
        assert!(parse_arguments(b"{not json").unwrap_err().starts_with("Invalid JSON body"));
        let args = parse_arguments(br#"{"file_id":"abc"}"#).unwrap();
        assert_eq!(args["file_id"], "abc");
    }
}
