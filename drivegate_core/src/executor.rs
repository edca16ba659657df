//! Authenticated Graph request execution with bounded retry.
//!
//! Every outbound call goes through [`GraphExecutor::execute`]. The executor
//! attaches the bearer token, classifies the response, and retries rate limits
//! (429), server errors (5xx) and transport failures up to the configured
//! budget. A 401 triggers exactly one re-authentication per call, outside of
//! that budget.

use reqwest::header::{HeaderMap, CONTENT_TYPE, LOCATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::auth::TokenProvider;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};

/// Cap on the backoff exponent so long budgets cannot overflow.
const MAX_BACKOFF_EXPONENT: u32 = 10;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// `2^attempt` backoff units, no jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.pow(attempt.min(MAX_BACKOFF_EXPONENT))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Relative to the Graph base URL; carries the bearer token.
    Path(String),
    /// Pre-authenticated URL handed out by Graph (monitor, upload session, download).
    Absolute(String),
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Bytes {
        data: Vec<u8>,
        content_type: String,
    },
}

#[derive(Debug, Clone)]
pub struct RemoteRequest {
    pub method: Method,
    pub target: Target,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl RemoteRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            target: Target::Path(path.into()),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn absolute(method: Method, url: impl Into<String>) -> Self {
        Self {
            target: Target::Absolute(url.into()),
            ..Self::new(method, String::new())
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, key: &str, value: impl ToString) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn bytes(mut self, data: Vec<u8>, content_type: &str) -> Self {
        self.body = RequestBody::Bytes {
            data,
            content_type: content_type.to_string(),
        };
        self
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.target, Target::Path(_))
    }
}

#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl RemoteResponse {
    pub fn is_empty(&self) -> bool {
        self.status == StatusCode::NO_CONTENT.as_u16() || self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Parsed JSON body; `{"success": true}` stands in for an empty body.
    pub fn json(&self) -> Result<Value> {
        if self.is_empty() {
            return Ok(json!({ "success": true }));
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    RateLimited,
    Unauthorized,
    ServerError,
    Fatal,
}

pub fn classify(status: StatusCode) -> Disposition {
    if status.is_success() || status.is_redirection() {
        Disposition::Success
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Disposition::RateLimited
    } else if status == StatusCode::UNAUTHORIZED {
        Disposition::Unauthorized
    } else if status.is_server_error() {
        Disposition::ServerError
    } else {
        Disposition::Fatal
    }
}

/// Whole seconds from `Retry-After`. HTTP-date values are ignored.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Prefer Graph's `error.message`, fall back to the raw body.
pub fn remote_error_message(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string())
}

pub struct GraphExecutor {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenProvider>,
    policy: RetryPolicy,
}

impl GraphExecutor {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        tokens: Arc<TokenProvider>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            policy,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let http = build_http_client(config.graph.request_timeout())?;
        let tokens = Arc::new(TokenProvider::from_config(http.clone(), config)?);
        let policy = RetryPolicy {
            max_retries: config.graph.max_retries,
            backoff_base: config.graph.backoff_base(),
        };
        Ok(Self::new(http, &config.graph.base_url, tokens, policy))
    }

    pub fn tokens(&self) -> &Arc<TokenProvider> {
        &self.tokens
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn execute(&self, request: RemoteRequest) -> Result<RemoteResponse> {
        self.execute_with_retries(request, self.policy.max_retries)
            .await
    }

    /// Convenience for callers that only want the JSON body.
    pub async fn execute_json(&self, request: RemoteRequest) -> Result<Value> {
        self.execute(request).await?.json()
    }

    pub async fn execute_with_retries(
        &self,
        request: RemoteRequest,
        max_retries: u32,
    ) -> Result<RemoteResponse> {
        let url = match &request.target {
            Target::Path(p) => format!("{}{}", self.base_url, p),
            Target::Absolute(u) => u.clone(),
        };
        let shown = loggable_url(&url);
        let mut attempt: u32 = 0;
        let mut reauthenticated = false;

        loop {
            let token = if request.is_authenticated() {
                Some(self.tokens.get_token().await?)
            } else {
                None
            };

            debug!(method = %request.method, url = %shown, attempt, "Graph request");
            let mut builder = self.http.request(request.method.clone(), &url);
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            for (k, v) in &request.headers {
                builder = builder.header(k.as_str(), v.as_str());
            }
            if let Some(t) = &token {
                builder = builder.bearer_auth(t.secret());
            }
            builder = match &request.body {
                RequestBody::Empty => builder,
                RequestBody::Json(v) => builder.json(v),
                RequestBody::Bytes { data, content_type } => builder
                    .header(CONTENT_TYPE, content_type.as_str())
                    .body(data.clone()),
            };

            let resp = match builder.send().await {
                Ok(r) => r,
                Err(e) => {
                    let e = e.without_url();
                    if attempt >= max_retries {
                        return Err(GatewayError::HttpRequest(e));
                    }
                    let delay = self.policy.backoff(attempt);
                    warn!(attempt, ?delay, url = %shown, "Graph request failed to send: {}", e);
                    sleep(delay).await;
                    attempt += 1;
                    continue;
                }
            };

            let status = resp.status();
            match classify(status) {
                Disposition::Success => {
                    let location = resp
                        .headers()
                        .get(LOCATION)
                        .and_then(|h| h.to_str().ok())
                        .map(str::to_string);
                    let body = resp
                        .bytes()
                        .await
                        .map_err(|e| GatewayError::HttpRequest(e.without_url()))?
                        .to_vec();
                    return Ok(RemoteResponse {
                        status: status.as_u16(),
                        location,
                        body,
                    });
                }
                Disposition::RateLimited => {
                    if attempt >= max_retries {
                        warn!(url = %shown, "Rate limit budget exhausted");
                        return Err(GatewayError::RateLimitExceeded {
                            attempts: attempt + 1,
                        });
                    }
                    let delay =
                        retry_after(resp.headers()).unwrap_or_else(|| self.policy.backoff(attempt));
                    warn!(attempt, ?delay, "Graph rate limited (429), backing off");
                    sleep(delay).await;
                    attempt += 1;
                }
                Disposition::Unauthorized if request.is_authenticated() => {
                    if reauthenticated {
                        let message = remote_error_message(&resp.bytes().await.unwrap_or_default());
                        warn!(url = %shown, "Graph rejected the refreshed token");
                        return Err(GatewayError::Authentication(format!(
                            "Access token rejected after re-authentication: {}",
                            message
                        )));
                    }
                    warn!("Graph returned 401, re-authenticating once");
                    self.tokens.invalidate().await;
                    reauthenticated = true;
                }
                Disposition::ServerError => {
                    if attempt >= max_retries {
                        let message = remote_error_message(&resp.bytes().await.unwrap_or_default());
                        return Err(GatewayError::TransientServer {
                            status: status.as_u16(),
                            attempts: attempt + 1,
                            message,
                        });
                    }
                    let delay = self.policy.backoff(attempt);
                    warn!(status = status.as_u16(), attempt, ?delay, "Graph server error, retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
                Disposition::Unauthorized | Disposition::Fatal => {
                    let message = remote_error_message(&resp.bytes().await.unwrap_or_default());
                    return Err(GatewayError::Remote {
                        status: status.as_u16(),
                        message,
                    });
                }
            }
        }
    }

    /// Raw GET on a pre-authenticated URL, e.g. `@microsoft.graph.downloadUrl`.
    pub async fn fetch_absolute(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .execute(RemoteRequest::absolute(Method::GET, url))
            .await?;
        Ok(resp.body)
    }
}

/// Shared client: finite timeout, and redirects surfaced to callers (monitor URLs answer 303).
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("drivegate/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(GatewayError::HttpRequest)
}

/// URL without query or fragment. Download and upload-session URLs carry
/// their credential in the query string.
fn loggable_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => "<unparseable url>".to_string(),
    }
}
