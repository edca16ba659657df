use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::fmt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{GatewayConfig, DEFAULT_AUTHORITY_URL, DEFAULT_GRAPH_SCOPE};
use crate::error::{GatewayError, Result};

/// Seconds shaved off the reported lifetime so a token is never used at the edge of expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Clone)]
pub enum Credentials {
    ClientCredentials {
        client_id: String,
        client_secret: String,
        tenant_id: String,
    },
    Bearer(String),
}

impl Credentials {
    /// True when the token acts on behalf of a signed-in user (`/me` is addressable).
    pub fn is_delegated(&self) -> bool {
        matches!(self, Credentials::Bearer(_))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ClientCredentials {
                client_id,
                tenant_id,
                ..
            } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .field("tenant_id", tenant_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Credentials::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_in: Option<i64>) -> Self {
        let expires_at =
            expires_in.map(|s| Utc::now() + ChronoDuration::seconds(s - EXPIRY_SKEW_SECS));
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.secret.is_empty() && self.expires_at.map_or(true, |at| at > now)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Acquires and caches the bearer token used for Graph calls.
///
/// Refresh is reactive: a token is fetched when none is cached, when the cached
/// one has passed its expiry, or after [`TokenProvider::invalidate`].
pub struct TokenProvider {
    http: reqwest::Client,
    credentials: Credentials,
    authority_url: String,
    scope: String,
    cached: RwLock<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            http,
            credentials,
            authority_url: DEFAULT_AUTHORITY_URL.to_string(),
            scope: DEFAULT_GRAPH_SCOPE.to_string(),
            cached: RwLock::new(None),
        }
    }

    pub fn from_config(http: reqwest::Client, config: &GatewayConfig) -> Result<Self> {
        Ok(Self::new(http, config.credentials()?)
            .with_authority(&config.graph.authority_url)
            .with_scope(&config.graph.scope))
    }

    pub fn with_authority(mut self, authority_url: &str) -> Self {
        self.authority_url = authority_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub async fn get_token(&self) -> Result<AccessToken> {
        if let Some(token) = self.cached.read().await.as_ref() {
            if token.is_usable_at(Utc::now()) {
                return Ok(token.clone());
            }
        }

        // The new token is complete before it becomes visible to other callers.
        let fresh = self.acquire().await?;
        *self.cached.write().await = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop the cached token so the next call re-authenticates.
    pub async fn invalidate(&self) {
        debug!("Discarding cached Graph access token");
        *self.cached.write().await = None;
    }

    async fn acquire(&self) -> Result<AccessToken> {
        let (client_id, client_secret, tenant_id) = match &self.credentials {
            Credentials::Bearer(token) => {
                if token.is_empty() {
                    return Err(GatewayError::Authentication(
                        "Supplied bearer token is empty".to_string(),
                    ));
                }
                return Ok(AccessToken::new(token.clone(), None));
            }
            Credentials::ClientCredentials {
                client_id,
                client_secret,
                tenant_id,
            } => (client_id, client_secret, tenant_id),
        };

        if client_id.is_empty() || client_secret.is_empty() || tenant_id.is_empty() {
            return Err(GatewayError::Authentication(
                "Missing Microsoft Graph API credentials".to_string(),
            ));
        }

        let url = format!("{}/{}/oauth2/v2.0/token", self.authority_url, tenant_id);
        let body = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let resp = self.http.post(&url).form(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&text)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or(text);
            warn!(status = status.as_u16(), "Token request rejected");
            return Err(GatewayError::Authentication(format!(
                "Authentication failed ({}): {}",
                status.as_u16(),
                detail
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            GatewayError::Authentication(format!("Malformed token response: {}", e))
        })?;
        info!(tenant = %tenant_id, "Acquired Graph access token");
        Ok(AccessToken::new(parsed.access_token, parsed.expires_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_tokens_are_not_usable() {
        let token = AccessToken::new("abc", Some(30));
        // 30s lifetime minus the skew is already in the past
        assert!(!token.is_usable_at(Utc::now()));

        let token = AccessToken::new("abc", Some(3600));
        assert!(token.is_usable_at(Utc::now()));

        assert!(AccessToken::new("abc", None).is_usable_at(Utc::now()));
        assert!(!AccessToken::new("", None).is_usable_at(Utc::now()));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds = Credentials::ClientCredentials {
            client_id: "id".into(),
            client_secret: "hunter2".into(),
            tenant_id: "t".into(),
        };
        let shown = format!("{:?} {:?}", creds, AccessToken::new("tok-123", None));
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("tok-123"));
    }

    #[tokio::test]
    async fn bearer_credentials_need_no_identity_call() {
        let provider =
            TokenProvider::new(reqwest::Client::new(), Credentials::Bearer("static".into()))
                .with_authority("http://127.0.0.1:9");
        let token = provider.get_token().await.unwrap();
        assert_eq!(token.secret(), "static");
        provider.invalidate().await;
        assert_eq!(provider.get_token().await.unwrap().secret(), "static");
    }
}
