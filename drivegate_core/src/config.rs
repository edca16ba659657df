use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::Credentials;
use crate::error::{GatewayError, Result};

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
pub const API_KEY_NAME: &str = "X-API-Key";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub graph: GraphSettings,
    pub credentials: CredentialSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub base_url: String,
    pub authority_url: String,
    pub scope: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    /// Unit multiplied by `2^attempt` between retries.
    pub backoff_base_ms: u64,
    pub drive_id: Option<String>,
    pub user_id: Option<String>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            authority_url: DEFAULT_AUTHORITY_URL.to_string(),
            scope: DEFAULT_GRAPH_SCOPE.to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 1_000,
            drive_id: None,
            user_id: None,
        }
    }
}

impl GraphSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub tenant_id: Option<String>,
    /// Externally supplied bearer token; takes precedence over client credentials.
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_key: None,
        }
    }
}

impl GatewayConfig {
    /// Defaults, then the TOML file, then `.env`, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };

        match dotenvy::dotenv() {
            Ok(p) => debug!("Loaded environment from {}", p.display()),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Ignoring unreadable .env file: {}", e),
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw)
            .map_err(|e| GatewayError::Config(format!("invalid {}: {}", path.display(), e)))
    }

    /// Overlay values found through `lookup`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CLIENT_ID") {
            self.credentials.client_id = Some(v);
        }
        if let Some(v) = get("CLIENT_SECRET") {
            self.credentials.client_secret = Some(v);
        }
        if let Some(v) = get("TENANT_ID") {
            self.credentials.tenant_id = Some(v);
        }
        if let Some(v) = get("GRAPH_ACCESS_TOKEN") {
            self.credentials.access_token = Some(v);
        }
        if let Some(v) = get("GRAPH_BASE_URL") {
            self.graph.base_url = v;
        }
        if let Some(v) = get("GRAPH_AUTHORITY_URL") {
            self.graph.authority_url = v;
        }
        if let Some(v) = get("GRAPH_DRIVE_ID") {
            self.graph.drive_id = Some(v);
        }
        if let Some(v) = get("GRAPH_USER_ID") {
            self.graph.user_id = Some(v);
        }
        if let Some(v) = get("GRAPH_MAX_RETRIES") {
            match v.parse() {
                Ok(n) => self.graph.max_retries = n,
                Err(_) => warn!("GRAPH_MAX_RETRIES is not a number: {}", v),
            }
        }
        if let Some(v) = get("GRAPH_TIMEOUT_SECS") {
            match v.parse() {
                Ok(n) => self.graph.request_timeout_secs = n,
                Err(_) => warn!("GRAPH_TIMEOUT_SECS is not a number: {}", v),
            }
        }
        if let Some(v) = get("HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("PORT") {
            match v.parse() {
                Ok(n) => self.server.port = n,
                Err(_) => warn!("PORT is not a valid port: {}", v),
            }
        }
        if let Some(v) = get("MCP_API_KEY") {
            self.server.api_key = Some(v);
        }
    }

    /// Names of the credential variables still missing.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        if self.credentials.access_token.is_some() {
            return Vec::new();
        }
        let mut missing = Vec::new();
        if self.credentials.client_id.is_none() {
            missing.push("CLIENT_ID");
        }
        if self.credentials.client_secret.is_none() {
            missing.push("CLIENT_SECRET");
        }
        if self.credentials.tenant_id.is_none() {
            missing.push("TENANT_ID");
        }
        missing
    }

    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_credentials();
        if !missing.is_empty() {
            return Err(GatewayError::Config(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }
        url::Url::parse(&self.graph.base_url)
            .map_err(|e| GatewayError::Config(format!("GRAPH_BASE_URL: {}", e)))?;
        url::Url::parse(&self.graph.authority_url)
            .map_err(|e| GatewayError::Config(format!("GRAPH_AUTHORITY_URL: {}", e)))?;
        Ok(())
    }

    pub fn credentials(&self) -> Result<Credentials> {
        self.validate()?;
        let c = &self.credentials;
        if let Some(token) = &c.access_token {
            return Ok(Credentials::Bearer(token.clone()));
        }
        match (&c.client_id, &c.client_secret, &c.tenant_id) {
            (Some(id), Some(secret), Some(tenant)) => Ok(Credentials::ClientCredentials {
                client_id: id.clone(),
                client_secret: secret.clone(),
                tenant_id: tenant.clone(),
            }),
            _ => Err(GatewayError::Config(
                "Missing Microsoft Graph API credentials".to_string(),
            )),
        }
    }
}

/// `~/.config/drivegate/config.toml` (Unix) or `%APPDATA%/drivegate/config.toml` (Windows).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|p| p.join(".config")))
        .map(|base| base.join("drivegate").join("config.toml"))
}

pub const CONFIG_HELP: &str = "\
Required environment variables:
  CLIENT_ID         Azure app registration client ID
  CLIENT_SECRET     Azure app registration client secret
  TENANT_ID         Azure tenant ID
  (or GRAPH_ACCESS_TOKEN with a pre-acquired bearer token)

Optional:
  GRAPH_DRIVE_ID    Fixed drive to operate on (skips drive lookup)
  GRAPH_USER_ID     Default user whose drive is used
  MCP_API_KEY       Shared secret expected in the X-API-Key header
  HOST / PORT       Listen address (default 0.0.0.0:8000)";
