// src/error.rs
use serde_json::json;

/// JSON-RPC code used for failures raised while executing a tool.
pub const EXECUTION_ERROR_CODE: i64 = -32000;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("Graph server error {status} after {attempts} attempts: {message}")]
    TransientServer {
        status: u16,
        attempts: u32,
        message: String,
    },

    #[error("Graph request failed ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Invalid arguments: {0}")]
    Validation(String),

    #[error("Unknown tool: {0}")]
    UnknownOperation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn code_str(&self) -> &'static str {
        match self {
            GatewayError::Authentication(_) => "auth_failed",
            GatewayError::RateLimitExceeded { .. } => "rate_limited",
            GatewayError::TransientServer { .. } => "upstream_unavailable",
            GatewayError::Remote { status: 404, .. } => "not_found",
            GatewayError::Remote { .. } => "upstream_error",
            GatewayError::HttpRequest(_) => "upstream_error",
            GatewayError::Validation(_) => "invalid_params",
            GatewayError::UnknownOperation(_) => "tool_not_found",
            GatewayError::Config(_) => "config_error",
            GatewayError::SerdeJson(_) => "parse_error",
            GatewayError::Io(_) => "internal_error",
        }
    }

    /// Status code reported by Graph, when the failure came from a response.
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            GatewayError::Remote { status, .. } | GatewayError::TransientServer { status, .. } => {
                Some(*status)
            }
            GatewayError::RateLimitExceeded { .. } => Some(429),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.remote_status() == Some(404)
    }

    pub fn jsonrpc_code(&self) -> i64 {
        match self {
            GatewayError::Validation(_) => -32602,
            GatewayError::UnknownOperation(_) => -32601,
            _ => EXECUTION_ERROR_CODE,
        }
    }

    pub fn to_jsonrpc_error(&self) -> serde_json::Value {
        json!({
            "code": self.jsonrpc_code(),
            "message": self.to_string(),
            "data": { "kind": self.code_str() },
        })
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
