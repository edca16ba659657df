// src/lib.rs
pub mod auth;
pub mod bulk;
pub mod config;
pub mod drive;
pub mod error;
pub mod executor;
pub mod http;
pub mod mcp_server;
pub mod operation;
pub mod tools;
pub mod transport;

// Re-export types from rmcp that users of the library might need
pub use rmcp::model::{InitializeResult, ListToolsResult, ServerCapabilities, Tool};

pub use crate::auth::{Credentials, TokenProvider};
pub use crate::config::GatewayConfig;
pub use crate::drive::DriveClient;
pub use crate::error::{GatewayError, Result};
pub use crate::executor::{GraphExecutor, RemoteRequest, RemoteResponse, RetryPolicy};
pub use crate::operation::{Gateway, LogicalOperation, Operation, ToolOutcome};
