use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, Result};
use crate::operation::Gateway;
use crate::tools;
use rmcp::model::*;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

/// Tool server over the shared [`Gateway`].
pub struct McpServer {
    gateway: Arc<Gateway>,
}

impl McpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub fn handle_initialize(&self) -> InitializeResult {
        info!("MCP session initializing");
        InitializeResult {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities {
                tools: Some(Default::default()),
                ..Default::default()
            },
            server_info: Implementation {
                name: "drivegate".to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "OneDrive file management over Microsoft Graph: list, search, move, copy, \
                 upload, download and bulk operations."
                    .to_string(),
            ),
        }
    }

    pub fn handle_list_tools(&self) -> ListToolsResult {
        ListToolsResult {
            tools: tools::catalog(),
            next_cursor: None,
        }
    }

    pub async fn handle_call_tool(&self, name: &str, arguments: &Map<String, Value>) -> Result<Value> {
        let result = self.gateway.invoke(name, arguments).await?;
        Ok(json!({
            "content": [{ "type": "json", "json": result }]
        }))
    }
}

fn rpc_error(code: i64, message: impl Into<String>) -> Value {
    json!({ "code": code, "message": message.into() })
}

/// JSON-RPC 2.0 message handler for the MCP server
pub struct JsonRpcHandler {
    server: McpServer,
}

impl JsonRpcHandler {
    pub fn new(server: McpServer) -> Self {
        Self { server }
    }

    /// Handle a raw body. Unparseable input yields a `-32700` response with a null id.
    pub async fn handle_body(&self, body: &[u8]) -> Option<Value> {
        match serde_json::from_slice::<Value>(body) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                warn!("Failed to parse JSON-RPC request: {}", e);
                Some(json!({
                    "jsonrpc": "2.0",
                    "error": {
                        "code": PARSE_ERROR,
                        "message": "Parse error",
                        "data": e.to_string()
                    },
                    "id": null
                }))
            }
        }
    }

    /// Process one request. Notifications produce no response.
    pub async fn handle_request(&self, request: Value) -> Option<Value> {
        debug!("Handling JSON-RPC request: {:?}", request);

        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let version = request.get("jsonrpc").and_then(|v| v.as_str());
        let method = request.get("method").and_then(|m| m.as_str());

        let method = match (version, method) {
            (Some("2.0"), Some(m)) => m,
            _ => {
                return Some(json!({
                    "jsonrpc": "2.0",
                    "error": rpc_error(INVALID_REQUEST, "Invalid Request"),
                    "id": id,
                }))
            }
        };
        if method.starts_with("notifications/") {
            debug!(method, "Notification received");
            return None;
        }
        let params = request.get("params").cloned().unwrap_or_else(|| json!({}));

        let result = match method {
            "initialize" => serde_json::to_value(self.server.handle_initialize())
                .map_err(|e| GatewayError::SerdeJson(e).to_jsonrpc_error()),
            "ping" => Ok(json!({})),
            "tools/list" => serde_json::to_value(self.server.handle_list_tools())
                .map_err(|e| GatewayError::SerdeJson(e).to_jsonrpc_error()),
            "tools/call" => match params.get("name").and_then(|n| n.as_str()) {
                Some(name) => {
                    let arguments = params
                        .get("arguments")
                        .and_then(|a| a.as_object())
                        .cloned()
                        .unwrap_or_default();
                    self.server
                        .handle_call_tool(name, &arguments)
                        .await
                        .map_err(|e| e.to_jsonrpc_error())
                }
                None => Err(rpc_error(INVALID_PARAMS, "Missing 'name' parameter")),
            },
            other => Err(rpc_error(METHOD_NOT_FOUND, format!("Method not found: {}", other))),
        };

        Some(match result {
            Ok(result) => json!({
                "jsonrpc": "2.0",
                "result": result,
                "id": id,
            }),
            Err(error) => json!({
                "jsonrpc": "2.0",
                "error": error,
                "id": id,
            }),
        })
    }
}

/// HTTP status for a JSON-RPC response carried over `/mcp`.
pub fn http_status_for(response: &Value) -> u16 {
    match response
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_i64())
    {
        None => 200,
        Some(PARSE_ERROR) | Some(INVALID_REQUEST) | Some(INVALID_PARAMS) => 400,
        Some(METHOD_NOT_FOUND) => 404,
        Some(_) => 500,
    }
}
