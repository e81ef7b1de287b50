// MCP tool server
// Newline-delimited JSON-RPC 2.0 over stdio

pub mod protocol;
pub mod tools;

use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Settings;
use protocol::{
    JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION,
    METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use tools::ToolRouter;

/// Name reported in the `initialize` handshake
pub const SERVER_NAME: &str = "deployment-queue";

pub struct McpServer {
    tools: ToolRouter,
}

impl McpServer {
    pub fn new(settings: Settings) -> Self {
        Self {
            tools: ToolRouter::new(settings),
        }
    }

    /// Serve requests until `reader` reaches EOF
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("MCP server ready on stdio");

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(line).await {
                let mut payload = serde_json::to_vec(&response).map_err(std::io::Error::other)?;
                payload.push(b'\n');
                writer.write_all(&payload).await?;
                writer.flush().await?;
            }
        }

        tracing::info!("MCP client closed the stream");
        Ok(())
    }

    /// Handle one raw message. Notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable JSON-RPC message");
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    id,
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                ))
            }
        };

        if !request.jsonrpc.is_empty() && request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                id,
                INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            ));
        }

        if request.is_notification() {
            tracing::debug!(method = %request.method, "Notification");
            return None;
        }

        Some(self.handle_request(request).await)
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.unwrap_or(Value::Null);
        tracing::debug!(method = %request.method, "Request");

        match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": tools::definitions() })),
            "tools/call" => {
                let params = request.params.unwrap_or(Value::Null);
                let Some(name) = params.get("name").and_then(Value::as_str) else {
                    return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing tool name");
                };
                let arguments = match params.get("arguments") {
                    Some(Value::Object(map)) => map.clone(),
                    None | Some(Value::Null) => Map::new(),
                    Some(_) => {
                        return JsonRpcResponse::error(
                            id,
                            INVALID_PARAMS,
                            "Tool arguments must be an object",
                        )
                    }
                };

                let result = self.tools.call(name, &arguments).await;
                match serde_json::to_value(result) {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(e) => JsonRpcResponse::error(id, INVALID_PARAMS, e.to_string()),
                }
            }
            other => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        }
    }
}
