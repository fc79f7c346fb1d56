//! MCP server implementation.
//!
//! Routes JSON-RPC methods to the fixed tool menu. Tool calls run
//! concurrently in HTTP mode; each invocation is independent and owns its
//! database connection and sandbox slot for its duration.

use std::io::{BufRead, Write};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use vetro_core::Transport;

use crate::error::McpError;
use crate::http_transport::HttpServer;
use crate::protocol::*;
use crate::state::ServerState;
use crate::tools;

/// The MCP server.
pub struct McpServer {
    state: Arc<ServerState>,
}

impl McpServer {
    /// Create a new MCP server over the given state.
    pub fn new(state: ServerState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub fn from_shared(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Start the server on the configured transport.
    pub async fn run(&self) -> Result<(), McpError> {
        match self.state.config.mcp.transport {
            Transport::Stdio => self.run_stdio().await,
            Transport::Http => self.run_http().await,
        }
    }

    /// Run the server with stdio transport.
    async fn run_stdio(&self) -> Result<(), McpError> {
        tracing::info!("starting MCP server with stdio transport");

        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut stdout_lock = stdout.lock();

        for line in stdin.lock().lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = serde_json::from_str(&line)?;
            let response = self.handle_request(request).await;
            let response_json = serde_json::to_string(&response)?;

            writeln!(stdout_lock, "{}", response_json)?;
            stdout_lock.flush()?;
        }

        Ok(())
    }

    /// Run the server with HTTP transport.
    pub async fn run_http(&self) -> Result<(), McpError> {
        let host = self.state.config.mcp.host.clone();
        let port = self.state.config.mcp.port;
        tracing::info!(%host, port, "starting MCP server with HTTP transport");

        let (request_tx, mut request_rx) =
            mpsc::channel::<(JsonRpcRequest, mpsc::Sender<JsonRpcResponse>)>(100);

        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some((request, response_tx)) = request_rx.recv().await {
                let state = state.clone();
                // One task per in-flight invocation; no ordering guarantee
                // between them.
                tokio::spawn(async move {
                    let server = McpServer::from_shared(state);
                    let response = server.handle_request(request).await;
                    let _ = response_tx.send(response).await;
                });
            }
        });

        let http_server = HttpServer::new(host, port, request_tx);
        http_server.run().await
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "initialized" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            "ping" => JsonRpcResponse::success(id, json!({})),
            "shutdown" => {
                tracing::info!("MCP server shutdown requested");
                JsonRpcResponse::success(id, json!(null))
            }
            _ => JsonRpcResponse::error(
                id,
                -32601,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let name = self
            .state
            .config
            .project
            .clone()
            .unwrap_or_else(|| "vetro".to_string());
        let result = json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {
                "name": name,
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {}
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools: Vec<_> = tools::definitions()
            .into_iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema,
                    "annotations": t.annotations
                })
            })
            .collect();

        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(id, -32602, format!("Invalid params: {}", e))
                }
            },
            None => return JsonRpcResponse::error(id, -32602, "Missing params"),
        };

        tracing::info!(tool = %params.name, "tool call");

        match tools::dispatch(&self.state, &params.name, params.arguments).await {
            Ok(payload) => JsonRpcResponse::success(
                id,
                json!({
                    "content": [{ "type": "json", "json": payload }],
                    "isError": false
                }),
            ),
            Err(err) => {
                tracing::warn!(tool = %params.name, kind = err.kind(), error = %err, "tool call failed");
                JsonRpcResponse::success(
                    id,
                    json!({
                        "content": [{ "type": "json", "json": err.payload() }],
                        "isError": true
                    }),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vetro_core::VetroConfig;

    fn test_server() -> McpServer {
        McpServer::new(ServerState::new(VetroConfig::default(), None))
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = test_server()
            .handle_request(request("initialize", None))
            .await;
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_list_tools_has_fixed_menu() {
        let response = test_server()
            .handle_request(request("tools/list", None))
            .await;
        let result = response.result.unwrap();
        assert_eq!(result["tools"].as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = test_server()
            .handle_request(request("resources/list", None))
            .await;
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_call_unknown_tool_is_tool_error() {
        let response = test_server()
            .handle_request(request(
                "tools/call",
                Some(json!({ "name": "nonexistent", "arguments": {} })),
            ))
            .await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(
            result["content"][0]["json"]["error"]["kind"],
            "invalid_arguments"
        );
    }

    #[tokio::test]
    async fn test_rejected_statement_reports_validation_kind() {
        let response = test_server()
            .handle_request(request(
                "tools/call",
                Some(json!({
                    "name": "query_database",
                    "arguments": { "query": "DROP TABLE projects; SELECT 1" }
                })),
            ))
            .await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        let error = &result["content"][0]["json"]["error"];
        assert_eq!(error["kind"], "validation_rejected");
        assert!(error["message"].as_str().unwrap().contains("DROP"));
    }

    #[tokio::test]
    async fn test_accepted_statement_without_database_reports_execution_kind() {
        let response = test_server()
            .handle_request(request(
                "tools/call",
                Some(json!({
                    "name": "query_database",
                    "arguments": { "query": "SELECT id, name FROM projects" }
                })),
            ))
            .await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(
            result["content"][0]["json"]["error"]["kind"],
            "execution_error"
        );
    }
}
