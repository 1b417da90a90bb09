// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::protocol::{
    CallToolParams, INVALID_PARAMS, INVALID_REQUEST, JsonRpcRequest, JsonRpcResponse,
    METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::error::ToolError;
use crate::tools::{DEFAULT_NAMESPACE, DEFAULT_RESOURCE_TYPE, DiagTools, GetRequest, ListRequest};

const LIST_TOOL: &str = "kubernetes_list";
const GET_TOOL: &str = "kubernetes_get";

/// Dispatches protocol messages to the diagnostic tools
pub struct McpHandler {
    tools: Arc<DiagTools>,
    server_name: String,
    call_timeout: Duration,
}

impl McpHandler {
    pub fn new(tools: Arc<DiagTools>, server_name: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            tools,
            server_name: server_name.into(),
            call_timeout,
        }
    }

    /// Handle one raw message; notifications produce no response
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
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
                return Some(JsonRpcResponse::failure(
                    id,
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                ));
            }
        };

        self.handle(request).await
    }

    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::failure(
                request.id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "Invalid request: jsonrpc must be \"2.0\"",
            ));
        }

        debug!(method = %request.method, id = ?request.id, "Handling request");

        if request.is_notification() {
            // initialized, cancelled: nothing to answer
            return None;
        }
        let id = request.id.unwrap_or(Value::Null);

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool_descriptions() })),
            "tools/call" => self.call_tool(request.params).await,
            other => Err((METHOD_NOT_FOUND, format!("Method not found: {}", other))),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err((code, message)) => JsonRpcResponse::failure(id, code, message),
        })
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": self.server_name,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, (i64, String)> {
        let params: CallToolParams = parse_params(params)?;
        let arguments = params.arguments.unwrap_or_else(|| json!({}));

        let call = self.dispatch(&params.name, arguments);

        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    tool = %params.name,
                    timeout_secs = self.call_timeout.as_secs(),
                    "Tool call timed out"
                );
                Ok(tool_result::<Value>(Err(ToolError::new(format!(
                    "{} timed out after {} seconds",
                    params.name,
                    self.call_timeout.as_secs()
                )))))
            }
        }
    }

    async fn dispatch(&self, tool: &str, arguments: Value) -> Result<Value, (i64, String)> {
        match tool {
            LIST_TOOL => {
                let request: ListRequest = parse_params(Some(arguments))?;
                Ok(tool_result(self.tools.kubernetes_list(&request).await))
            }
            GET_TOOL => {
                let request: GetRequest = parse_params(Some(arguments))?;
                Ok(tool_result(self.tools.kubernetes_get(&request).await))
            }
            other => Err((INVALID_PARAMS, format!("Unknown tool: {}", other))),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, (i64, String)> {
    serde_json::from_value(params.unwrap_or_else(|| json!({})))
        .map_err(|e| (INVALID_PARAMS, format!("Invalid params: {}", e)))
}

/// Wrap a tool outcome as a `tools/call` result
///
/// Tool failures are results with `isError`, not protocol errors, so the
/// caller sees the message.
fn tool_result<T: Serialize>(outcome: Result<T, ToolError>) -> Value {
    let payload = outcome.and_then(|value| {
        serde_json::to_value(value)
            .map_err(|e| ToolError::new(format!("Failed to encode tool result: {}", e)))
    });

    match payload {
        Ok(structured) => json!({
            "content": [{ "type": "text", "text": structured.to_string() }],
            "structuredContent": structured,
            "isError": false,
        }),
        Err(e) => json!({
            "content": [{ "type": "text", "text": e.message }],
            "isError": true,
        }),
    }
}

fn tool_descriptions() -> Value {
    let resource_type = json!({
        "type": "string",
        "description": "Kubernetes resource type in lowercase plural form (e.g., 'pods', 'services', 'deployments', 'configmaps', 'nodes', 'namespaces')",
        "default": DEFAULT_RESOURCE_TYPE,
    });
    let namespace = json!({
        "type": ["string", "null"],
        "description": "Kubernetes namespace. Ignored for cluster-scoped resources like 'nodes', 'namespaces', 'clusterroles'.",
        "default": DEFAULT_NAMESPACE,
    });

    json!([
        {
            "name": LIST_TOOL,
            "description": "List Kubernetes resources of specified type in a namespace",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "resource_type": resource_type,
                    "namespace": namespace,
                    "selector": {
                        "type": ["string", "null"],
                        "description": "Label selector to filter resources (e.g., 'app=myapp,env=production')",
                    },
                },
                "additionalProperties": false,
            },
        },
        {
            "name": GET_TOOL,
            "description": "Get details of a specific Kubernetes resource",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "resource_type": resource_type,
                    "namespace": namespace,
                    "name": {
                        "type": "string",
                        "description": "Name of the Kubernetes resource",
                    },
                },
                "required": ["name"],
                "additionalProperties": false,
            },
        },
    ])
}
