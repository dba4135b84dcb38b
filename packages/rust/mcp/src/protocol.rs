//! JSON-RPC 2.0 message handling and the two query tools.

use fleetsql_core::{QueryOutcome, QuerySurface};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// Protocol revision reported when the client does not name one.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

pub const SERVER_NAME: &str = "fleetpkg";
const SERVER_TITLE: &str = "Elastic Fleet Integration Package metadata MCP server";

pub const TABLES_TOOL: &str = "fleetpkg_get_sql_tables";
pub const QUERY_TOOL: &str = "fleetpkg_execute_sql_query";

// JSON-RPC error codes.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Incoming request or notification. A missing `id` marks a notification.
#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Response {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl Response {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Result of a `tools/call`.
#[derive(Debug, Serialize, PartialEq)]
pub struct ToolResult {
    pub content: Vec<TextContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl ToolResult {
    fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![TextContent {
                kind: "text",
                text: text.into(),
            }],
            is_error: false,
        }
    }

    fn error(message: impl std::fmt::Display) -> Self {
        Self {
            content: vec![TextContent {
                kind: "text",
                text: format!("ERROR: {message}"),
            }],
            is_error: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    statement: String,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Transport-independent tool server. Cheap to clone.
#[derive(Clone)]
pub struct McpServer {
    surface: QuerySurface,
    version: String,
}

impl McpServer {
    pub fn new(surface: QuerySurface) -> Self {
        Self {
            surface,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Handle one raw message. Returns the serialized response, or `None`
    /// for notifications.
    pub async fn handle_message(&self, text: &str) -> Option<String> {
        let response = match serde_json::from_str::<Value>(text) {
            Err(e) => Some(Response::err(
                Value::Null,
                RpcError::new(PARSE_ERROR, format!("parse error: {e}")),
            )),
            Ok(value) => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                match serde_json::from_value::<Request>(value) {
                    Ok(request) => self.handle(request).await,
                    Err(e) => Some(Response::err(
                        id,
                        RpcError::new(INVALID_REQUEST, format!("invalid request: {e}")),
                    )),
                }
            }
        };
        let response = response?;
        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "failed to serialize response");
                None
            }
        }
    }

    /// Dispatch a parsed request.
    pub async fn handle(&self, request: Request) -> Option<Response> {
        debug!(method = %request.method, "request");
        let Some(id) = request.id else {
            // Notifications (`notifications/initialized` and friends) get no reply.
            return None;
        };
        if request.jsonrpc != "2.0" {
            return Some(Response::err(
                id,
                RpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => Ok(self.initialize(&request.params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools_list()),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            )),
        };
        Some(match result {
            Ok(value) => Response::ok(id, value),
            Err(error) => Response::err(id, error),
        })
    }

    fn initialize(&self, params: &Value) -> Value {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);
        json!({
            "protocolVersion": version,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": SERVER_NAME,
                "title": SERVER_TITLE,
                "version": self.version,
            },
        })
    }

    async fn call_tool(&self, params: Value) -> Result<Value, RpcError> {
        let params: CallParams = serde_json::from_value(params)
            .map_err(|e| RpcError::new(INVALID_PARAMS, format!("invalid params: {e}")))?;

        let result = match params.name.as_str() {
            TABLES_TOOL => ToolResult::text(self.surface.catalog()),
            QUERY_TOOL => {
                let args: QueryArgs = serde_json::from_value(params.arguments).map_err(|e| {
                    RpcError::new(INVALID_PARAMS, format!("invalid arguments: {e}"))
                })?;
                self.execute_query(&args.statement).await
            }
            other => {
                return Err(RpcError::new(
                    INVALID_PARAMS,
                    format!("unknown tool: {other}"),
                ));
            }
        };
        serde_json::to_value(result).map_err(|e| RpcError::new(INVALID_PARAMS, e.to_string()))
    }

    async fn execute_query(&self, statement: &str) -> ToolResult {
        info!(statement, "executing query");
        match self.surface.execute(statement).await {
            QueryOutcome::Rows(rows) => match serde_json::to_string(&rows) {
                Ok(text) => ToolResult::text(text),
                Err(e) => ToolResult::error(format!("failed to marshal result: {e}")),
            },
            QueryOutcome::NotReady => {
                warn!("database not ready yet");
                ToolResult::error(fleetsql_core::NOT_READY_MESSAGE)
            }
            QueryOutcome::Failed(message) => {
                ToolResult::error(format!("failed to execute query: {message}"))
            }
        }
    }
}

/// Descriptors for `tools/list`.
pub fn tools_list() -> Value {
    let annotations = json!({ "readOnlyHint": true, "idempotentHint": true });
    json!({
        "tools": [
            {
                "name": TABLES_TOOL,
                "description": "Call this tool first! Returns the complete catalog of available tables and columns.",
                "inputSchema": { "type": "object", "properties": {} },
                "annotations": annotations.clone(),
            },
            {
                "name": QUERY_TOOL,
                "description": format!(
                    "Call this tool to execute an arbitrary SQLite query.\n\
                     Be sure you have called {TABLES_TOOL}() first to understand the structure of the data!"
                ),
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "statement": { "type": "string", "description": "SQLite query to execute" }
                    },
                    "required": ["statement"],
                },
                "annotations": annotations,
            },
        ]
    })
}
