//! Model Context Protocol plumbing shared by the stdio and HTTP sessions
//!
//! Automation servers such as `@playwright/mcp` speak JSON-RPC 2.0: an `initialize`
//! handshake, then one `tools/call` request per browser operation.

pub mod http;
pub mod stdio;

use super::traits::{RawToolResult, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub use http::HttpSession;
pub use stdio::StdioSession;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const CLIENT_NAME: &str = env!("CARGO_PKG_NAME");
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn call(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params: Some(params),
        }
    }

    pub fn notification(method: &'a str) -> Self {
        Self {
            jsonrpc: "2.0",
            id: None,
            method,
            params: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Any message received from the server: a response, a request or a notification
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcMessage {
    /// Whether this is the response to request `id`
    pub fn answers(&self, id: u64) -> bool {
        self.method.is_none() && self.id.as_ref().and_then(Value::as_u64) == Some(id)
    }
}

pub fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": { "name": CLIENT_NAME, "version": CLIENT_VERSION }
    })
}

pub fn tool_call_params(tool: &str, args: Value) -> Value {
    json!({ "name": tool, "arguments": args })
}

/// Turn a `tools/call` response into a tool result
///
/// A JSON-RPC error (unknown tool, invalid arguments) is a tool-level failure:
/// the connection is healthy, only this call failed.
pub fn tool_result_from(message: JsonRpcMessage) -> Result<RawToolResult, TransportError> {
    if let Some(err) = message.error {
        return Ok(RawToolResult::error(format!(
            "{} (code {})",
            err.message, err.code
        )));
    }
    let result = message
        .result
        .ok_or_else(|| TransportError::Protocol("response has neither result nor error".into()))?;
    serde_json::from_value(result)
        .map_err(|e| TransportError::Protocol(format!("invalid tool result: {}", e)))
}

/// Fail the handshake when the server answered `initialize` with an error
pub fn check_initialize(message: &JsonRpcMessage) -> Result<(), TransportError> {
    match &message.error {
        Some(err) => Err(TransportError::Protocol(format!(
            "initialize rejected: {} (code {})",
            err.message, err.code
        ))),
        None => Ok(()),
    }
}
