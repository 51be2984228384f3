use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// One element of a tool response's content array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType", default)]
        mime_type: Option<String>,
    },
    /// Content kinds the engine does not interpret (audio, resources, ...)
    #[serde(other)]
    Other,
}

/// Response of a single tool invocation, as returned by the automation server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawToolResult {
    #[serde(default)]
    pub content: Vec<ToolContent>,
    /// Tool-level failure reported by the server (element not found, ...)
    #[serde(default)]
    pub is_error: bool,
}

impl RawToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: true,
        }
    }
}

/// Failure of the connection to the automation server itself
///
/// Tool-level failures are not transport errors; they come back as a
/// `RawToolResult` with `is_error` set.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("automation server is not connected")]
    NotConnected,

    #[error("failed to start automation server: {0}")]
    Spawn(String),

    #[error("connection to automation server closed: {0}")]
    Disconnected(String),

    #[error("automation server call '{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    #[error("automation server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("automation server HTTP error: {0}")]
    Http(String),

    #[error("automation server protocol error: {0}")]
    Protocol(String),
}

// io::Error is neither Clone nor PartialEq; both impls keep the kind and message
impl Clone for TransportError {
    fn clone(&self) -> Self {
        match self {
            TransportError::NotConnected => TransportError::NotConnected,
            TransportError::Spawn(msg) => TransportError::Spawn(msg.clone()),
            TransportError::Disconnected(msg) => TransportError::Disconnected(msg.clone()),
            TransportError::Timeout { method, timeout_ms } => TransportError::Timeout {
                method: method.clone(),
                timeout_ms: *timeout_ms,
            },
            TransportError::Io(e) => {
                TransportError::Io(std::io::Error::new(e.kind(), e.to_string()))
            }
            TransportError::Http(msg) => TransportError::Http(msg.clone()),
            TransportError::Protocol(msg) => TransportError::Protocol(msg.clone()),
        }
    }
}

impl PartialEq for TransportError {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
            && self.to_string() == other.to_string()
    }
}

impl TransportError {
    /// Whether the session can no longer be used for the rest of the batch
    pub fn is_fatal(&self) -> bool {
        match self {
            TransportError::NotConnected
            | TransportError::Spawn(_)
            | TransportError::Disconnected(_)
            | TransportError::Io(_) => true,
            TransportError::Timeout { .. }
            | TransportError::Http(_)
            | TransportError::Protocol(_) => false,
        }
    }
}

/// Connection to a remote browser automation server exposing named tools
///
/// A session is used by one run at a time; methods take `&mut self` so it
/// cannot be shared between concurrent batches.
#[async_trait]
pub trait AutomationSession: Send {
    /// Human readable endpoint (command line or URL) for logs and reports
    fn endpoint(&self) -> String;

    fn is_connected(&self) -> bool;

    /// Establish the connection; a no-op when already connected
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Tear the connection down; a no-op when not connected
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Call a named tool with JSON arguments
    async fn invoke(&mut self, tool: &str, args: Value) -> Result<RawToolResult, TransportError>;

    /// Call a tool that may legitimately run for `min_timeout`
    ///
    /// Sessions that bound every call raise their limit to `min_timeout` for
    /// this call when it is longer.
    async fn invoke_with_timeout(
        &mut self,
        tool: &str,
        args: Value,
        min_timeout: Duration,
    ) -> Result<RawToolResult, TransportError> {
        let _ = min_timeout;
        self.invoke(tool, args).await
    }
}
