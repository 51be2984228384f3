//! Automation server reachable over HTTP (MCP streamable HTTP transport)

use super::{
    check_initialize, initialize_params, tool_call_params, tool_result_from, JsonRpcMessage,
    JsonRpcRequest,
};
use crate::driver::traits::{AutomationSession, RawToolResult, TransportError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Session against an already running automation server endpoint
pub struct HttpSession {
    url: String,
    timeout: Duration,
    client: Option<reqwest::Client>,
    session_id: Option<String>,
    next_id: u64,
}

impl HttpSession {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            timeout,
            client: None,
            session_id: None,
            next_id: 1,
        }
    }

    fn map_send_error(method: &str, timeout: Duration, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                method: method.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }
        } else if e.is_connect() {
            TransportError::Disconnected(e.to_string())
        } else {
            TransportError::Http(e.to_string())
        }
    }

    fn post<T: serde::Serialize>(
        &self,
        client: &reqwest::Client,
        body: &T,
    ) -> reqwest::RequestBuilder {
        let mut req = client
            .post(&self.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(body);
        if let Some(ref id) = self.session_id {
            req = req.header(SESSION_HEADER, id);
        }
        req
    }

    async fn request(
        &mut self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<JsonRpcMessage, TransportError> {
        let client = self.client.clone().ok_or(TransportError::NotConnected)?;
        let id = self.next_id;
        self.next_id += 1;

        let response = self
            .post(&client, &JsonRpcRequest::call(id, method, params))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::map_send_error(method, timeout, e))?;

        if let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(session_id.to_string());
        }

        let status = response.status();
        if status == StatusCode::NOT_FOUND && self.session_id.is_some() {
            self.client = None;
            return Err(TransportError::Disconnected(
                "server no longer recognizes the session".into(),
            ));
        }
        if !status.is_success() {
            return Err(TransportError::Http(format!("{} returned {}", method, status)));
        }

        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |ct| ct.contains("text/event-stream"));
        let body = response
            .text()
            .await
            .map_err(|e| Self::map_send_error(method, timeout, e))?;

        let message = if is_sse {
            parse_sse_events(&body)
                .into_iter()
                .filter_map(|data| serde_json::from_str::<JsonRpcMessage>(&data).ok())
                .find(|m| m.answers(id))
        } else {
            serde_json::from_str::<JsonRpcMessage>(&body)
                .ok()
                .filter(|m| m.answers(id))
        };

        message.ok_or_else(|| {
            TransportError::Protocol(format!(
                "no response to {} (id {}) in server reply",
                method, id
            ))
        })
    }
}

/// Collect the `data:` payload of every event in an SSE body
fn parse_sse_events(body: &str) -> Vec<String> {
    let mut events = Vec::new();
    let mut data = String::new();

    for line in body.lines() {
        if line.is_empty() {
            if !data.is_empty() {
                events.push(std::mem::take(&mut data));
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if !data.is_empty() {
        events.push(data);
    }
    events
}

#[async_trait]
impl AutomationSession for HttpSession {
    fn endpoint(&self) -> String {
        self.url.clone()
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.client.is_some() {
            return Ok(());
        }
        log::info!("Connecting to automation server: {}", self.url);

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        self.client = Some(client.clone());
        self.session_id = None;

        let initialize = self.request("initialize", initialize_params(), self.timeout);
        let response = match initialize.await {
            Ok(r) => r,
            Err(e) => {
                self.client = None;
                // The server was never reached in a usable state
                return Err(match e {
                    TransportError::Http(msg) | TransportError::Protocol(msg) => {
                        TransportError::Disconnected(msg)
                    }
                    other => other,
                });
            }
        };
        if let Err(e) = check_initialize(&response) {
            self.client = None;
            return Err(e);
        }

        // Notifications are acknowledged with 202 and no body
        let ack = self
            .post(&client, &JsonRpcRequest::notification("notifications/initialized"))
            .send()
            .await;
        if let Err(e) = ack {
            log::warn!("initialized notification failed: {}", e);
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        log::info!("Disconnecting from automation server");

        if let Some(session_id) = self.session_id.take() {
            let result = client
                .delete(&self.url)
                .header(SESSION_HEADER, session_id)
                .send()
                .await;
            match result {
                // 405: the server does not support explicit session termination
                Ok(resp)
                    if resp.status().is_success()
                        || resp.status() == StatusCode::METHOD_NOT_ALLOWED => {}
                Ok(resp) => {
                    return Err(TransportError::Http(format!(
                        "session termination returned {}",
                        resp.status()
                    )))
                }
                Err(e) => return Err(TransportError::Disconnected(e.to_string())),
            }
        }
        Ok(())
    }

    async fn invoke(&mut self, tool: &str, args: Value) -> Result<RawToolResult, TransportError> {
        self.invoke_with_timeout(tool, args, self.timeout).await
    }

    async fn invoke_with_timeout(
        &mut self,
        tool: &str,
        args: Value,
        min_timeout: Duration,
    ) -> Result<RawToolResult, TransportError> {
        log::debug!("tools/call {} {}", tool, args);
        let timeout = self.timeout.max(min_timeout);
        let response = self
            .request("tools/call", tool_call_params(tool, args), timeout)
            .await?;
        tool_result_from(response)
    }
}
