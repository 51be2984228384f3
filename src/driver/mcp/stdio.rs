//! Automation server running as a child process, JSON-RPC over stdin/stdout

use super::{
    check_initialize, initialize_params, tool_call_params, tool_result_from, JsonRpcMessage,
    JsonRpcRequest,
};
use crate::driver::traits::{AutomationSession, RawToolResult, TransportError};
use crate::utils::binary_resolver;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

struct ServerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// Session backed by a locally spawned automation server (e.g. `npx @playwright/mcp`)
pub struct StdioSession {
    command: String,
    args: Vec<String>,
    timeout: Duration,
    process: Option<ServerProcess>,
    next_id: u64,
}

impl StdioSession {
    pub fn new(command: &str, args: &[String], timeout: Duration) -> Self {
        Self {
            command: command.to_string(),
            args: args.to_vec(),
            timeout,
            process: None,
            next_id: 1,
        }
    }

    async fn request(
        &mut self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<JsonRpcMessage, TransportError> {
        let id = self.next_id;
        self.next_id += 1;

        let outcome = tokio::time::timeout(timeout, self.exchange(id, method, params)).await;
        match outcome {
            Ok(Err(e)) if e.is_fatal() => {
                // Nothing more can be read from a broken pipe
                self.process = None;
                Err(e)
            }
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                method: method.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn handshake(&mut self) -> Result<(), TransportError> {
        let response = self
            .request("initialize", initialize_params(), self.timeout)
            .await?;
        check_initialize(&response)?;
        let process = self.process.as_mut().ok_or(TransportError::NotConnected)?;
        write_message(
            &mut process.stdin,
            &JsonRpcRequest::notification("notifications/initialized"),
        )
        .await
    }

    async fn exchange(
        &mut self,
        id: u64,
        method: &str,
        params: Value,
    ) -> Result<JsonRpcMessage, TransportError> {
        let process = self.process.as_mut().ok_or(TransportError::NotConnected)?;
        write_message(&mut process.stdin, &JsonRpcRequest::call(id, method, params)).await?;

        loop {
            let line = process
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| TransportError::Disconnected("server closed stdout".into()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message: JsonRpcMessage = match serde_json::from_str(line) {
                Ok(m) => m,
                Err(_) => {
                    // Servers occasionally print banners on stdout
                    log::debug!("Ignoring non-JSON server output: {}", line);
                    continue;
                }
            };

            if message.answers(id) {
                return Ok(message);
            }

            if let (Some(method), Some(req_id)) = (&message.method, &message.id) {
                let reply = if method == "ping" {
                    json!({"jsonrpc": "2.0", "id": req_id, "result": {}})
                } else {
                    json!({
                        "jsonrpc": "2.0",
                        "id": req_id,
                        "error": {"code": -32601, "message": "method not supported by client"}
                    })
                };
                write_message(&mut process.stdin, &reply).await?;
            }
        }
    }
}

async fn write_message<T: serde::Serialize>(
    stdin: &mut ChildStdin,
    message: &T,
) -> Result<(), TransportError> {
    let mut line = serde_json::to_vec(message)
        .map_err(|e| TransportError::Protocol(format!("failed to encode request: {}", e)))?;
    line.push(b'\n');
    stdin
        .write_all(&line)
        .await
        .map_err(|e| TransportError::Disconnected(e.to_string()))?;
    stdin
        .flush()
        .await
        .map_err(|e| TransportError::Disconnected(e.to_string()))
}

#[async_trait]
impl AutomationSession for StdioSession {
    fn endpoint(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }

    fn is_connected(&self) -> bool {
        self.process.is_some()
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.process.is_some() {
            return Ok(());
        }

        let program = binary_resolver::find_binary(&self.command)
            .map_err(|e| TransportError::Spawn(e.to_string()))?;
        log::info!("Starting automation server: {}", self.endpoint());

        let mut child = Command::new(&program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransportError::Spawn(format!("{}: {}", program.display(), e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("child stdout unavailable".into()))?;

        self.process = Some(ServerProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        });

        if let Err(e) = self.handshake().await {
            self.disconnect().await.ok();
            return Err(e);
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };
        log::info!("Stopping automation server");
        drop(process.stdin);
        // Give the server a moment to exit on EOF before killing it
        match tokio::time::timeout(Duration::from_secs(2), process.child.wait()).await {
            Ok(_) => Ok(()),
            Err(_) => process.child.kill().await.map_err(TransportError::Io),
        }
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
