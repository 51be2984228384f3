//! Scripted in-memory session for exercising dispatch and runner logic

use super::traits::{AutomationSession, RawToolResult, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted reply for a tool
pub enum Reply {
    Ok(RawToolResult),
    Transport(fn() -> TransportError),
}

#[derive(Debug, Default)]
pub struct Journal {
    pub connects: usize,
    pub disconnects: usize,
    pub calls: Vec<(String, Value)>,
    /// Extended bounds requested through `invoke_with_timeout`
    pub min_timeouts: Vec<Duration>,
}

/// Session whose tool replies are queued per tool name
///
/// Tools without a queued reply answer with a plain "ok" text result.
pub struct MockSession {
    connected: bool,
    fail_connect: bool,
    replies: HashMap<String, VecDeque<Reply>>,
    journal: Arc<Mutex<Journal>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            connected: false,
            fail_connect: false,
            replies: HashMap::new(),
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    pub fn failing_connect() -> Self {
        Self {
            fail_connect: true,
            ..Self::new()
        }
    }

    pub fn reply(mut self, tool: &str, reply: Reply) -> Self {
        self.replies
            .entry(tool.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Shared handle that stays readable after the session is boxed
    pub fn journal(&self) -> Arc<Mutex<Journal>> {
        self.journal.clone()
    }
}

#[async_trait]
impl AutomationSession for MockSession {
    fn endpoint(&self) -> String {
        "mock://automation".to_string()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.fail_connect {
            return Err(TransportError::Spawn("mock server unavailable".into()));
        }
        if !self.connected {
            self.journal.lock().unwrap().connects += 1;
            self.connected = true;
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        // Counted on every call so tests can check the runner releases exactly once
        self.journal.lock().unwrap().disconnects += 1;
        self.connected = false;
        Ok(())
    }

    async fn invoke(&mut self, tool: &str, args: Value) -> Result<RawToolResult, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.journal
            .lock()
            .unwrap()
            .calls
            .push((tool.to_string(), args));

        match self.replies.get_mut(tool).and_then(VecDeque::pop_front) {
            Some(Reply::Ok(result)) => Ok(result),
            Some(Reply::Transport(make)) => {
                let err = make();
                if err.is_fatal() {
                    self.connected = false;
                }
                Err(err)
            }
            None => Ok(RawToolResult::text("ok")),
        }
    }

    async fn invoke_with_timeout(
        &mut self,
        tool: &str,
        args: Value,
        min_timeout: Duration,
    ) -> Result<RawToolResult, TransportError> {
        self.journal.lock().unwrap().min_timeouts.push(min_timeout);
        self.invoke(tool, args).await
    }
}
