use super::state::ExecutionResult;
use crate::driver::traits::AutomationSession;
use crate::driver::{RawToolResult, ToolContent};
use crate::parser::types::Action;
use crate::utils::config::Config;
use serde_json::{json, Value};
use std::time::Duration;

pub const TOOL_NAVIGATE: &str = "browser_navigate";
pub const TOOL_CLICK: &str = "browser_click";
pub const TOOL_WAIT: &str = "browser_wait_for";
pub const TOOL_SCREENSHOT: &str = "browser_take_screenshot";
pub const TOOL_FILL: &str = "browser_fill";
pub const TOOL_SELECT: &str = "browser_select_option";
pub const TOOL_GET_TEXT: &str = "browser_get_text";
pub const TOOL_SNAPSHOT: &str = "browser_snapshot";

/// Slack given to the server to report its own wait timeout before we give up locally
const WAIT_GRACE: Duration = Duration::from_millis(1000);

/// First element of a tool response's content array
pub fn extract_content(raw: &RawToolResult) -> Option<&ToolContent> {
    raw.content.first()
}

fn content_text(raw: &RawToolResult) -> Option<&str> {
    match extract_content(raw)? {
        ToolContent::Text { text } => Some(text.as_str()),
        _ => None,
    }
}

/// Executes one action against an automation session
///
/// Every failure, including transport faults, comes back as an unsuccessful
/// `ExecutionResult`; nothing is propagated past this point.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    default_wait_timeout: Duration,
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000))
    }
}

impl ActionDispatcher {
    pub fn new(default_wait_timeout: Duration) -> Self {
        Self {
            default_wait_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Duration::from_millis(config.default_wait_timeout_ms))
    }

    pub async fn execute(
        &self,
        session: &mut dyn AutomationSession,
        action: &Action,
    ) -> ExecutionResult {
        log::debug!("Executing {}", action.display_name());
        match action {
            Action::Navigate { url, .. } => {
                let raw = match session.invoke(TOOL_NAVIGATE, json!({ "url": url })).await {
                    Ok(raw) => raw,
                    Err(e) => return ExecutionResult::transport(&e),
                };
                tool_outcome(&raw, TOOL_NAVIGATE, format!("Navigated to {}", url))
            }
            Action::Click { selector, .. } => {
                let args = json!({ "selector": selector });
                let raw = match session.invoke(TOOL_CLICK, args).await {
                    Ok(raw) => raw,
                    Err(e) => return ExecutionResult::transport(&e),
                };
                tool_outcome(&raw, TOOL_CLICK, format!("Clicked \"{}\"", selector))
            }
            Action::Wait {
                selector, timeout, ..
            } => {
                let timeout = timeout
                    .map(Duration::from_millis)
                    .unwrap_or(self.default_wait_timeout);
                self.wait(session, selector.as_deref(), timeout).await
            }
            Action::Verify {
                selector,
                text,
                expected,
                ..
            } => {
                let (tool, args) = match selector {
                    Some(selector) => (
                        TOOL_GET_TEXT,
                        json!({ "selector": selector, "expected": expected }),
                    ),
                    None => (
                        TOOL_SNAPSHOT,
                        json!({
                            "text": text.as_deref().unwrap_or(expected),
                            "expected": expected
                        }),
                    ),
                };
                let raw = match session.invoke(tool, args).await {
                    Ok(raw) => raw,
                    Err(e) => return ExecutionResult::transport(&e),
                };
                verify_outcome(&raw, expected)
            }
            Action::Fill { selector, text, .. } => {
                let args = json!({ "selector": selector, "text": text });
                let raw = match session.invoke(TOOL_FILL, args).await {
                    Ok(raw) => raw,
                    Err(e) => return ExecutionResult::transport(&e),
                };
                tool_outcome(&raw, TOOL_FILL, format!("Filled \"{}\"", selector))
            }
            Action::Select { selector, text, .. } => {
                let args = json!({ "selector": selector, "text": text });
                let raw = match session.invoke(TOOL_SELECT, args).await {
                    Ok(raw) => raw,
                    Err(e) => return ExecutionResult::transport(&e),
                };
                let message = format!("Selected \"{}\" in \"{}\"", text, selector);
                tool_outcome(&raw, TOOL_SELECT, message)
            }
            Action::Screenshot { .. } => match session.invoke(TOOL_SCREENSHOT, json!({})).await {
                Ok(raw) => screenshot_outcome(&raw),
                Err(e) => ExecutionResult::transport(&e),
            },
        }
    }

    async fn wait(
        &self,
        session: &mut dyn AutomationSession,
        selector: Option<&str>,
        timeout: Duration,
    ) -> ExecutionResult {
        let timeout_ms = timeout.as_millis() as u64;
        let mut args = json!({ "timeout": timeout_ms });
        if let Some(selector) = selector {
            args["selector"] = Value::String(selector.to_string());
        }

        let deadline = timeout + WAIT_GRACE;
        let call = session.invoke_with_timeout(TOOL_WAIT, args, deadline);
        match tokio::time::timeout(deadline, call).await {
            Ok(Ok(raw)) => {
                let message = match selector {
                    Some(s) => format!("\"{}\" appeared", s),
                    None => "Page ready".to_string(),
                };
                tool_outcome(&raw, TOOL_WAIT, message)
            }
            Ok(Err(e)) => ExecutionResult::transport(&e),
            Err(_) => ExecutionResult::failed(
                "wait did not complete",
                format!("timed out after {}ms", timeout_ms),
            ),
        }
    }

    /// Take a screenshot and return its image data, if the server produced any
    pub async fn capture_screenshot(&self, session: &mut dyn AutomationSession) -> Option<String> {
        match session.invoke(TOOL_SCREENSHOT, json!({})).await {
            Ok(raw) => screenshot_outcome(&raw).screenshot,
            Err(e) => {
                log::warn!("Could not capture failure screenshot: {}", e);
                None
            }
        }
    }
}

fn tool_outcome(raw: &RawToolResult, tool: &str, success_message: String) -> ExecutionResult {
    let text = content_text(raw).map(str::to_string);
    if raw.is_error {
        let error = text.unwrap_or_else(|| "tool reported an error".to_string());
        return ExecutionResult::failed(format!("{} failed", tool), error);
    }
    ExecutionResult::ok(text.filter(|t| !t.trim().is_empty()).unwrap_or(success_message))
}

fn verify_outcome(raw: &RawToolResult, expected: &str) -> ExecutionResult {
    if raw.is_error {
        let error = content_text(raw).unwrap_or("tool reported an error");
        return ExecutionResult::failed("verification could not run", error);
    }
    match content_text(raw) {
        Some(actual) if actual.contains(expected) => {
            ExecutionResult::ok(format!("Found \"{}\"", expected))
        }
        Some(actual) => {
            let mut preview: String = actual.chars().take(200).collect();
            if preview.len() < actual.len() {
                preview.push_str("...");
            }
            ExecutionResult::failed(
                format!("Expected \"{}\" not found", expected),
                format!("expected \"{}\", got \"{}\"", expected, preview),
            )
        }
        None => ExecutionResult::failed(
            format!("Expected \"{}\" not found", expected),
            "tool returned no text content",
        ),
    }
}

fn screenshot_outcome(raw: &RawToolResult) -> ExecutionResult {
    if raw.is_error {
        let error = content_text(raw).unwrap_or("tool reported an error");
        return ExecutionResult::failed("screenshot failed", error);
    }
    // Servers may put a caption before the image
    let image = raw.content.iter().find_map(|c| match c {
        ToolContent::Image { data, .. } if !data.is_empty() => Some(data.clone()),
        _ => None,
    });
    match image {
        Some(data) => ExecutionResult::ok("Screenshot captured").with_screenshot(Some(data)),
        None => ExecutionResult::failed("screenshot failed", "tool returned no image content"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{MockSession, Reply};
    use crate::driver::TransportError;

    fn image(data: &str) -> RawToolResult {
        RawToolResult {
            content: vec![ToolContent::Image {
                data: data.to_string(),
                mime_type: Some("image/png".to_string()),
            }],
            is_error: false,
        }
    }

    async fn connected(session: MockSession) -> MockSession {
        let mut session = session;
        session.connect().await.unwrap();
        session
    }

    #[test]
    fn test_extract_content() {
        assert_eq!(extract_content(&RawToolResult::default()), None);
        let raw = RawToolResult::text("hello");
        assert_eq!(
            extract_content(&raw),
            Some(&ToolContent::Text { text: "hello".into() })
        );
    }

    #[tokio::test]
    async fn test_each_action_maps_to_one_tool_call() {
        let session = MockSession::new().reply(TOOL_SCREENSHOT, Reply::Ok(image("iVBOR")));
        let mut session = connected(session).await;
        let journal = session.journal();
        let dispatcher = ActionDispatcher::default();

        let actions = vec![
            Action::Navigate {
                url: "https://app.test".into(),
                description: "open".into(),
            },
            Action::Click {
                selector: "登录".into(),
                description: "click".into(),
            },
            Action::Wait {
                selector: None,
                timeout: None,
                description: "wait".into(),
            },
            Action::Fill {
                selector: "账号".into(),
                text: "admin".into(),
                description: "fill".into(),
            },
            Action::Select {
                selector: "城市".into(),
                text: "北京".into(),
                description: "select".into(),
            },
            Action::Screenshot {
                description: "shot".into(),
            },
        ];
        for action in &actions {
            let result = dispatcher.execute(&mut session, action).await;
            assert!(result.success, "{} failed: {:?}", action.action_type(), result);
        }

        let calls = journal.lock().unwrap().calls.clone();
        let tools: Vec<&str> = calls.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(
            tools,
            vec![TOOL_NAVIGATE, TOOL_CLICK, TOOL_WAIT, TOOL_FILL, TOOL_SELECT, TOOL_SCREENSHOT]
        );
        assert_eq!(calls[0].1, json!({"url": "https://app.test"}));
        assert_eq!(calls[2].1, json!({"timeout": 5000}));
        assert_eq!(calls[3].1, json!({"selector": "账号", "text": "admin"}));
    }

    #[tokio::test]
    async fn test_click_transport_error_becomes_data() {
        let session = MockSession::new().reply(
            TOOL_CLICK,
            Reply::Transport(|| TransportError::Timeout {
                method: "tools/call".into(),
                timeout_ms: 30000,
            }),
        );
        let mut session = connected(session).await;
        let dispatcher = ActionDispatcher::default();

        let click = Action::Click {
            selector: "登录".into(),
            description: "click".into(),
        };
        let result = dispatcher.execute(&mut session, &click).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("timed out"));
        assert!(!result.is_fatal());

        // The session is still usable for the next action
        let next = Action::Navigate {
            url: "https://app.test".into(),
            description: "open".into(),
        };
        assert!(dispatcher.execute(&mut session, &next).await.success);
    }

    #[tokio::test]
    async fn test_tool_level_error_fails_action() {
        let session = MockSession::new()
            .reply(TOOL_CLICK, Reply::Ok(RawToolResult::error("element not found")));
        let mut session = connected(session).await;
        let click = Action::Click {
            selector: "Nope".into(),
            description: "click".into(),
        };
        let result = ActionDispatcher::default().execute(&mut session, &click).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("element not found"));
    }

    #[tokio::test]
    async fn test_verify_compares_extracted_text() {
        let session = MockSession::new()
            .reply(TOOL_SNAPSHOT, Reply::Ok(RawToolResult::text("欢迎回来, admin")))
            .reply(TOOL_SNAPSHOT, Reply::Ok(RawToolResult::text("登录失败")))
            .reply(TOOL_GET_TEXT, Reply::Ok(RawToolResult::text("Total: 3")));
        let mut session = connected(session).await;
        let journal = session.journal();
        let dispatcher = ActionDispatcher::default();

        let verify = |selector: Option<&str>, expected: &str| Action::Verify {
            selector: selector.map(String::from),
            text: None,
            expected: expected.into(),
            description: "verify".into(),
        };

        assert!(dispatcher.execute(&mut session, &verify(None, "欢迎")).await.success);
        let mismatch = dispatcher.execute(&mut session, &verify(None, "欢迎")).await;
        assert!(!mismatch.success);
        assert!(mismatch.error.unwrap().contains("登录失败"));
        assert!(dispatcher.execute(&mut session, &verify(Some("#total"), "3")).await.success);

        let calls = journal.lock().unwrap().calls.clone();
        assert_eq!(calls[0].1, json!({"text": "欢迎", "expected": "欢迎"}));
        assert_eq!(calls[2].1, json!({"selector": "#total", "expected": "3"}));
    }

    #[tokio::test]
    async fn test_screenshot_requires_image() {
        let session = MockSession::new()
            .reply(TOOL_SCREENSHOT, Reply::Ok(RawToolResult::text("saved")))
            .reply(TOOL_SCREENSHOT, Reply::Ok(image("AAAA")));
        let mut session = connected(session).await;
        let dispatcher = ActionDispatcher::default();
        let shot = Action::Screenshot {
            description: "shot".into(),
        };

        assert!(!dispatcher.execute(&mut session, &shot).await.success);
        let result = dispatcher.execute(&mut session, &shot).await;
        assert!(result.success);
        assert_eq!(result.screenshot.as_deref(), Some("AAAA"));
    }

    #[tokio::test]
    async fn test_wait_uses_action_timeout() {
        let mut session = connected(MockSession::new()).await;
        let journal = session.journal();
        let wait = Action::Wait {
            selector: Some("Dashboard".into()),
            timeout: Some(1500),
            description: "wait".into(),
        };
        assert!(ActionDispatcher::default().execute(&mut session, &wait).await.success);
        let journal = journal.lock().unwrap();
        assert_eq!(journal.calls[0].1, json!({"timeout": 1500, "selector": "Dashboard"}));
        // The session is allowed to outlast its usual per-call bound for the wait
        assert_eq!(journal.min_timeouts, vec![Duration::from_millis(2500)]);
    }
}
