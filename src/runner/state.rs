use crate::driver::TransportError;
use crate::parser::types::{Action, TestCase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Outcome of one dispatched action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    /// Base64 image data returned by the automation server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Transport fault that lost the session while executing this action
    #[serde(skip)]
    pub(crate) session_loss: Option<TransportError>,
}

impl ExecutionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn transport(err: &TransportError) -> Self {
        Self {
            success: false,
            message: "automation server call failed".to_string(),
            error: Some(err.to_string()),
            session_loss: err.is_fatal().then(|| err.clone()),
            ..Self::default()
        }
    }

    pub fn with_screenshot(mut self, data: Option<String>) -> Self {
        self.screenshot = data;
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.session_loss.is_some()
    }

    pub fn session_loss(&self) -> Option<&TransportError> {
        self.session_loss.as_ref()
    }
}

/// Type and description of an executed action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSummary {
    #[serde(rename = "type")]
    pub action_type: String,
    pub description: String,
}

impl From<&Action> for ActionSummary {
    fn from(action: &Action) -> Self {
        Self {
            action_type: action.action_type().to_string(),
            description: action.description().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: ActionSummary,
    pub result: ExecutionResult,
    pub timestamp: DateTime<Utc>,
}

impl ActionResult {
    pub fn new(action: &Action, result: ExecutionResult) -> Self {
        Self {
            action: action.into(),
            result,
            timestamp: Utc::now(),
        }
    }
}

/// Result of running one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_case: TestCase,
    pub success: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Milliseconds between start and end
    pub duration: u64,
    pub action_results: Vec<ActionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    /// Assemble a result; a case-level `error` (translation failure) always fails the case
    pub fn new(
        test_case: TestCase,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        action_results: Vec<ActionResult>,
        error: Option<String>,
    ) -> Self {
        let success = error.is_none() && action_results.iter().all(|r| r.result.success);
        let duration = (end_time - start_time).num_milliseconds().max(0) as u64;
        Self {
            test_case,
            success,
            start_time,
            end_time,
            duration,
            action_results,
            error,
        }
    }

    /// First failure message, for one-line summaries
    pub fn first_error(&self) -> Option<&str> {
        self.error.as_deref().or_else(|| {
            self.action_results
                .iter()
                .find(|r| !r.result.success)
                .map(|r| r.result.error.as_deref().unwrap_or(r.result.message.as_str()))
        })
    }

    /// The transport fault that lost the session during this case, if any
    pub fn session_loss(&self) -> Option<&TransportError> {
        self.action_results
            .iter()
            .find_map(|r| r.result.session_loss())
    }
}

/// Test case execution status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CaseStatus {
    Pending,
    Running,
    Passed,
    Failed { error: String },
}

/// Live state of a test case while it runs
#[derive(Debug, Clone)]
pub struct CaseState {
    pub case_id: String,
    pub title: String,
    pub status: CaseStatus,
    pub started_at: Option<Instant>,
    pub duration_ms: Option<u64>,
}

impl CaseState {
    pub fn new(test_case: &TestCase) -> Self {
        Self {
            case_id: test_case.id.clone(),
            title: test_case.title.clone(),
            status: CaseStatus::Pending,
            started_at: None,
            duration_ms: None,
        }
    }

    pub fn start(&mut self) {
        self.status = CaseStatus::Running;
        self.started_at = Some(Instant::now());
    }

    /// Move to the terminal state matching `result`
    pub fn finish(&mut self, result: &TestResult) {
        let status = if result.success {
            CaseStatus::Passed
        } else {
            CaseStatus::Failed {
                error: result.first_error().unwrap_or("failed").to_string(),
            }
        };
        self.status = status;
        if let Some(start) = self.started_at {
            self.duration_ms = Some(start.elapsed().as_millis() as u64);
        }
    }
}
