pub mod events;
pub mod executor;
pub mod state;

use crate::driver::traits::AutomationSession;
use crate::driver::TransportError;
use crate::parser::{self, ParseError, ParseFailure, TestCase};
use crate::translator::ActionTranslator;
use crate::utils::config::Config;
use chrono::Utc;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

pub use events::{ConsoleEventListener, EventEmitter, TestEvent};
pub use executor::ActionDispatcher;
pub use state::*;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("could not connect to automation server: {0}")]
    Connect(#[source] TransportError),

    /// The session was lost mid-batch; `completed` holds every case run so far
    #[error("run aborted after {} case(s): {source}", .completed.len())]
    Aborted {
        completed: Vec<TestResult>,
        source: TransportError,
    },
}

impl RunError {
    /// Results gathered before the failure
    pub fn partial_results(&self) -> &[TestResult] {
        match self {
            RunError::Aborted { completed, .. } => completed.as_slice(),
            _ => &[],
        }
    }
}

/// Results of a directory run
#[derive(Debug, Default)]
pub struct BatchRun {
    pub results: Vec<TestResult>,
    /// Documents that could not be parsed; their cases were not run
    pub parse_failures: Vec<ParseFailure>,
}

/// Runs test cases against one automation session
///
/// A batch connects once before its first case and disconnects once after
/// the last, whatever the outcome.
pub struct TestRunner {
    session: Box<dyn AutomationSession>,
    translator: Box<dyn ActionTranslator>,
    dispatcher: ActionDispatcher,
    emitter: EventEmitter,
    screenshot_on_failure: bool,
}

impl TestRunner {
    pub fn new(
        session: Box<dyn AutomationSession>,
        translator: Box<dyn ActionTranslator>,
        config: &Config,
    ) -> Self {
        Self {
            session,
            translator,
            dispatcher: ActionDispatcher::from_config(config),
            emitter: EventEmitter::default(),
            screenshot_on_failure: config.screenshot_on_failure,
        }
    }

    /// Subscribe to test execution events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TestEvent> {
        self.emitter.subscribe()
    }

    /// Run one case, optionally overriding its entry URL
    ///
    /// Reuses the session when it is already connected; otherwise connects
    /// for this case only.
    pub async fn run_test_case(
        &mut self,
        test_case: &TestCase,
        entry_url: Option<&str>,
    ) -> Result<TestResult, RunError> {
        let mut test_case = test_case.clone();
        if let Some(url) = entry_url {
            test_case.entry_url = Some(url.to_string());
        }

        let opened = self.acquire().await?;
        let result = self.execute_case(&test_case).await;
        if opened {
            self.release().await;
        }
        Ok(result)
    }

    /// Parse and run every case of one document
    pub async fn run_file(&mut self, path: &Path) -> Result<Vec<TestResult>, RunError> {
        let case_file = parser::parse_file(path)?;
        self.emitter.emit(TestEvent::FileParsed {
            path: path.display().to_string(),
            case_count: case_file.test_cases.len(),
        });
        self.run_cases(&case_file.test_cases).await
    }

    /// Parse and run an inline document; `name` picks the format by extension
    pub async fn run_from_string(
        &mut self,
        content: &str,
        name: &str,
    ) -> Result<Vec<TestResult>, RunError> {
        let case_file = parser::parse_file_content(content, Path::new(name))?;
        self.emitter.emit(TestEvent::FileParsed {
            path: name.to_string(),
            case_count: case_file.test_cases.len(),
        });
        self.run_cases(&case_file.test_cases).await
    }

    /// Run every case document under `dir` as a single batch
    pub async fn run_all(&mut self, dir: &Path) -> Result<BatchRun, RunError> {
        let parsed = parser::parse_directory(dir)?;
        for failure in &parsed.failures {
            self.emitter.emit(TestEvent::FileFailed {
                path: failure.path.display().to_string(),
                error: failure.error.to_string(),
            });
        }

        let mut cases = Vec::new();
        for file in parsed.files {
            self.emitter.emit(TestEvent::FileParsed {
                path: file.file_path.display().to_string(),
                case_count: file.test_cases.len(),
            });
            cases.extend(file.test_cases);
        }
        if cases.is_empty() {
            self.emitter.emit(TestEvent::Log {
                message: format!("No runnable test cases under {}", dir.display()),
            });
        }

        let results = self.run_cases(&cases).await?;
        Ok(BatchRun {
            results,
            parse_failures: parsed.failures,
        })
    }

    /// Run cases one after another on a single connection
    ///
    /// Stops after the case during which the session was lost.
    pub async fn run_cases(&mut self, cases: &[TestCase]) -> Result<Vec<TestResult>, RunError> {
        let opened = self.acquire().await?;
        let started = Instant::now();
        self.emitter.emit(TestEvent::BatchStarted {
            run_id: Uuid::new_v4().to_string(),
            endpoint: self.session.endpoint(),
        });

        let mut results = Vec::with_capacity(cases.len());
        let mut lost = None;
        for test_case in cases {
            let result = self.execute_case(test_case).await;
            lost = result.session_loss().cloned();
            results.push(result);
            if lost.is_some() {
                break;
            }
        }

        if opened {
            self.release().await;
        }

        match lost {
            Some(source) => {
                log::error!("Automation session lost, aborting remaining cases: {}", source);
                self.emitter.emit(TestEvent::BatchAborted {
                    completed: results.len(),
                    error: source.to_string(),
                });
                Err(RunError::Aborted {
                    completed: results,
                    source,
                })
            }
            None => {
                let passed = results.iter().filter(|r| r.success).count();
                self.emitter.emit(TestEvent::BatchFinished {
                    total: results.len(),
                    passed,
                    failed: results.len() - passed,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                Ok(results)
            }
        }
    }

    /// Connect unless already connected; returns whether this call opened the session
    async fn acquire(&mut self) -> Result<bool, RunError> {
        if self.session.is_connected() {
            return Ok(false);
        }
        log::info!("Connecting to automation server {}", self.session.endpoint());
        match self.session.connect().await {
            Ok(()) => Ok(true),
            Err(e) => {
                // Release whatever the failed attempt left behind
                self.release().await;
                Err(RunError::Connect(e))
            }
        }
    }

    async fn release(&mut self) {
        if let Err(e) = self.session.disconnect().await {
            log::warn!("Failed to disconnect from automation server: {}", e);
            self.emitter.emit(TestEvent::Log {
                message: format!("Failed to disconnect from automation server: {}", e),
            });
        }
    }

    /// Translate and execute one case on the connected session
    async fn execute_case(&mut self, test_case: &TestCase) -> TestResult {
        let mut state = CaseState::new(test_case);
        state.start();
        self.emitter.emit(TestEvent::CaseStarted {
            case_id: test_case.id.clone(),
            title: test_case.title.clone(),
        });
        let start_time = Utc::now();

        let (action_results, error) = match self.translator.translate(test_case).await {
            Ok(actions) => {
                log::debug!(
                    "{} translated {} into {} actions",
                    self.translator.name(),
                    test_case.id,
                    actions.len()
                );
                self.emitter.emit(TestEvent::CaseTranslated {
                    case_id: test_case.id.clone(),
                    action_count: actions.len(),
                });
                (self.execute_actions(&actions).await, None)
            }
            Err(e) => {
                log::warn!("Could not translate {}: {}", test_case.id, e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        let result = TestResult::new(
            test_case.clone(),
            start_time,
            Utc::now(),
            action_results,
            error,
        );
        state.finish(&result);
        self.emitter.emit(TestEvent::CaseFinished {
            case_id: state.case_id.clone(),
            status: state.status.clone(),
            duration_ms: state.duration_ms,
        });
        result
    }

    /// Execute every action in order; a failure never skips the rest
    async fn execute_actions(&mut self, actions: &[crate::parser::Action]) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(actions.len());
        for (index, action) in actions.iter().enumerate() {
            self.emitter.emit(TestEvent::ActionStarted {
                index,
                action: action.display_name(),
            });
            let started = Instant::now();
            let mut result = self.dispatcher.execute(self.session.as_mut(), action).await;

            let wants_evidence = !result.success
                && self.screenshot_on_failure
                && result.screenshot.is_none()
                && self.session.is_connected()
                && action.action_type() != "screenshot";
            if wants_evidence {
                result.screenshot = self.dispatcher.capture_screenshot(self.session.as_mut()).await;
            }

            let duration_ms = started.elapsed().as_millis() as u64;
            if result.success {
                self.emitter.emit(TestEvent::ActionPassed { index, duration_ms });
            } else {
                let error = result.error.clone().unwrap_or_else(|| result.message.clone());
                log::info!("Action {} ({}) failed: {}", index + 1, action.description(), error);
                self.emitter.emit(TestEvent::ActionFailed {
                    index,
                    error,
                    duration_ms,
                });
            }
            results.push(ActionResult::new(action, result));
        }
        results
    }
}
