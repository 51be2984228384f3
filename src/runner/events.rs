use super::state::CaseStatus;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration as StdDuration;
use tokio::sync::broadcast;

/// Test execution events for real-time updates
#[derive(Debug, Clone)]
pub enum TestEvent {
    // Batch events
    BatchStarted {
        run_id: String,
        endpoint: String,
    },
    BatchFinished {
        total: usize,
        passed: usize,
        failed: usize,
        duration_ms: u64,
    },
    BatchAborted {
        completed: usize,
        error: String,
    },

    // File events
    FileParsed {
        path: String,
        case_count: usize,
    },
    FileFailed {
        path: String,
        error: String,
    },

    // Case events
    CaseStarted {
        case_id: String,
        title: String,
    },
    CaseTranslated {
        case_id: String,
        action_count: usize,
    },
    CaseFinished {
        case_id: String,
        status: CaseStatus,
        duration_ms: Option<u64>,
    },

    // Action events
    ActionStarted {
        index: usize,
        action: String,
    },
    ActionPassed {
        index: usize,
        duration_ms: u64,
    },
    ActionFailed {
        index: usize,
        error: String,
        duration_ms: u64,
    },

    Log {
        message: String,
    },
}

/// Event emitter for broadcasting test events
pub struct EventEmitter {
    sender: broadcast::Sender<TestEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<TestEvent>) {
        let (sender, receiver) = broadcast::channel(256);
        (Self { sender }, receiver)
    }

    /// Send to every subscriber; dropped when nobody listens
    pub fn emit(&self, event: TestEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TestEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<TestEvent>) {
        use colored::Colorize;
        use indicatif::ProgressDrawTarget;
        use std::io::IsTerminal;

        // Hidden target when piped, to keep escape codes out of logs
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let mut spinner: Option<ProgressBar> = None;
        let mut action_text = String::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("Console listener skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                TestEvent::BatchStarted { run_id, endpoint } => {
                    println!(
                        "\n{} Test run {} started against {}",
                        "▶".green().bold(),
                        run_id.cyan(),
                        endpoint.dimmed()
                    );
                }

                TestEvent::BatchFinished {
                    total,
                    passed,
                    failed,
                    duration_ms,
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish();
                    }
                    println!("\n{} Test run finished", "■".blue().bold());
                    println!("  Total cases: {}", total);
                    println!(
                        "  {} passed, {} failed",
                        passed.to_string().green(),
                        failed.to_string().red()
                    );
                    println!("  Duration: {}ms", duration_ms);
                }

                TestEvent::BatchAborted { completed, error } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!(
                        "\n{} Run aborted after {} case(s): {}",
                        "✗".red().bold(),
                        completed,
                        error.red()
                    );
                }

                TestEvent::FileParsed { path, case_count } => {
                    println!("\n{} {} ({} cases)", "→".blue(), path.white().bold(), case_count);
                }

                TestEvent::FileFailed { path, error } => {
                    println!(
                        "\n{} {} could not be parsed: {}",
                        "⚠".yellow(),
                        path,
                        error.yellow()
                    );
                }

                TestEvent::CaseStarted { case_id, title } => {
                    println!("  {} {} {}", "●".blue(), case_id.cyan(), title.white().bold());
                }

                TestEvent::CaseTranslated {
                    case_id: _,
                    action_count,
                } => {
                    multi
                        .println(format!("      {}", format!("{} actions", action_count).dimmed()))
                        .ok();
                }

                TestEvent::CaseFinished {
                    case_id,
                    status,
                    duration_ms,
                } => {
                    let status_str = match status {
                        CaseStatus::Passed => "PASSED".green().bold(),
                        CaseStatus::Failed { .. } => "FAILED".red().bold(),
                        _ => "UNKNOWN".white().bold(),
                    };
                    let duration = duration_ms.map(|d| format!(" ({}ms)", d)).unwrap_or_default();
                    println!("  {} {} [{}]{}", "←".blue(), case_id, status_str, duration);
                    if let CaseStatus::Failed { error } = status {
                        println!("      {}", error.red());
                    }
                }

                TestEvent::ActionStarted { index, action } => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    if let Ok(style) = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("      {spinner} {msg}")
                    {
                        pb.set_style(style);
                    }
                    action_text = format!("[{}] {}... ", index + 1, action.dimmed());
                    pb.set_message(action_text.clone());
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }

                TestEvent::ActionPassed { duration_ms, .. } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("      {} {}({}ms)", "✓".green(), action_text, duration_ms);
                }

                TestEvent::ActionFailed {
                    error, duration_ms, ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("      {} {}({}ms)", "✗".red(), action_text, duration_ms);
                    println!("          {}", error.red());
                }

                TestEvent::Log { message } => {
                    multi.println(format!("      {}", message)).ok();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let emitter = EventEmitter::default();
        emitter.emit(TestEvent::Log {
            message: "nobody listening".into(),
        });
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let (emitter, mut receiver) = EventEmitter::new();
        emitter.emit(TestEvent::CaseStarted {
            case_id: "TC-001".into(),
            title: "登录".into(),
        });
        emitter.emit(TestEvent::ActionStarted {
            index: 0,
            action: "click".into(),
        });

        assert!(matches!(
            receiver.recv().await.unwrap(),
            TestEvent::CaseStarted { case_id, .. } if case_id == "TC-001"
        ));
        assert!(matches!(
            receiver.recv().await.unwrap(),
            TestEvent::ActionStarted { index: 0, .. }
        ));
    }
}
