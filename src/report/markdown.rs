//! Human readable markdown rendering of a `TestReport`

use super::types::TestReport;
use crate::runner::state::TestResult;
use std::fmt::Write as _;

/// Relative path under the output directory where an action's screenshot is stored
///
/// Case ids repeat across documents, so the result's position in the report
/// leads the file name.
pub fn screenshot_path(result_index: usize, case_id: &str, action_index: usize) -> String {
    let safe: String = case_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!(
        "screenshots/{:03}_{}_{}.png",
        result_index + 1,
        safe,
        action_index + 1
    )
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn status_icon(success: bool) -> &'static str {
    if success {
        "✅"
    } else {
        "❌"
    }
}

/// Render a report; output depends only on the report contents
pub fn render(report: &TestReport) -> String {
    let mut out = String::new();
    out.push_str("# Test Report\n\n");
    out.push_str("| Total | Passed | Failed | Pass rate | Duration |\n");
    out.push_str("|---|---|---|---|---|\n");
    let _ = writeln!(
        out,
        "| {} | {} | {} | {:.1}% | {}ms |",
        report.total,
        report.passed,
        report.failed,
        report.pass_rate(),
        report.duration
    );
    out.push('\n');

    if let (Some(start), Some(end)) = (report.start_time, report.end_time) {
        let _ = writeln!(
            out,
            "Started {} · finished {}\n",
            start.format("%Y-%m-%d %H:%M:%S UTC"),
            end.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    if report.results.is_empty() {
        out.push_str("No test cases were run.\n");
        return out;
    }

    for (index, result) in report.results.iter().enumerate() {
        render_case(&mut out, index, result);
    }
    out
}

fn render_case(out: &mut String, result_index: usize, result: &TestResult) {
    let case = &result.test_case;
    let _ = writeln!(out, "## {} {} {}\n", status_icon(result.success), case.id, case.title);
    let _ = writeln!(
        out,
        "- Module: {} · Priority: {} · Type: {}",
        case.module, case.priority, case.test_type
    );
    if let Some(url) = &case.entry_url {
        let _ = writeln!(out, "- Entry URL: {}", url);
    }
    let _ = writeln!(out, "- Duration: {}ms", result.duration);
    if let Some(error) = &result.error {
        let _ = writeln!(out, "- Error: {}", error);
    }
    if !case.expected_results.is_empty() {
        out.push_str("- Expected:\n");
        for expected in &case.expected_results {
            let _ = writeln!(out, "  - {}", expected);
        }
    }
    out.push('\n');

    if result.action_results.is_empty() {
        out.push_str("_No actions executed._\n\n");
        return;
    }

    out.push_str("| # | Action | Description | Status | Details |\n");
    out.push_str("|---|---|---|---|---|\n");
    for (index, action_result) in result.action_results.iter().enumerate() {
        let outcome = &action_result.result;
        let mut details = match (&outcome.error, outcome.success) {
            (Some(error), false) => cell(error),
            _ => cell(&outcome.message),
        };
        if outcome.screenshot.is_some() {
            let path = screenshot_path(result_index, &case.id, index);
            let _ = write!(details, " [screenshot]({})", path);
        }
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            index + 1,
            action_result.action.action_type,
            cell(&action_result.action.description),
            status_icon(outcome.success),
            details.trim()
        );
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::{Action, TestCase};
    use crate::report::types::aggregate;
    use crate::runner::state::{ActionResult, ExecutionResult};
    use chrono::{DateTime, Utc};

    fn sample_result() -> TestResult {
        let start = DateTime::parse_from_rfc3339("2024-05-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let fill = Action::Fill {
            selector: "账号".into(),
            text: "admin".into(),
            description: "在账号输入框输入admin".into(),
        };
        let verify = Action::Verify {
            selector: None,
            text: None,
            expected: "欢迎".into(),
            description: "验证页面显示\"欢迎\"".into(),
        };
        let mut action_results = vec![
            ActionResult::new(&fill, ExecutionResult::ok("Filled \"账号\"")),
            ActionResult::new(
                &verify,
                ExecutionResult::failed("not found", "expected \"欢迎\", got \"a | b\"")
                    .with_screenshot(Some("iVBOR".into())),
            ),
        ];
        for r in &mut action_results {
            r.timestamp = start;
        }
        TestResult::new(
            TestCase {
                id: "TC-001".into(),
                title: "登录成功".into(),
                module: "登录".into(),
                priority: "P1".into(),
                test_type: "functional".into(),
                preconditions: vec![],
                steps: vec![],
                expected_results: vec!["显示欢迎".into()],
                entry_url: Some("https://app.test/login".into()),
            },
            start,
            start + chrono::Duration::milliseconds(1500),
            action_results,
            None,
        )
    }

    #[test]
    fn test_render_is_deterministic() {
        let report = aggregate(vec![sample_result()]);
        let first = render(&report);
        assert_eq!(first, render(&report.clone()));

        assert!(first.contains("| 1 | 0 | 1 | 0.0% | 1500ms |"));
        assert!(first.contains("## ❌ TC-001 登录成功"));
        assert!(first.contains("| 1 | fill | 在账号输入框输入admin | ✅ | Filled \"账号\" |"));
        assert!(first.contains("a \\| b"));
        assert!(first.contains("[screenshot](screenshots/001_TC-001_2.png)"));
        let fill_at = first.find("| 1 | fill").unwrap();
        let verify_at = first.find("| 2 | verify").unwrap();
        assert!(fill_at < verify_at);
    }

    #[test]
    fn test_render_empty_report() {
        let text = render(&aggregate(vec![]));
        assert!(text.contains("| 0 | 0 | 0 | 0.0% | 0ms |"));
        assert!(text.contains("No test cases were run."));
    }

    #[test]
    fn test_screenshot_path_is_file_safe() {
        assert_eq!(screenshot_path(11, "TC/01 a", 0), "screenshots/012_TC_01_a_1.png");
    }
}
