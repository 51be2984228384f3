use super::types::TestReport;
use crate::runner::state::TestResult;
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

/// Generate a JUnit XML document, one test suite per module
pub fn generate_junit_xml(report: &TestReport) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "nl-case-runner"));
    suites_start.push_attribute(("tests", report.total.to_string().as_str()));
    suites_start.push_attribute(("failures", report.failed.to_string().as_str()));
    suites_start.push_attribute(("time", seconds(report.duration).as_str()));
    writer.write_event(Event::Start(suites_start))?;

    // Modules in order of first appearance
    let mut modules: Vec<&str> = Vec::new();
    for result in &report.results {
        let module = result.test_case.module.as_str();
        if !modules.contains(&module) {
            modules.push(module);
        }
    }

    for module in modules {
        let cases: Vec<&TestResult> = report
            .results
            .iter()
            .filter(|r| r.test_case.module == module)
            .collect();
        let failures = cases.iter().filter(|r| !r.success).count();
        let time: u64 = cases.iter().map(|r| r.duration).sum();

        let mut suite_start = BytesStart::new("testsuite");
        suite_start.push_attribute(("name", module));
        suite_start.push_attribute(("tests", cases.len().to_string().as_str()));
        suite_start.push_attribute(("failures", failures.to_string().as_str()));
        suite_start.push_attribute(("time", seconds(time).as_str()));
        if let Some(first) = cases.first() {
            suite_start.push_attribute(("timestamp", first.start_time.to_rfc3339().as_str()));
        }
        writer.write_event(Event::Start(suite_start))?;

        for result in cases {
            write_test_case(&mut writer, result)?;
        }

        writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let xml = String::from_utf8(writer.into_inner().into_inner())?;
    Ok(xml)
}

fn write_test_case<W: std::io::Write>(writer: &mut Writer<W>, result: &TestResult) -> Result<()> {
    let case = &result.test_case;
    let name = format!("{} {}", case.id, case.title);

    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", name.as_str()));
    case_start.push_attribute(("classname", case.module.as_str()));
    case_start.push_attribute(("time", seconds(result.duration).as_str()));
    writer.write_event(Event::Start(case_start))?;

    if !result.success {
        let message = result.first_error().unwrap_or("Unknown error");
        let mut fail_start = BytesStart::new("failure");
        fail_start.push_attribute(("message", message));
        fail_start.push_attribute(("type", "AssertionError"));
        writer.write_event(Event::Start(fail_start))?;
        writer.write_event(Event::Text(BytesText::new(message)))?;
        writer.write_event(Event::End(BytesEnd::new("failure")))?;
    }

    // Action log for CI viewers
    let log: Vec<String> = result
        .action_results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let status = if r.result.success { "ok" } else { "FAILED" };
            let detail = r.result.error.as_deref().unwrap_or(r.result.message.as_str());
            format!(
                "{}. [{}] {} - {}: {}",
                i + 1,
                r.action.action_type,
                r.action.description,
                status,
                detail
            )
        })
        .collect();
    if !log.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("system-out")))?;
        writer.write_event(Event::Text(BytesText::new(&log.join("\n"))))?;
        writer.write_event(Event::End(BytesEnd::new("system-out")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}
