use crate::runner::state::TestResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate of a set of test results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Milliseconds from the earliest start to the latest end
    pub duration: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub results: Vec<TestResult>,
}

impl TestReport {
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 * 100.0 / self.total as f64
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Fold results into a report, keeping their order
pub fn aggregate(results: Vec<TestResult>) -> TestReport {
    let passed = results.iter().filter(|r| r.success).count();
    let start_time = results.iter().map(|r| r.start_time).min();
    let end_time = results.iter().map(|r| r.end_time).max();
    let duration = match (start_time, end_time) {
        (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as u64,
        _ => 0,
    };

    TestReport {
        total: results.len(),
        passed,
        failed: results.len() - passed,
        duration,
        start_time,
        end_time,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::TestCase;
    use chrono::Duration;

    fn result(id: &str, success: bool, offset_ms: i64, length_ms: i64) -> TestResult {
        let base = DateTime::parse_from_rfc3339("2024-05-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let start = base + Duration::milliseconds(offset_ms);
        let mut result = TestResult::new(
            TestCase {
                id: id.into(),
                title: id.into(),
                module: "m".into(),
                priority: "P2".into(),
                test_type: "functional".into(),
                preconditions: vec![],
                steps: vec!["s".into()],
                expected_results: vec![],
                entry_url: None,
            },
            start,
            start + Duration::milliseconds(length_ms),
            vec![],
            None,
        );
        result.success = success;
        result
    }

    #[test]
    fn test_aggregate_empty() {
        let report = aggregate(vec![]);
        assert_eq!(report.total, 0);
        assert_eq!(report.passed, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(report.duration, 0);
        assert!(report.start_time.is_none() && report.end_time.is_none());
        assert_eq!(report.pass_rate(), 0.0);
    }

    #[test]
    fn test_aggregate_partitions_and_spans() {
        let report = aggregate(vec![
            result("A", true, 0, 400),
            result("B", false, 500, 1000),
            result("C", true, 1600, 200),
        ]);
        assert_eq!(report.total, 3);
        assert_eq!(report.passed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.duration, 1800);
        assert!(!report.all_passed());
        let ids: Vec<&str> = report.results.iter().map(|r| r.test_case.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }
}
