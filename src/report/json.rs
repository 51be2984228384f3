use super::types::{aggregate, TestReport};
use crate::runner::state::TestResult;
use anyhow::{Context, Result};
use std::path::Path;

pub fn to_json(report: &TestReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Load a saved report, or a bare list of results which is aggregated on the fly
pub fn load(path: &Path) -> Result<TestReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read results from {}", path.display()))?;
    if let Ok(report) = serde_json::from_str::<TestReport>(&content) {
        return Ok(report);
    }
    let results: Vec<TestResult> = serde_json::from_str(&content)
        .with_context(|| format!("{} is neither a report nor a list of results", path.display()))?;
    Ok(aggregate(results))
}
