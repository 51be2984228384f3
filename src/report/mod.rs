pub mod json;
pub mod junit;
pub mod markdown;
pub mod types;

use anyhow::{Context, Result};
use base64::Engine;
use std::path::{Path, PathBuf};

pub use markdown::render;
pub use types::{aggregate, TestReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Markdown,
    Json,
    Junit,
}

impl ReportFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            ReportFormat::Markdown => "report.md",
            ReportFormat::Json => "report.json",
            ReportFormat::Junit => "junit.xml",
        }
    }

    fn generate(self, report: &TestReport) -> Result<String> {
        match self {
            ReportFormat::Markdown => Ok(markdown::render(report)),
            ReportFormat::Json => json::to_json(report),
            ReportFormat::Junit => junit::generate_junit_xml(report),
        }
    }
}

/// Decode captured screenshots into `output_dir/screenshots`
fn write_screenshots(report: &TestReport, output_dir: &Path) -> Result<usize> {
    let mut written = 0;
    for (result_index, result) in report.results.iter().enumerate() {
        for (index, action_result) in result.action_results.iter().enumerate() {
            let Some(data) = &action_result.result.screenshot else {
                continue;
            };
            let bytes = match base64::engine::general_purpose::STANDARD.decode(data.trim()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!(
                        "Skipping undecodable screenshot for {}: {}",
                        result.test_case.id,
                        e
                    );
                    continue;
                }
            };
            let relative = markdown::screenshot_path(result_index, &result.test_case.id, index);
            let path = output_dir.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, bytes)
                .with_context(|| format!("Failed to write screenshot {}", path.display()))?;
            written += 1;
        }
    }
    Ok(written)
}

/// Write the report in each format to `output_dir`, returning the written report files
pub fn write_reports(
    report: &TestReport,
    output_dir: &Path,
    formats: &[ReportFormat],
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let screenshots = write_screenshots(report, output_dir)?;
    if screenshots > 0 {
        log::info!(
            "Saved {} screenshot(s) to {}",
            screenshots,
            output_dir.join("screenshots").display()
        );
    }

    let mut written = Vec::with_capacity(formats.len());
    for format in formats {
        let path = output_dir.join(format.file_name());
        std::fs::write(&path, format.generate(report)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Generated {:?} report: {}", format, path.display());
        written.push(path);
    }
    Ok(written)
}

/// Re-render reports from saved JSON results
pub fn generate_report(
    results_path: &Path,
    formats: &[ReportFormat],
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let report = json::load(results_path)?;
    write_reports(&report, output_dir, formats)
}
