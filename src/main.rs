use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use nl_case_runner::report::{self, ReportFormat};
use nl_case_runner::runner::{ConsoleEventListener, RunError, TestResult, TestRunner};
use nl_case_runner::utils::config::{Config, ServerConfig};
use nl_case_runner::translator::{self, ActionTranslator};
use nl_case_runner::{driver, parser};

#[derive(Parser)]
#[command(name = "nl-case-runner")]
#[command(version)]
#[command(
    about = "Run natural-language web test cases through a browser automation server",
    long_about = None
)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a case document or every document in a directory
    Run {
        /// Path to a case document or directory
        path: PathBuf,

        /// Output directory for reports and screenshots
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report formats to write
        #[arg(short, long, value_enum, value_delimiter = ',', default_value = "markdown,json")]
        format: Vec<ReportFormat>,

        /// Streamable-HTTP endpoint of the automation server, instead of spawning one
        #[arg(long)]
        server_url: Option<String>,
    },

    /// Translate cases into actions without executing them
    Translate {
        /// Path to a case document or directory
        path: PathBuf,
    },

    /// Generate reports from saved JSON results
    Report {
        /// Path to report.json or a JSON list of test results
        results: PathBuf,

        /// Report formats to write
        #[arg(short, long, value_enum, value_delimiter = ',', default_value = "markdown")]
        format: Vec<ReportFormat>,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            path,
            output,
            format,
            server_url,
        } => {
            if let Some(url) = server_url {
                config.server = ServerConfig::Http { url };
            }
            if let Some(dir) = output {
                config.output_dir = dir;
            }
            let all_passed = run(&path, &config, &format).await?;
            if !all_passed {
                std::process::exit(1);
            }
        }

        Commands::Translate { path } => {
            translate(&path, &config).await?;
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            println!(
                "{} Generating reports from: {}",
                "📊".to_string().blue(),
                results.display()
            );
            for file in report::generate_report(&results, &format, &output)? {
                println!("  {}", file.display().to_string().cyan());
            }
        }
    }

    Ok(())
}

/// Run cases and write reports; returns whether everything passed
async fn run(path: &Path, config: &Config, formats: &[ReportFormat]) -> anyhow::Result<bool> {
    println!("{} Running tests from: {}", "▶".green().bold(), path.display());
    println!("  Translator: {:?}", config.translator.mode);
    println!("  Output: {}", config.output_dir.display().to_string().cyan());

    let session = driver::open_session(config);
    let translator = translator::from_config(&config.translator);
    let mut runner = TestRunner::new(session, translator, config);
    let listener = tokio::spawn(ConsoleEventListener::listen(runner.subscribe()));

    let outcome = if path.is_dir() {
        runner.run_all(path).await.map(|batch| {
            let parse_failures = batch.parse_failures.len();
            (batch.results, parse_failures)
        })
    } else {
        runner.run_file(path).await.map(|results| (results, 0))
    };

    // Closing the event channel lets the listener drain and exit
    drop(runner);
    let _ = listener.await;

    let (results, parse_failures, aborted): (Vec<TestResult>, usize, bool) = match outcome {
        Ok((results, parse_failures)) => (results, parse_failures, false),
        Err(RunError::Aborted { completed, source }) => {
            eprintln!("{} {}", "✗".red().bold(), source);
            (completed, 0, true)
        }
        Err(e) => return Err(e).context("Test run failed"),
    };

    let report = report::aggregate(results);
    let files = report::write_reports(&report, &config.output_dir, formats)?;
    for file in &files {
        println!("  Report: {}", file.display().to_string().cyan());
    }
    if parse_failures > 0 {
        println!(
            "  {} {} document(s) could not be parsed",
            "⚠".yellow(),
            parse_failures
        );
    }

    Ok(report.all_passed() && parse_failures == 0 && !aborted)
}

async fn translate(path: &Path, config: &Config) -> anyhow::Result<()> {
    let files = if path.is_dir() {
        let parsed = parser::parse_directory(path)?;
        for failure in &parsed.failures {
            eprintln!("{} {}", "⚠".yellow(), failure.error);
        }
        parsed.files
    } else {
        vec![parser::parse_file(path)?]
    };

    let translator = translator::from_config(&config.translator);
    let mut output = Vec::new();
    for file in &files {
        for case in &file.test_cases {
            let actions = translator
                .translate(case)
                .await
                .with_context(|| format!("Failed to translate {}", case.id))?;
            output.push(serde_json::json!({
                "id": case.id,
                "title": case.title,
                "actions": actions,
            }));
        }
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
