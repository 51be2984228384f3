pub mod driver;
pub mod parser;
pub mod report;
pub mod runner;
pub mod translator;
pub mod utils;

// Re-export common items
pub use parser::{parse_directory, parse_file, parse_file_content};
pub use report::{aggregate, render, write_reports, TestReport};
pub use runner::{RunError, TestResult, TestRunner};
pub use translator::ActionTranslator;
