use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a case document into a `CaseFile`
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{name}: unsupported document type (expected .md, .markdown, .yaml or .yml)")]
    UnsupportedFormat { name: String },

    #[error("{name}: invalid YAML: {source}")]
    Yaml {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{name}: test case #{index} is missing required field '{field}'")]
    MissingField {
        name: String,
        index: usize,
        field: &'static str,
    },

    #[error("{name}: test case '{id}' has no steps")]
    NoSteps { name: String, id: String },

    #[error("{name}: duplicate test case id '{id}'")]
    DuplicateId { name: String, id: String },

    #[error("{name}: no test cases found")]
    NoTestCases { name: String },
}
