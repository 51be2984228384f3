use super::DraftCase;
use serde::Deserialize;

/// Structured form of a case document
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YamlDocument {
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default, alias = "url", alias = "entry_url")]
    pub entry_url: Option<String>,
    #[serde(default, alias = "cases", alias = "test_cases")]
    pub test_cases: Vec<DraftCase>,
}

/// A document is either the full form or a bare list of cases
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum YamlDocumentInput {
    Cases(Vec<DraftCase>),
    Document(YamlDocument),
}

/// Parse YAML content into header fields and case drafts
pub fn parse_yaml_content(content: &str) -> Result<YamlDocument, serde_yaml::Error> {
    // An empty document deserializes to unit, not a map
    if content.trim().is_empty() {
        return Ok(YamlDocument::default());
    }
    Ok(match serde_yaml::from_str(content)? {
        YamlDocumentInput::Cases(test_cases) => YamlDocument {
            test_cases,
            ..YamlDocument::default()
        },
        YamlDocumentInput::Document(doc) => doc,
    })
}
