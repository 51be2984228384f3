use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PRIORITY: &str = "P2";
pub const DEFAULT_TEST_TYPE: &str = "functional";

/// A single test case as authored in a case document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    pub title: String,
    pub module: String,
    pub priority: String,
    pub test_type: String,
    #[serde(default)]
    pub preconditions: Vec<String>,
    pub steps: Vec<String>,
    #[serde(default)]
    pub expected_results: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_url: Option<String>,
}

/// All test cases parsed from one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseFile {
    pub file_path: PathBuf,
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_url: Option<String>,
    pub test_cases: Vec<TestCase>,
}

/// Browser action produced from a test step
///
/// The set of variants is closed: anything a translator produces outside of it is
/// rejected by `translator::validate` before it reaches the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Navigate {
        url: String,
        description: String,
    },
    Click {
        selector: String,
        description: String,
    },
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        /// Milliseconds; the dispatcher applies its default when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
        description: String,
    },
    Verify {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        expected: String,
        description: String,
    },
    Fill {
        selector: String,
        text: String,
        description: String,
    },
    Select {
        selector: String,
        text: String,
        description: String,
    },
    Screenshot {
        description: String,
    },
}

impl Action {
    /// Wire name of the action type
    pub fn action_type(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::Click { .. } => "click",
            Action::Wait { .. } => "wait",
            Action::Verify { .. } => "verify",
            Action::Fill { .. } => "fill",
            Action::Select { .. } => "select",
            Action::Screenshot { .. } => "screenshot",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Action::Navigate { description, .. }
            | Action::Click { description, .. }
            | Action::Wait { description, .. }
            | Action::Verify { description, .. }
            | Action::Fill { description, .. }
            | Action::Select { description, .. }
            | Action::Screenshot { description } => description,
        }
    }

    /// Short human readable form used in progress output
    pub fn display_name(&self) -> String {
        match self {
            Action::Navigate { url, .. } => format!("navigate {}", url),
            Action::Click { selector, .. } => format!("click \"{}\"", selector),
            Action::Wait {
                selector, timeout, ..
            } => match (selector, timeout) {
                (Some(s), _) => format!("wait for \"{}\"", s),
                (None, Some(t)) => format!("wait {}ms", t),
                (None, None) => "wait".to_string(),
            },
            Action::Verify { expected, .. } => format!("verify \"{}\"", expected),
            Action::Fill { selector, text, .. } => format!("fill \"{}\" = \"{}\"", selector, text),
            Action::Select { selector, text, .. } => {
                format!("select \"{}\" in \"{}\"", text, selector)
            }
            Action::Screenshot { .. } => "screenshot".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serializes_with_type_tag() {
        let action = Action::Fill {
            selector: "账号".to_string(),
            text: "admin".to_string(),
            description: "在账号输入框输入admin".to_string(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "fill");
        assert_eq!(json["selector"], "账号");
        assert_eq!(action.action_type(), "fill");
    }

    #[test]
    fn test_wait_omits_absent_fields() {
        let action = Action::Wait {
            selector: None,
            timeout: Some(1000),
            description: "wait".to_string(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert!(json.get("selector").is_none());
        assert_eq!(json["timeout"], 1000);
    }
}
