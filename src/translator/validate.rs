//! Decode untrusted action objects into the closed `Action` vocabulary
//!
//! Both translators emit loosely shaped JSON; nothing reaches the dispatcher
//! without passing through `decode_action`. Invalid items are replaced with a
//! fallback so one bad step never discards the rest of a case.

use crate::parser::types::Action;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslationValidationError {
    #[error("action is not a JSON object")]
    NotAnObject,

    #[error("action has no type")]
    MissingType,

    #[error("unknown action type '{0}'")]
    UnknownType(String),

    #[error("{action} action is missing required field '{field}'")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    #[error("field '{field}' has an invalid value")]
    InvalidField { field: &'static str },
}

const SELECTOR_KEYS: &[&str] = &["selector", "element", "target", "locator", "label"];
const TEXT_KEYS: &[&str] = &["text", "value", "input", "option"];
const URL_KEYS: &[&str] = &["url", "href", "link"];
const EXPECTED_KEYS: &[&str] = &["expected", "expect", "assertion"];

/// Map a raw type name (including common synonyms) onto the vocabulary
fn canonical_type(raw: &str) -> Option<&'static str> {
    let kind = match raw.trim().to_ascii_lowercase().as_str() {
        "navigate" | "goto" | "open" | "visit" => "navigate",
        "click" | "tap" | "press" => "click",
        "wait" | "waitfor" | "wait_for" | "sleep" => "wait",
        "verify" | "assert" | "check" | "expect" => "verify",
        "fill" | "input" | "type" | "enter" => "fill",
        "select" | "choose" => "select",
        "screenshot" | "capture" => "screenshot",
        _ => return None,
    };
    Some(kind)
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn non_empty_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_string(obj, keys).filter(|s| !s.is_empty())
}

fn timeout_field(obj: &Map<String, Value>) -> Result<Option<u64>, TranslationValidationError> {
    let invalid = TranslationValidationError::InvalidField { field: "timeout" };
    match obj.get("timeout") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(Some)
            .ok_or(invalid),
        Some(Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| invalid),
        Some(_) => Err(invalid),
    }
}

/// Decode one raw action; `step` is used when the object carries no description
pub fn decode_action(raw: &Value, step: &str) -> Result<Action, TranslationValidationError> {
    let obj = raw.as_object().ok_or(TranslationValidationError::NotAnObject)?;
    let raw_type = obj
        .get("type")
        .or_else(|| obj.get("action"))
        .and_then(Value::as_str)
        .ok_or(TranslationValidationError::MissingType)?;
    let kind = canonical_type(raw_type)
        .ok_or_else(|| TranslationValidationError::UnknownType(raw_type.to_string()))?;

    let description = non_empty_string(obj, &["description"]).unwrap_or_else(|| step.to_string());
    let missing = |field| TranslationValidationError::MissingField {
        action: kind,
        field,
    };

    let action = match kind {
        "navigate" => Action::Navigate {
            url: non_empty_string(obj, URL_KEYS).ok_or_else(|| missing("url"))?,
            description,
        },
        "click" => Action::Click {
            selector: non_empty_string(obj, SELECTOR_KEYS).ok_or_else(|| missing("selector"))?,
            description,
        },
        "wait" => Action::Wait {
            selector: non_empty_string(obj, SELECTOR_KEYS),
            timeout: timeout_field(obj)?,
            description,
        },
        "verify" => {
            let selector = non_empty_string(obj, SELECTOR_KEYS);
            let text = non_empty_string(obj, TEXT_KEYS);
            let expected = non_empty_string(obj, EXPECTED_KEYS)
                .or_else(|| text.clone())
                .ok_or_else(|| missing("expected"))?;
            Action::Verify {
                selector,
                text,
                expected,
                description,
            }
        }
        "fill" => Action::Fill {
            selector: non_empty_string(obj, SELECTOR_KEYS).ok_or_else(|| missing("selector"))?,
            // An empty string is a legitimate value (clearing a field)
            text: first_string(obj, TEXT_KEYS).ok_or_else(|| missing("text"))?,
            description,
        },
        "select" => Action::Select {
            selector: non_empty_string(obj, SELECTOR_KEYS).ok_or_else(|| missing("selector"))?,
            text: non_empty_string(obj, TEXT_KEYS).ok_or_else(|| missing("text"))?,
            description,
        },
        _ => Action::Screenshot { description },
    };
    Ok(action)
}

/// Substitute for an action that failed validation
///
/// Salvages an assertion when the raw object states what it expected; otherwise
/// the step becomes a screenshot so its position in the run still leaves evidence.
pub fn fallback_action(raw: &Value, step: &str, error: &TranslationValidationError) -> Action {
    let obj = raw.as_object();
    let description = obj
        .and_then(|o| non_empty_string(o, &["description"]))
        .unwrap_or_else(|| step.to_string());

    if let Some(expected) = obj.and_then(|o| non_empty_string(o, EXPECTED_KEYS)) {
        return Action::Verify {
            selector: obj.and_then(|o| non_empty_string(o, SELECTOR_KEYS)),
            text: None,
            expected,
            description,
        };
    }

    Action::Screenshot {
        description: format!("{} [untranslated: {}]", description, error),
    }
}

/// Decode a batch of raw actions, replacing each invalid one with its fallback
pub fn decode_actions(raws: &[Value], step: &str) -> Vec<Action> {
    raws.iter()
        .map(|raw| {
            decode_action(raw, step).unwrap_or_else(|e| {
                log::warn!("Rejected translated action {}: {}", raw, e);
                fallback_action(raw, step, &e)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_each_variant() {
        let navigate =
            decode_action(&json!({"type": "navigate", "url": "https://a.test"}), "open").unwrap();
        assert_eq!(
            navigate,
            Action::Navigate {
                url: "https://a.test".into(),
                description: "open".into()
            }
        );

        let wait = decode_action(&json!({"type": "wait", "timeout": "1500"}), "w").unwrap();
        assert!(matches!(wait, Action::Wait { selector: None, timeout: Some(1500), .. }));

        let fill = decode_action(
            &json!({"type": "input", "element": "账号", "value": "admin", "description": "d"}),
            "s",
        )
        .unwrap();
        assert_eq!(
            fill,
            Action::Fill {
                selector: "账号".into(),
                text: "admin".into(),
                description: "d".into()
            }
        );

        let verify = decode_action(&json!({"type": "assert", "text": "欢迎"}), "v").unwrap();
        assert!(matches!(verify, Action::Verify { ref expected, .. } if expected == "欢迎"));

        let shot = decode_action(&json!({"action": "screenshot"}), "s").unwrap();
        assert_eq!(shot.action_type(), "screenshot");
    }

    #[test]
    fn test_rejects_invalid_shapes() {
        assert_eq!(
            decode_action(&json!("click"), "s"),
            Err(TranslationValidationError::NotAnObject)
        );
        assert_eq!(
            decode_action(&json!({"selector": "x"}), "s"),
            Err(TranslationValidationError::MissingType)
        );
        assert_eq!(
            decode_action(&json!({"type": "hover", "selector": "x"}), "s"),
            Err(TranslationValidationError::UnknownType("hover".into()))
        );
        assert_eq!(
            decode_action(&json!({"type": "navigate"}), "s"),
            Err(TranslationValidationError::MissingField {
                action: "navigate",
                field: "url"
            })
        );
        assert_eq!(
            decode_action(&json!({"type": "wait", "timeout": -5}), "s"),
            Err(TranslationValidationError::InvalidField { field: "timeout" })
        );
    }

    #[test]
    fn test_fallbacks() {
        let raw = json!({"type": "hover", "expected": "菜单展开"});
        let err = decode_action(&raw, "悬停菜单").unwrap_err();
        let fallback = fallback_action(&raw, "悬停菜单", &err);
        assert!(matches!(fallback, Action::Verify { ref expected, .. } if expected == "菜单展开"));

        let raw = [
            json!({"type": "navigate"}),
            json!({"type": "click", "selector": "OK"}),
        ];
        let actions = decode_actions(&raw, "step");
        assert_eq!(actions.len(), 2);
        assert!(matches!(
            &actions[0],
            Action::Screenshot { description } if description.contains("untranslated")
        ));
        assert_eq!(actions[1].action_type(), "click");
    }
}
