pub mod llm;
pub mod rules;
pub mod validate;

use crate::parser::types::{Action, TestCase};
use crate::utils::config::{TranslatorConfig, TranslatorMode};
use async_trait::async_trait;
use thiserror::Error;

pub use llm::LlmTranslator;
pub use rules::RuleTranslator;
pub use validate::TranslationValidationError;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("reasoning service request failed: {0}")]
    Service(String),

    #[error("reasoning service returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// Turns the natural-language steps of a case into browser actions
#[async_trait]
pub trait ActionTranslator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Translate every step of `test_case`, in step order
    ///
    /// Implementations return only validated actions with the entry URL applied.
    async fn translate(&self, test_case: &TestCase) -> Result<Vec<Action>, TranslateError>;
}

/// Pin navigation to the case's entry URL
///
/// Every navigate action is rewritten to `entry_url`; when the translation
/// produced no navigation at all, one is prepended so the case starts on its page.
pub fn apply_entry_url(mut actions: Vec<Action>, entry_url: Option<&str>) -> Vec<Action> {
    let Some(entry) = entry_url.filter(|u| !u.trim().is_empty()) else {
        return actions;
    };

    let mut navigated = false;
    for action in actions.iter_mut() {
        if let Action::Navigate { url, .. } = action {
            if url.as_str() != entry {
                log::debug!("Rewriting navigation {} -> {}", url, entry);
                *url = entry.to_string();
            }
            navigated = true;
        }
    }

    if !navigated {
        actions.insert(
            0,
            Action::Navigate {
                url: entry.to_string(),
                description: format!("Open {}", entry),
            },
        );
    }
    actions
}

/// Build the translator selected in configuration
pub fn from_config(config: &TranslatorConfig) -> Box<dyn ActionTranslator> {
    match config.mode {
        TranslatorMode::Rules => Box::new(RuleTranslator::new()),
        TranslatorMode::Llm => Box::new(LlmTranslator::from_config(config)),
    }
}
