//! Step translation through an OpenAI-compatible chat completion endpoint

use super::rules::RuleTranslator;
use super::validate::decode_actions;
use super::{apply_entry_url, ActionTranslator, TranslateError};
use crate::parser::types::{Action, TestCase};
use crate::utils::config::TranslatorConfig;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

const SYSTEM_PROMPT: &str = r#"You convert manual web test steps into browser actions.
Reply with JSON only: an object {"actions": [...]}. Each action is an object with
"step" (1-based index of the step it implements), "type" and "description".
Allowed types and their fields:
- navigate: url
- click: selector
- wait: optional selector, optional timeout in milliseconds
- verify: expected, optional selector
- fill: selector, text
- select: selector, text
- screenshot
Selectors are the visible label, placeholder or text of the element as written in the step.
A step may produce several actions. Never invent steps that are not described."#;

pub struct LlmTranslator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    fallback: Option<RuleTranslator>,
}

impl LlmTranslator {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
            timeout,
            fallback: None,
        }
    }

    pub fn from_config(config: &TranslatorConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            log::warn!(
                "{} is not set; calling {} without credentials",
                config.api_key_env,
                config.base_url
            );
        }
        let translator = Self::new(
            &config.base_url,
            &config.model,
            api_key,
            Duration::from_millis(config.request_timeout_ms),
        );
        if config.fallback_to_rules {
            translator.with_rule_fallback()
        } else {
            translator
        }
    }

    /// Translate with the rule engine when the service cannot be used
    pub fn with_rule_fallback(mut self) -> Self {
        self.fallback = Some(RuleTranslator::new());
        self
    }

    fn user_prompt(test_case: &TestCase) -> String {
        let mut prompt = format!("Test case {}: {}\n", test_case.id, test_case.title);
        if let Some(url) = &test_case.entry_url {
            prompt.push_str(&format!("Entry URL: {}\n", url));
        }
        if !test_case.preconditions.is_empty() {
            prompt.push_str(&format!("Preconditions: {}\n", test_case.preconditions.join("; ")));
        }
        prompt.push_str("Steps:\n");
        for (i, step) in test_case.steps.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, step));
        }
        if !test_case.expected_results.is_empty() {
            prompt.push_str("Expected results:\n");
            for expected in &test_case.expected_results {
                prompt.push_str(&format!("- {}\n", expected));
            }
        }
        prompt
    }

    async fn complete(&self, test_case: &TestCase) -> Result<String, TranslateError> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": Self::user_prompt(test_case)},
            ],
            "response_format": {"type": "json_object"},
        });

        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TranslateError::Service(format!(
                    "no reply within {}ms",
                    self.timeout.as_millis()
                ))
            } else {
                TranslateError::Service(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TranslateError::Service(format!("HTTP {}: {}", status, text.trim())));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| TranslateError::InvalidResponse(e.to_string()))?;
        json.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| TranslateError::InvalidResponse("missing message content".to_string()))
    }

    async fn translate_remote(&self, test_case: &TestCase) -> Result<Vec<Action>, TranslateError> {
        let content = self.complete(test_case).await?;
        let raws = extract_json_payload(&content)?;
        log::debug!("{} returned {} raw actions for {}", self.model, raws.len(), test_case.id);

        let actions = raws
            .iter()
            .flat_map(|raw| {
                let step = raw
                    .get("step")
                    .and_then(Value::as_u64)
                    .and_then(|n| test_case.steps.get((n as usize).checked_sub(1)?))
                    .map(String::as_str)
                    .unwrap_or(test_case.title.as_str());
                decode_actions(std::slice::from_ref(raw), step)
            })
            .collect();
        Ok(actions)
    }
}

#[async_trait]
impl ActionTranslator for LlmTranslator {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn translate(&self, test_case: &TestCase) -> Result<Vec<Action>, TranslateError> {
        let actions = match self.translate_remote(test_case).await {
            Ok(actions) => actions,
            Err(e) => match &self.fallback {
                Some(rules) => {
                    log::warn!(
                        "Translation of {} via {} failed ({}), using rules",
                        test_case.id,
                        self.model,
                        e
                    );
                    rules.translate_steps(test_case)
                }
                None => return Err(e),
            },
        };
        Ok(apply_entry_url(actions, test_case.entry_url.as_deref()))
    }
}

/// Pull the action list out of a model reply
///
/// Accepts a bare array or an object with an `actions` array, optionally
/// wrapped in a markdown code fence.
pub fn extract_json_payload(content: &str) -> Result<Vec<Value>, TranslateError> {
    let mut text = content.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        text = rest.trim().trim_end_matches("```").trim();
    }

    let value: Value = serde_json::from_str(text).or_else(|first_err| {
        // Tolerate prose around the JSON body
        let start = text.find(['{', '[']);
        let end = text.rfind(['}', ']']);
        let retried: Result<Value, serde_json::Error> = match (start, end) {
            (Some(s), Some(e)) if s < e => serde_json::from_str(&text[s..=e]),
            _ => Err(first_err),
        };
        retried.map_err(|e| TranslateError::InvalidResponse(e.to_string()))
    })?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove("actions") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(TranslateError::InvalidResponse(
                "expected an \"actions\" array".to_string(),
            )),
        },
        _ => Err(TranslateError::InvalidResponse(
            "expected a JSON array or object".to_string(),
        )),
    }
}
