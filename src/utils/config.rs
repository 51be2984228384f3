use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How to reach the automation server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum ServerConfig {
    /// Spawn the server and talk over stdin/stdout
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Connect to an already running server
    Http { url: String },
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig::Stdio {
            command: "npx".to_string(),
            args: vec![
                "@playwright/mcp@latest".to_string(),
                "--headless".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorMode {
    #[default]
    Rules,
    Llm,
}

/// Step translation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslatorConfig {
    pub mode: TranslatorMode,
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Use rule-based translation when the reasoning service fails
    pub fallback_to_rules: bool,
    pub request_timeout_ms: u64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            mode: TranslatorMode::Rules,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            fallback_to_rules: true,
            request_timeout_ms: 60000,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub server: ServerConfig,

    /// Bound on every tool call to the automation server (ms)
    pub invoke_timeout_ms: u64,

    /// Timeout for `wait` actions that do not carry one (ms)
    pub default_wait_timeout_ms: u64,

    pub translator: TranslatorConfig,

    /// Output directory for reports and screenshots
    pub output_dir: PathBuf,

    /// Capture a screenshot after a failed action
    pub screenshot_on_failure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            invoke_timeout_ms: 30000,
            default_wait_timeout_ms: 5000,
            translator: TranslatorConfig::default(),
            output_dir: PathBuf::from("./output"),
            screenshot_on_failure: true,
        }
    }
}

impl Config {
    /// Load from a YAML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {}", p.display()))?;
                Self::from_yaml(&content)
                    .with_context(|| format!("Failed to parse config file: {}", p.display()))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply `NLCR_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("NLCR_SERVER_URL").filter(|v| !v.is_empty()) {
            self.server = ServerConfig::Http { url };
        } else if let Some(command) = lookup("NLCR_SERVER_COMMAND").filter(|v| !v.is_empty()) {
            let mut parts = command.split_whitespace().map(str::to_string);
            if let Some(program) = parts.next() {
                self.server = ServerConfig::Stdio {
                    command: program,
                    args: parts.collect(),
                };
            }
        }

        if let Some(ms) = lookup("NLCR_INVOKE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.invoke_timeout_ms = ms;
        }
        if let Some(mode) = lookup("NLCR_TRANSLATOR") {
            match mode.to_lowercase().as_str() {
                "llm" => self.translator.mode = TranslatorMode::Llm,
                "rules" => self.translator.mode = TranslatorMode::Rules,
                other => log::warn!("Ignoring unknown NLCR_TRANSLATOR value: {}", other),
            }
        }
        if let Some(url) = lookup("NLCR_LLM_BASE_URL") {
            self.translator.base_url = url;
        }
        if let Some(model) = lookup("NLCR_LLM_MODEL") {
            self.translator.model = model;
        }
        if let Some(dir) = lookup("NLCR_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
    }
}
