//! Pipeline configuration: schema, brand list, defaults, prompt template
//! and LLM backend settings. Every field has a default, so an empty JSON
//! object is a complete configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::categorize::CategorizationSchema;
use crate::pipeline::llm::DEFAULT_PROMPT_TEMPLATE;
use crate::pipeline::rules::lexicon::{canonical_unit, DEFAULT_BRANDS};
use crate::pipeline::synthesize::MAX_SHORT_DESCRIPTION_LEN;

/// Application-level constants
pub const APP_NAME: &str = "materialtext";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_LLM_URL: &str = "MATERIALTEXT_LLM_URL";
pub const ENV_LLM_MODEL: &str = "MATERIALTEXT_LLM_MODEL";

/// Filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "materialtext=info"
}

/// `<user config dir>/materialtext/config.json`, when the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.json"))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// When the orchestrator calls the LLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmMode {
    /// Every non-empty record.
    #[default]
    Always,
    /// Only when rules found no characteristics or a one-word product name.
    WhenSparse,
    /// Rules only.
    Never,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub base_url: String,
    /// Deadline for one call, in seconds.
    pub timeout_secs: u64,
    /// Attempts per record including the first; at least 1.
    pub max_attempts: u32,
    /// Backoff before attempt n+1 is `retry_backoff_ms * n`.
    pub retry_backoff_ms: u64,
    pub mode: LlmMode,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gemma3:latest".into(),
            base_url: "http://localhost:11434".into(),
            timeout_secs: 60,
            max_attempts: 3,
            retry_backoff_ms: 2000,
            mode: LlmMode::Always,
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self, attempt: u32) -> std::time::Duration {
        std::time::Duration::from_millis(self.retry_backoff_ms.saturating_mul(attempt as u64))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Records processed (and LLM calls in flight) at once.
    pub max_in_flight: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { max_in_flight: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub default_unit_of_measure: String,
    pub short_description_max_len: usize,
    pub known_brands: Vec<String>,
    /// Added to the built-in alloy and polymer codes.
    pub extra_material_codes: Vec<String>,
    pub prompt_template: String,
    pub schema: CategorizationSchema,
    pub llm: LlmSettings,
    pub batch: BatchSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_unit_of_measure: "ST".into(),
            short_description_max_len: MAX_SHORT_DESCRIPTION_LEN,
            known_brands: DEFAULT_BRANDS.iter().map(|b| b.to_string()).collect(),
            extra_material_codes: Vec::new(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.into(),
            schema: CategorizationSchema::default(),
            llm: LlmSettings::default(),
            batch: BatchSettings::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// The file at [`default_config_path`] if it exists, else defaults;
    /// environment overrides applied on top.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match default_config_path() {
            Some(path) if path.exists() => Self::from_path(&path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override LLM backend settings from `lookup` (the process environment
    /// in production). Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |key| lookup(key).filter(|v: &String| !v.trim().is_empty());
        if let Some(url) = non_blank(ENV_LLM_URL) {
            tracing::debug!(url = %url, "LLM URL overridden from environment");
            self.llm.base_url = url;
        }
        if let Some(model) = non_blank(ENV_LLM_MODEL) {
            tracing::debug!(model = %model, "LLM model overridden from environment");
            self.llm.model = model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_SHORT_DESCRIPTION_LEN).contains(&self.short_description_max_len) {
            return Err(ConfigError::Invalid(format!(
                "short_description_max_len must be between 1 and {MAX_SHORT_DESCRIPTION_LEN}, got {}",
                self.short_description_max_len
            )));
        }
        if canonical_unit(&self.default_unit_of_measure).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown default_unit_of_measure '{}'",
                self.default_unit_of_measure
            )));
        }
        if self.llm.max_attempts == 0 {
            return Err(ConfigError::Invalid("llm.max_attempts must be at least 1".into()));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Invalid("llm.timeout_secs must be at least 1".into()));
        }
        if self.batch.max_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "batch.max_in_flight must be at least 1".into(),
            ));
        }
        if !self.prompt_template.contains("{text}") {
            return Err(ConfigError::Invalid(
                "prompt_template must contain the {text} placeholder".into(),
            ));
        }
        self.schema.validate().map_err(ConfigError::Invalid)
    }
}
