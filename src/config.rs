//! Application configuration
//!
//! Loaded from YAML; every section falls back to its defaults so a partial
//! file is valid. Environment variables override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use action_flow::ExecutionConfig;
use action_locator::FunnelConfig;
use llm_provider::OpenAiConfig;
use serde::{Deserialize, Serialize};
use slot_extractor::SlotOptions;
use thiserror::Error;

pub const ENV_LOG_LEVEL: &str = "UIFUNNEL_LOG_LEVEL";
pub const ENV_LLM_API_KEY: &str = "UIFUNNEL_LLM_API_KEY";
pub const ENV_LLM_API_BASE: &str = "UIFUNNEL_LLM_API_BASE";
pub const ENV_LLM_MODEL: &str = "UIFUNNEL_LLM_MODEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub funnel: FunnelConfig,
    pub slots: SlotOptions,
    pub execution: ExecutionConfig,
    /// Reasoning provider; the semantic and visual layers stay off without it
    pub llm: Option<LlmSettings>,
    /// Lexicon tables replacing the built-in ones
    pub lexicon_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            funnel: FunnelConfig::default(),
            slots: SlotOptions::default(),
            execution: ExecutionConfig::default(),
            llm: None,
            lexicon_path: None,
        }
    }
}

impl AppConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = if source.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(source)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.funnel
            .validate()
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if self.slots.max_synonyms > 50 {
            return Err(ConfigError::Invalid(format!(
                "slots.max_synonyms must be at most 50, got {}",
                self.slots.max_synonyms
            )));
        }
        if let Some(llm) = &self.llm {
            if llm.model.trim().is_empty() {
                return Err(ConfigError::Invalid("llm.model must not be empty".into()));
            }
        }
        Ok(())
    }

    /// Apply `UIFUNNEL_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }

        let api_key = lookup(ENV_LLM_API_KEY);
        let api_base = lookup(ENV_LLM_API_BASE);
        let model = lookup(ENV_LLM_MODEL);
        if self.llm.is_none() && api_key.is_some() {
            self.llm = Some(LlmSettings::default());
        }
        if let Some(llm) = self.llm.as_mut() {
            if let Some(key) = api_key {
                llm.api_keys.retain(|existing| existing != &key);
                llm.api_keys.insert(0, key);
            }
            if let Some(base) = api_base {
                llm.api_base = base;
            }
            if let Some(model) = model {
                llm.model = model;
            }
        }
    }
}

/// OpenAI-compatible reasoning provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub api_base: String,
    pub model: String,
    pub vision_model: Option<String>,
    /// Tried in order; rate-limited keys hand over to the next one
    pub api_keys: Vec<String>,
    pub temperature: f32,
    pub timeout_ms: u64,
    /// Wire the provider into the visual layer as well
    pub enable_visual: bool,
}

impl Default for LlmSettings {
    fn default() -> Self {
        let defaults = OpenAiConfig::default();
        Self {
            api_base: defaults.api_base,
            model: defaults.model,
            vision_model: None,
            api_keys: Vec::new(),
            temperature: defaults.temperature,
            timeout_ms: defaults.timeout.as_millis() as u64,
            enable_visual: true,
        }
    }
}

impl LlmSettings {
    pub fn has_credentials(&self) -> bool {
        self.api_keys.iter().any(|key| !key.trim().is_empty())
    }

    pub fn openai_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            api_keys: self.api_keys.clone(),
            model: self.model.clone(),
            vision_model: self.vision_model.clone(),
            api_base: self.api_base.clone(),
            temperature: self.temperature,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AppConfig::from_yaml_str(
            r#"
log_level: debug
funnel:
  attribute_threshold: 0.85
execution:
  settle_ms: 50
"#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.funnel.attribute_threshold, 0.85);
        assert_eq!(config.funnel.spatial_threshold, 0.7);
        assert_eq!(config.execution.settle_ms, 50);
        assert!(config.execution.case.stop_on_failure);
        assert!(config.llm.is_none());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(AppConfig::from_yaml_str("  \n").unwrap(), AppConfig::default());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let err = AppConfig::from_yaml_str("funnel:\n  spatial_threshold: 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("spatial_threshold"));
    }

    #[test]
    fn env_overrides_enable_llm() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_LLM_API_KEY, "sk-env"),
            (ENV_LLM_MODEL, "local-model"),
            (ENV_LOG_LEVEL, "warn"),
            (ENV_LLM_API_BASE, ""),
        ]);
        let mut config = AppConfig::default();
        config.apply_env_overrides(|name| env.get(name).map(|value| value.to_string()));

        assert_eq!(config.log_level, "warn");
        let llm = config.llm.unwrap();
        assert_eq!(llm.api_keys, vec!["sk-env".to_string()]);
        assert_eq!(llm.model, "local-model");
        assert_eq!(llm.api_base, "https://api.openai.com/v1");
        assert!(llm.has_credentials());
    }

    #[test]
    fn env_key_goes_first() {
        let mut config = AppConfig::from_yaml_str(
            "llm:\n  api_keys: [sk-file, sk-env]\n  model: gpt-4o\n",
        )
        .unwrap();
        config.apply_env_overrides(|name| (name == ENV_LLM_API_KEY).then(|| "sk-env".to_string()));
        let llm = config.llm.unwrap();
        assert_eq!(llm.api_keys, vec!["sk-env".to_string(), "sk-file".to_string()]);
        assert_eq!(llm.openai_config().model, "gpt-4o");
    }
}
