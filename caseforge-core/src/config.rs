//! Centralized configuration for the caseforge toolchain.
//!
//! Lives at `~/.caseforge/config.toml`. Credentials may reference environment
//! variables with `${VAR}` so the file itself never has to hold a key.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CaseError, Result};

static ENV_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseforgeConfig {
    /// Model that writes the test cases.
    pub writer: ModelConfig,
    /// Model that reviews them. Absent means single-role generation.
    pub reviewer: Option<ModelConfig>,
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// One model-completion endpoint with its generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Conversational turn ceiling enforced by the team engine.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Token whose appearance in reviewer output completes the conversation.
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
    /// Per-call timeout for model requests.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    2048
}
fn default_temperature() -> f32 {
    0.4
}
fn default_top_p() -> f32 {
    0.9
}
fn default_max_turns() -> u32 {
    10
}
fn default_sentinel() -> String {
    crate::transcript::DEFAULT_SENTINEL.to_owned()
}
fn default_timeout_secs() -> u64 {
    1800
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            sentinel: default_sentinel(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl ModelConfig {
    fn expand(&mut self) {
        self.api_key = expand_string(&self.api_key);
        self.base_url = expand_string(&self.base_url);
    }
}

impl CaseforgeConfig {
    /// Load config from `~/.caseforge/config.toml`.
    ///
    /// Fails hard with an actionable error if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CaseError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| CaseError::ConfigRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| CaseError::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.writer.expand();
        if let Some(reviewer) = config.reviewer.as_mut() {
            reviewer.expand();
        }

        Ok(config)
    }

    /// Get config file path: `~/.caseforge/config.toml`
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".caseforge/config.toml")
    }

    /// Reject configurations that would fail mid-run for a missing credential.
    pub fn validate_credentials(&self) -> Result<()> {
        if self.writer.api_key.trim().is_empty() {
            return Err(CaseError::config("writer api_key is not set"));
        }
        if let Some(reviewer) = &self.reviewer {
            if reviewer.api_key.trim().is_empty() {
                return Err(CaseError::config("reviewer api_key is not set"));
            }
        }
        Ok(())
    }

    /// Save config to file, creating the directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| CaseError::config(format!("failed to serialize config: {e}")))?;

        fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Starter config written by `caseforge config init`.
    pub fn example() -> Self {
        Self {
            writer: ModelConfig {
                api_key: "${CASEFORGE_WRITER_API_KEY}".to_owned(),
                base_url: "https://api.example.com/v1".to_owned(),
                model: "doubao-chat".to_owned(),
                max_tokens: default_max_tokens(),
                temperature: default_temperature(),
                top_p: default_top_p(),
            },
            reviewer: Some(ModelConfig {
                api_key: "${CASEFORGE_REVIEWER_API_KEY}".to_owned(),
                base_url: "https://api.deepseek.com/v1".to_owned(),
                model: "deepseek-chat".to_owned(),
                max_tokens: 4096,
                temperature: 0.7,
                top_p: 0.8,
            }),
            generation: GenerationConfig::default(),
        }
    }
}

/// Expand `${VAR}` references from the environment, leaving unknown
/// references untouched.
fn expand_string(s: &str) -> String {
    ENV_VAR_RE
        .replace_all(s, |caps: &regex::Captures<'_>| {
            env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_owned())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[writer]
api_key = "sk-test"
base_url = "https://api.example.com/v1"
model = "doubao-chat"

[reviewer]
api_key = "sk-review"
base_url = "https://api.deepseek.com/v1"
model = "deepseek-chat"
temperature = 0.7
"#,
        );

        let config = CaseforgeConfig::load_from(&path).unwrap();
        assert_eq!(config.writer.model, "doubao-chat");
        assert_eq!(config.writer.max_tokens, 2048);
        let reviewer = config.reviewer.unwrap();
        assert_eq!(reviewer.temperature, 0.7);
        assert_eq!(config.generation.max_turns, 10);
        assert_eq!(config.generation.sentinel, "APPROVE");
        assert_eq!(config.generation.request_timeout_secs, 1800);
    }

    #[test]
    fn test_missing_file_is_distinguished() {
        let dir = TempDir::new().unwrap();
        let err = CaseforgeConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CaseError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_decode_failure_is_distinguished() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "not valid toml [[[");
        let err = CaseforgeConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, CaseError::ConfigParse { .. }));
    }

    #[test]
    fn test_env_expansion_in_credentials() {
        env::set_var("CASEFORGE_TEST_KEY", "sk-from-env");
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[writer]
api_key = "${CASEFORGE_TEST_KEY}"
base_url = "https://api.example.com/v1"
model = "doubao-chat"
"#,
        );

        let config = CaseforgeConfig::load_from(&path).unwrap();
        assert_eq!(config.writer.api_key, "sk-from-env");
        env::remove_var("CASEFORGE_TEST_KEY");
    }

    #[test]
    fn test_unknown_reference_left_untouched() {
        assert_eq!(
            expand_string("${CASEFORGE_DEFINITELY_UNSET_VAR}"),
            "${CASEFORGE_DEFINITELY_UNSET_VAR}"
        );
    }

    #[test]
    fn test_missing_credential_rejected() {
        let mut config = CaseforgeConfig::example();
        config.writer.api_key = String::new();
        let err = config.validate_credentials().unwrap_err();
        assert!(matches!(err, CaseError::Config { .. }));
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");
        CaseforgeConfig::example().save_to(&path).unwrap();
        let reloaded = CaseforgeConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.writer.model, "doubao-chat");
    }
}
