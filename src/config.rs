//! Workspace-root configuration for a cycle.
//!
//! Loaded once at the start of a cycle from `.dualagent.json`, falling back
//! to the legacy `.checkmate.json` filename for older workspaces. Unknown
//! fields are ignored so a config written for a newer version of this crate
//! still loads.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CURRENT_FILENAME: &str = ".dualagent.json";
const LEGACY_FILENAME: &str = ".checkmate.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Openai,
    Anthropic,
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::Openai),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMode {
    Always,
    Selective,
    FinalOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStrictness {
    Lenient,
    Balanced,
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub builder_provider: String,
    pub builder_model: String,
    pub reviewer_provider: String,
    pub reviewer_model: String,
    pub moderator_provider: String,
    pub moderator_model: String,

    pub test_command: String,
    pub allow_paths: Vec<String>,
    pub max_iterations: u32,
    pub review_mode: ReviewMode,
    pub review_on_test_pass: bool,
    pub enable_moderator: bool,
    pub context_summary_threshold: usize,
    pub review_strictness: ReviewStrictness,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            builder_provider: "anthropic".to_string(),
            builder_model: "claude-sonnet-4-20250514".to_string(),
            reviewer_provider: "anthropic".to_string(),
            reviewer_model: "claude-sonnet-4-20250514".to_string(),
            moderator_provider: "openai".to_string(),
            moderator_model: "gpt-4o".to_string(),
            test_command: "cargo test".to_string(),
            allow_paths: vec!["**/*".to_string()],
            max_iterations: 3,
            review_mode: ReviewMode::Always,
            review_on_test_pass: true,
            enable_moderator: false,
            context_summary_threshold: 2000,
            review_strictness: ReviewStrictness::Balanced,
        }
    }
}

impl Config {
    /// Load configuration from `workspace_root/.dualagent.json`, falling
    /// back to `workspace_root/.checkmate.json`. Returns defaults if neither
    /// file exists — an absent config is not an error.
    pub fn load(workspace_root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let root = workspace_root.as_ref();
        let current = root.join(CURRENT_FILENAME);
        let legacy = root.join(LEGACY_FILENAME);

        let path = if current.exists() {
            Some(current.clone())
        } else if legacy.exists() {
            Some(legacy.clone())
        } else {
            None
        };

        let Some(path) = path else {
            return Ok(Self::default());
        };

        Self::load_from_file(&path)
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::InvalidJson(e.to_string()))
    }

    pub fn builder_provider_kind(&self) -> Result<ProviderKind, ConfigError> {
        self.builder_provider.parse()
    }

    pub fn reviewer_provider_kind(&self) -> Result<ProviderKind, ConfigError> {
        self.reviewer_provider.parse()
    }

    pub fn moderator_provider_kind(&self) -> Result<ProviderKind, ConfigError> {
        self.moderator_provider.parse()
    }

    /// Default config-file path used by a new workspace (never the legacy name).
    pub fn default_path(workspace_root: impl AsRef<Path>) -> PathBuf {
        workspace_root.as_ref().join(CURRENT_FILENAME)
    }
}
