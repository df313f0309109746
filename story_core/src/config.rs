//! Engine configuration, loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables for the editor core. Missing keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Story addressed under the signed-in user's collection.
    pub story_id: String,

    /// Quiet period after the last draft edit before autosave fires.
    pub autosave_idle_ms: u64,

    /// Id of the scene seeded into an empty story.
    pub start_node_id: String,

    pub default_node_title: String,
    pub default_node_content: String,
    pub default_choice_text: String,

    /// Install the built-in stat catalog when a story has none.
    pub seed_default_stats: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            story_id: "threadr_project_main".to_string(),
            autosave_idle_ms: 1500,
            start_node_id: "start_node".to_string(),
            default_node_title: "New Scene Title".to_string(),
            default_node_content: "Write the descriptive Markdown text for the scene here."
                .to_string(),
            default_choice_text: "New Choice".to_string(),
            seed_default_stats: true,
        }
    }
}

impl EngineConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// The autosave idle window.
    pub fn autosave_idle(&self) -> Duration {
        Duration::from_millis(self.autosave_idle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.autosave_idle(), Duration::from_millis(1500));
        assert_eq!(config.start_node_id, "start_node");
        assert!(config.seed_default_stats);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            story_id = "haunted_manor"
            autosave_idle_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.story_id, "haunted_manor");
        assert_eq!(config.autosave_idle_ms, 250);
        assert_eq!(config.default_choice_text, "New Choice");
    }

    #[test]
    fn test_invalid_toml() {
        let err = EngineConfig::from_toml_str("autosave_idle_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
