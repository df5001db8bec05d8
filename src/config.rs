use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Runtime settings. Every field has a default, so a settings file only
/// needs the values it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// How often open workflows are re-evaluated to trigger automatic
    /// actions and decisions.
    pub beat_seconds: u64,
    /// Graphviz executable used for svg output.
    pub dot_binary: String,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            beat_seconds: 300,
            dot_binary: "dot".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))
    }

    pub fn beat(&self) -> Duration {
        Duration::from_secs(self.beat_seconds.max(1))
    }

    pub fn level(&self) -> Result<tracing::Level> {
        self.log_level
            .parse()
            .map_err(|_| anyhow::anyhow!("Unknown log level: {}", self.log_level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_keep_defaults() {
        let settings: Settings = serde_yaml::from_str("beat_seconds: 60\n").unwrap();
        assert_eq!(settings.beat(), Duration::from_secs(60));
        assert_eq!(settings.dot_binary, "dot");
        assert_eq!(settings.level().unwrap(), tracing::Level::INFO);
    }

    #[test]
    fn unknown_level_is_an_error() {
        let settings = Settings {
            log_level: "chatty".into(),
            ..Settings::default()
        };
        assert!(settings.level().is_err());
    }
}
