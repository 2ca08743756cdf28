//! Runtime configuration.
//!
//! Durations are written human-readable in YAML ("120s", "2m") and
//! parsed with `humantime`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Which judge coordination strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeStrategy {
    /// One concurrent provider call per rubric domain.
    #[default]
    FanOut,
    /// A single call that scores every domain internally.
    Delegated,
}

/// Harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory holding scenario files.
    pub scenarios_dir: PathBuf,

    /// Directory receiving run artifacts, the ledger, and the progress log.
    pub results_dir: PathBuf,

    /// Timeout for one agent invocation.
    #[serde(with = "human_duration")]
    pub agent_timeout: Duration,

    /// Timeout for one judge call.
    #[serde(with = "human_duration")]
    pub judge_timeout: Duration,

    /// Branch qualifier for ledger entries.
    pub branch: Option<String>,

    /// Judge coordination strategy.
    pub judge_strategy: JudgeStrategy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scenarios_dir: PathBuf::from("scenarios"),
            results_dir: PathBuf::from("runs"),
            agent_timeout: Duration::from_secs(120),
            judge_timeout: Duration::from_secs(60),
            branch: None,
            judge_strategy: JudgeStrategy::FanOut,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Path of the cumulative ledger file.
    pub fn ledger_path(&self) -> PathBuf {
        self.results_dir.join("ledger.json")
    }

    /// Path of the live progress log.
    pub fn progress_path(&self) -> PathBuf {
        self.results_dir.join("progress.log")
    }
}

/// Serde adapter for humantime-formatted durations.
mod human_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(d)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.agent_timeout, Duration::from_secs(120));
        assert_eq!(config.judge_timeout, Duration::from_secs(60));
        assert_eq!(config.judge_strategy, JudgeStrategy::FanOut);
        assert_eq!(config.ledger_path(), PathBuf::from("runs/ledger.json"));
    }

    #[test]
    fn test_yaml_with_humantime_durations() {
        let yaml = r#"
scenarios_dir: "my-scenarios"
agent_timeout: "2m"
judge_timeout: "45s"
judge_strategy: delegated
branch: "feature-x"
"#;
        let config: RuntimeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.scenarios_dir, PathBuf::from("my-scenarios"));
        assert_eq!(config.agent_timeout, Duration::from_secs(120));
        assert_eq!(config.judge_timeout, Duration::from_secs(45));
        assert_eq!(config.judge_strategy, JudgeStrategy::Delegated);
        assert_eq!(config.branch.as_deref(), Some("feature-x"));
        // Unspecified fields keep their defaults.
        assert_eq!(config.results_dir, PathBuf::from("runs"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = RuntimeConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: RuntimeConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.agent_timeout, config.agent_timeout);
    }
}
