//! # Configuration
//!
//! Manages the loading and validation of the agent's configuration file (`config.yaml`).
//! Every section has defaults, so an empty or missing file yields a working agent.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure.
/// Matches the layout of `config.yaml`.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub processes: ProcessConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentSection {
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default = "default_true")]
    pub enable_safety_checks: bool,
    #[serde(default = "default_action_history")]
    pub max_action_history: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            enable_safety_checks: true,
            max_action_history: default_action_history(),
        }
    }
}

/// Filesystem policy and limits.
#[derive(Debug, Deserialize, Clone)]
pub struct FilesConfig {
    /// Whitelist. Empty means no whitelist restriction.
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    /// Blacklist. `None` falls back to the OS system directories.
    #[serde(default)]
    pub restricted_paths: Option<Vec<String>>,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            allowed_paths: Vec::new(),
            restricted_paths: None,
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

impl FilesConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessConfig {
    /// Seconds a synchronous launch may run.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AutomationConfig {
    /// Abort automation while the pointer sits in a screen corner.
    #[serde(default = "default_true")]
    pub fail_safe: bool,
    /// Minimum pause between two automation calls.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            fail_safe: true,
            pause_ms: default_pause_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    #[serde(default)]
    pub thresholds: ResourceThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            thresholds: ResourceThresholds::default(),
        }
    }
}

/// Default alert thresholds, in percent.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct ResourceThresholds {
    #[serde(default = "default_cpu_threshold")]
    pub cpu_percent: f64,
    #[serde(default = "default_memory_threshold")]
    pub memory_percent: f64,
    #[serde(default = "default_disk_threshold")]
    pub disk_percent: f64,
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            cpu_percent: default_cpu_threshold(),
            memory_percent: default_memory_threshold(),
            disk_percent: default_disk_threshold(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for the rolling log file. `None` uses the platform data dir.
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default = "default_log_file")]
    pub file: String,
    #[serde(default = "default_true")]
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            file: default_log_file(),
            console: true,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_agent_name() -> String {
    "ChildAgent".to_string()
}
fn default_action_history() -> usize {
    1000
}
fn default_max_file_size_mb() -> u64 {
    100
}
fn default_timeout() -> u64 {
    30
}
fn default_pause_ms() -> u64 {
    100
}
fn default_history_size() -> usize {
    100
}
fn default_cpu_threshold() -> f64 {
    80.0
}
fn default_memory_threshold() -> f64 {
    75.0
}
fn default_disk_threshold() -> f64 {
    90.0
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file() -> String {
    "deckhand.log".to_string()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl AgentConfig {
    /// Loads `path`, applies environment overrides, and validates the result.
    /// A missing file is not an error: defaults are used.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Self::from_yaml(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a map.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// `DECKHAND_LOG_LEVEL` and `DECKHAND_ALLOWED_PATHS` (`:` or `;` separated).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("DECKHAND_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Some(paths) = lookup("DECKHAND_ALLOWED_PATHS") {
            self.files.allowed_paths = paths
                .split([':', ';'])
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.monitor.thresholds;
        for (name, value) in [
            ("cpu_percent", t.cpu_percent),
            ("memory_percent", t.memory_percent),
            ("disk_percent", t.disk_percent),
        ] {
            if !(0.0..=100.0).contains(&value) {
                bail!("monitor.thresholds.{} must be within 0-100, got {}", name, value);
            }
        }
        if self.processes.timeout == 0 {
            bail!("processes.timeout must be positive");
        }
        if self.monitor.history_size == 0 {
            bail!("monitor.history_size must be positive");
        }
        if self.agent.max_action_history == 0 {
            bail!("agent.max_action_history must be positive");
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            bail!(
                "logging.level must be one of {:?}, got '{}'",
                LOG_LEVELS,
                self.logging.level
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = AgentConfig::from_yaml("").unwrap();
        assert_eq!(config.agent.name, "ChildAgent");
        assert_eq!(config.agent.max_action_history, 1000);
        assert_eq!(config.files.max_file_size_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.processes.timeout, 30);
        assert_eq!(config.monitor.history_size, 100);
        assert_eq!(config.monitor.thresholds.memory_percent, 75.0);
        assert!(config.files.restricted_paths.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
files:
  allowed_paths: ["/tmp/work"]
  max_file_size_mb: 5
monitor:
  thresholds:
    cpu_percent: 60
"#;
        let config = AgentConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.files.allowed_paths, vec!["/tmp/work".to_string()]);
        assert_eq!(config.files.max_file_size_mb, 5);
        assert_eq!(config.monitor.thresholds.cpu_percent, 60.0);
        assert_eq!(config.monitor.thresholds.disk_percent, 90.0);
        assert!(config.automation.fail_safe);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DECKHAND_LOG_LEVEL", "DEBUG"),
            ("DECKHAND_ALLOWED_PATHS", "/a:/b; /c"),
        ]
        .into_iter()
        .collect();
        let mut config = AgentConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.files.allowed_paths, vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AgentConfig::default();
        config.monitor.thresholds.cpu_percent = 120.0;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.processes.timeout = 0;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_file_size_limit_saturates() {
        let config = AgentConfig::from_yaml("files:\n  max_file_size_mb: 18446744073709551615\n").unwrap();
        assert_eq!(config.files.max_file_size_bytes(), u64::MAX);
        assert_eq!(FilesConfig::default().max_file_size_bytes(), 100 * 1024 * 1024);
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = AgentConfig::from_yaml(include_str!("../../config.example.yaml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.files.allowed_paths.len(), 1);
        assert_eq!(config.automation.pause_ms, 100);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = AgentConfig::load(temp_dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config.agent.name, "ChildAgent");
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "agent:\n  name: Tester\n").unwrap();
        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.agent.name, "Tester");
    }
}
