//! Configuration management for the rollup engine.
//!
//! This module provides:
//! - YAML file support
//! - CLI argument overrides
//! - Validation and defaults
//! - Rule file watching with atomic rule set replacement

use crate::core::{Result, RollupError};
use crate::rollup::{RawRules, Rules, RulesHandle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Rule file reload configuration
    pub reload: ReloadConfig,
    /// Rollup rules
    pub rollup: RawRules,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured logging format
    pub structured: bool,
}

/// Reload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Watch the configuration file for rule changes
    pub enabled: bool,
    /// Quiet period after a change before reloading
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        ReloadConfig {
            enabled: true,
            debounce: Duration::from_millis(250),
        }
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl Config {
    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| RollupError::config(format!("Failed to parse YAML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RollupError::config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_yaml(&content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for pattern in &self.rollup.pattern {
            if let Some(tier) = pattern.retention.iter().find(|r| r.precision == 0) {
                return Err(RollupError::config(format!(
                    "Pattern {} has zero precision at age {}",
                    pattern.label(),
                    tier.age
                )));
            }
        }

        if self.reload.enabled && self.reload.debounce > Duration::from_secs(60) {
            return Err(RollupError::config(format!(
                "Reload debounce must be at most 60s, got {:?}",
                self.reload.debounce
            )));
        }

        Ok(())
    }

    /// Compile the configured rules against the built-in functions
    pub fn compile_rules(&self) -> Result<Rules> {
        Rules::compile(self.rollup.clone())
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| RollupError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set rollup rules
    pub fn rules(mut self, rules: RawRules) -> Self {
        self.config.rollup = rules;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Enable or disable rule reloading
    pub fn reload(mut self, enabled: bool) -> Self {
        self.config.reload.enabled = enabled;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-read `path` and swap the compiled rules into `handle`.
///
/// Nothing is swapped unless the whole rule set compiles.
pub async fn reload_rules(path: &Path, handle: &RulesHandle) -> Result<()> {
    let config = Config::from_file(path).await?;
    let rules = config.compile_rules()?;
    handle.store(rules);
    Ok(())
}

/// Watch the configuration file and hot-reload rollup rules
pub struct RulesWatcher {
    path: PathBuf,
    handle: RulesHandle,
    debounce: Duration,
}

impl RulesWatcher {
    /// Create a new rules watcher
    pub fn new(path: PathBuf, handle: RulesHandle, debounce: Duration) -> Self {
        RulesWatcher {
            path,
            handle,
            debounce,
        }
    }

    /// Start watching for configuration changes
    pub async fn watch(self) -> Result<()> {
        use notify::{RecursiveMode, Watcher};

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        })
        .map_err(|e| RollupError::config(format!("Failed to create file watcher: {}", e)))?;

        // Editors replace files by rename, so watch the directory and filter.
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| RollupError::config(format!("Failed to watch config file: {}", e)))?;

        tracing::info!("Watching rollup rules: {:?}", self.path);

        while let Some(event) = rx.recv().await {
            if !self.is_relevant(&event) {
                continue;
            }

            tokio::time::sleep(self.debounce).await;
            while rx.try_recv().is_ok() {}

            tracing::info!("Rules file changed, reloading...");
            match reload_rules(&self.path, &self.handle).await {
                Ok(()) => tracing::info!("Rollup rules reloaded successfully"),
                Err(e) => tracing::error!(
                    category = e.category(),
                    "Keeping previous rollup rules: {}",
                    e
                ),
            }
        }

        Ok(())
    }

    fn is_relevant(&self, event: &notify::Event) -> bool {
        matches!(
            event.kind,
            notify::EventKind::Modify(_) | notify::EventKind::Create(_)
        ) && event
            .paths
            .iter()
            .any(|p| p.file_name() == self.path.file_name())
    }
}
