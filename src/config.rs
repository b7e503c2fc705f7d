// src/config.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    // Upper bound on concurrent root walks in one scan
    pub max_parallel_scans: usize, // Default: num_cpus::get()

    // Daemon availability probes
    pub probe_timeout_secs: u64, // Default: 5
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            max_parallel_scans: num_cpus::get(),
            probe_timeout_secs: 5,
        }
    }
}

impl PerformanceConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

// Global configuration
lazy_static! {
    pub static ref PERFORMANCE_CONFIG: PerformanceConfig = PerformanceConfig::default();
}

/// Explicit cleaning strategy. When absent the registry infers one from the
/// provider name and the presence of `clean_cmd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Files,
    Command,
    Daemon,
    Versioned,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub paths: Vec<String>,
    pub max_size_bytes: u64,
    pub max_age_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean_cmd: Option<String>,
    // `{max_bytes}` is replaced with the configured limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_cmd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_cmd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_process: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,
}

impl ProviderConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    /// Paths with a leading `~/` joined onto the home directory. Patterns
    /// are otherwise taken as already resolved.
    pub fn resolved_paths(&self) -> Vec<PathBuf> {
        self.paths.iter().filter_map(|p| resolve_home(p)).collect()
    }

    fn clean_cmd(&self) -> Option<&str> {
        self.clean_cmd.as_deref().filter(|c| !c.trim().is_empty())
    }

    pub(crate) fn has_clean_cmd(&self) -> bool {
        self.clean_cmd().is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl Config {
    pub fn from_json_str(raw: &str) -> Result<Self, EngineError> {
        let config: Config = serde_json::from_str(raw)
            .map_err(|e| EngineError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Built-in provider definitions for common developer tools.
    pub fn builtin() -> Result<Self, EngineError> {
        Self::from_json_str(include_str!("../defaults/providers.json"))
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, provider) in &self.providers {
            if provider.paths.is_empty() {
                return Err(EngineError::Config(format!(
                    "provider {:?}: at least one path is required",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Enabled provider names, sorted.
    pub fn enabled_providers(&self) -> Vec<&str> {
        self.providers
            .iter()
            .filter(|(_, p)| p.enabled)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

fn resolve_home(input: &str) -> Option<PathBuf> {
    if input == "~" {
        return dirs::home_dir();
    }
    if let Some(rest) = input.strip_prefix("~/") {
        return dirs::home_dir().map(|home| home.join(rest));
    }
    Some(PathBuf::from(input))
}
