mod base;
pub mod command;
pub mod daemon;
mod files;
pub mod versioned;


use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::cache::{EvictionResult, SizeInventory};
use crate::config::{Config, ProviderConfig, StrategyKind};
use crate::error::{EngineError, Outcome};

pub use base::CacheRoot;
pub use command::{split_command, CommandProvider};
pub use daemon::{DaemonProbe, DaemonProvider};
pub use files::FileProvider;
pub use versioned::VersionProvider;

/// Providers that clean by deleting their own files when no strategy is
/// configured explicitly.
const FILE_BASED: &[&str] = &["uv", "xcode-deriveddata", "xcode-archives", "cargo", "gradle"];

/// Smart clean for `docker` when no `smart_cmd` is configured. Its paths hold
/// the VM disk image and must never be trimmed file by file.
const DOCKER_SMART_CMD: &str = "docker buildx prune -af --keep-storage={max_bytes}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanMode {
    /// Delete everything the strategy can, via command or wholesale removal.
    #[default]
    Full,
    /// Age-then-size eviction, or the strategy's nearest equivalent.
    Smart,
}

#[derive(Debug)]
pub enum SizeReport {
    Measured(SizeInventory),
    /// The provider's backing service is down; nothing was measured.
    Unavailable,
}

impl SizeReport {
    pub fn total_bytes(&self) -> Option<u64> {
        match self {
            SizeReport::Measured(inventory) => Some(inventory.total_bytes),
            SizeReport::Unavailable => None,
        }
    }
}

/// A cache root bound to its cleaning strategy.
#[derive(Debug, Clone)]
pub enum Provider {
    Files(FileProvider),
    Command(CommandProvider),
    Daemon(DaemonProvider),
    Versioned(VersionProvider),
}

impl Provider {
    pub fn root(&self) -> &CacheRoot {
        match self {
            Provider::Files(p) => p.root(),
            Provider::Command(p) => p.root(),
            Provider::Daemon(p) => p.root(),
            Provider::Versioned(p) => p.root(),
        }
    }

    pub fn name(&self) -> &str {
        self.root().name()
    }

    pub fn paths(&self) -> &[PathBuf] {
        self.root().paths()
    }

    pub fn configured_limit(&self) -> u64 {
        self.root().size_limit()
    }

    pub fn max_age(&self) -> Duration {
        self.root().age_limit()
    }

    pub async fn available(&self) -> bool {
        match self {
            Provider::Daemon(p) => p.available().await,
            _ => true,
        }
    }

    pub async fn current_size(&self, cancel: &CancellationToken) -> Outcome<SizeReport> {
        if !self.available().await {
            return Ok(SizeReport::Unavailable);
        }
        self.root()
            .current_size(cancel)
            .await
            .map(SizeReport::Measured)
            .map_err(|failed| failed.map(SizeReport::Measured))
    }

    pub async fn clean(
        &self,
        mode: CleanMode,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Outcome<EvictionResult> {
        log::debug!("cleaning {} ({:?}, dry_run={})", self.name(), mode, dry_run);
        match self {
            Provider::Files(p) => p.clean(mode, dry_run, cancel).await,
            Provider::Command(p) => p.clean(mode, dry_run, cancel).await,
            Provider::Daemon(p) => p.clean(mode, dry_run, cancel).await,
            Provider::Versioned(p) => p.clean(mode, dry_run, cancel).await,
        }
    }
}

/// Builds a provider. An explicit `strategy` wins; otherwise the name picks
/// one, and unknown names need a `clean_cmd`.
pub fn from_config(name: &str, config: &ProviderConfig) -> Result<Provider, EngineError> {
    let strategy = match config.strategy {
        Some(strategy) => strategy,
        None => infer_strategy(name, config)?,
    };
    let root = CacheRoot::from_config(name, config, strategy);

    let provider = match strategy {
        StrategyKind::Files => Provider::Files(FileProvider::new(root)),
        StrategyKind::Versioned => Provider::Versioned(VersionProvider::new(root)),
        StrategyKind::Command => Provider::Command(CommandProvider::new(
            root,
            require_clean_cmd(name, config)?,
            config.smart_cmd.clone(),
        )),
        StrategyKind::Daemon => {
            let smart_cmd = config
                .smart_cmd
                .clone()
                .or_else(|| (name == "docker").then(|| DOCKER_SMART_CMD.to_string()));
            let command = CommandProvider::new(root, require_clean_cmd(name, config)?, smart_cmd);
            Provider::Daemon(DaemonProvider::new(
                command,
                DaemonProbe::for_provider(name, config),
            ))
        }
    };
    Ok(provider)
}

fn infer_strategy(name: &str, config: &ProviderConfig) -> Result<StrategyKind, EngineError> {
    if name == "docker" {
        Ok(StrategyKind::Daemon)
    } else if name == "jetbrains" {
        Ok(StrategyKind::Versioned)
    } else if FILE_BASED.contains(&name) {
        Ok(StrategyKind::Files)
    } else if config.has_clean_cmd() {
        Ok(StrategyKind::Command)
    } else {
        Err(EngineError::MissingCleanCommand(name.to_string()))
    }
}

fn require_clean_cmd(name: &str, config: &ProviderConfig) -> Result<String, EngineError> {
    match &config.clean_cmd {
        Some(cmd) if !cmd.trim().is_empty() => Ok(cmd.clone()),
        _ => Err(EngineError::MissingCleanCommand(name.to_string())),
    }
}

/// Every enabled provider with at least one existing path, sorted by name.
pub fn load_providers(config: &Config) -> Result<Vec<Provider>, EngineError> {
    let mut providers = Vec::new();
    for name in config.enabled_providers() {
        let Some(provider_config) = config.provider(name) else {
            continue;
        };
        let provider = from_config(name, provider_config).map_err(|err| EngineError::Provider {
            name: name.to_string(),
            source: Box::new(err),
        })?;
        if !provider.paths().iter().any(|p| p.exists()) {
            log::debug!("skipping {}: no cache paths on disk", name);
            continue;
        }
        providers.push(provider);
    }
    Ok(providers)
}

pub fn load_provider(name: &str, config: &Config) -> Result<Provider, EngineError> {
    let provider_config = config
        .provider(name)
        .ok_or_else(|| EngineError::UnknownProvider(name.to_string()))?;
    from_config(name, provider_config)
}
