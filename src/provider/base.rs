// src/provider/base.rs

use std::path::PathBuf;
use std::time::Duration;

use tokio::task;
use tokio_util::sync::CancellationToken;

use crate::cache::{self, EvictionPolicy, EvictionResult, SizeInventory};
use crate::config::{ProviderConfig, StrategyKind};
use crate::error::{EngineError, Failed, Outcome};

/// Identity and limits shared by every strategy.
#[derive(Debug, Clone)]
pub struct CacheRoot {
    name: String,
    paths: Vec<PathBuf>,
    size_limit: u64,
    age_limit: Duration,
    strategy: StrategyKind,
}

impl CacheRoot {
    pub fn new(
        name: impl Into<String>,
        paths: Vec<PathBuf>,
        size_limit: u64,
        age_limit: Duration,
        strategy: StrategyKind,
    ) -> Self {
        CacheRoot {
            name: name.into(),
            paths,
            size_limit,
            age_limit,
            strategy,
        }
    }

    pub(crate) fn from_config(name: &str, config: &ProviderConfig, strategy: StrategyKind) -> Self {
        Self::new(
            name,
            config.resolved_paths(),
            config.max_size_bytes,
            config.max_age(),
            strategy,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn size_limit(&self) -> u64 {
        self.size_limit
    }

    pub fn age_limit(&self) -> Duration {
        self.age_limit
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    pub fn policy(&self) -> EvictionPolicy {
        EvictionPolicy::new(self.size_limit, self.age_limit)
    }

    pub async fn current_size(&self, cancel: &CancellationToken) -> Outcome<SizeInventory> {
        let paths = self.paths.clone();
        let token = cancel.clone();
        run_blocking(move || cache::aggregate(&paths, &token)).await
    }

    /// Current size in bytes, falling back to the partial count when the
    /// scan stops early.
    pub(crate) async fn measure(&self, cancel: &CancellationToken) -> u64 {
        match self.current_size(cancel).await {
            Ok(inventory) => inventory.total_bytes,
            Err(failed) => failed.partial.total_bytes,
        }
    }

    pub(crate) async fn trim(&self, dry_run: bool, cancel: &CancellationToken) -> Outcome<EvictionResult> {
        let paths = self.paths.clone();
        let policy = self.policy();
        let token = cancel.clone();
        run_blocking(move || cache::trim(&paths, &policy, dry_run, &token)).await
    }

    pub(crate) async fn trim_to_limit(
        &self,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Outcome<EvictionResult> {
        let paths = self.paths.clone();
        let limit = self.size_limit;
        let token = cancel.clone();
        run_blocking(move || cache::trim_to_limit(&paths, limit, dry_run, &token)).await
    }
}

/// Runs filesystem-bound engine work off the async runtime.
pub(crate) async fn run_blocking<T, F>(work: F) -> Outcome<T>
where
    T: Default + Send + 'static,
    F: FnOnce() -> Outcome<T> + Send + 'static,
{
    match task::spawn_blocking(work).await {
        Ok(outcome) => outcome,
        Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
        Err(join_err) => {
            log::debug!("blocking scan task did not complete: {}", join_err);
            Err(Failed::new(T::default(), EngineError::Cancelled))
        }
    }
}

/// Result for a call that stopped on a cancelled token before doing work.
pub(crate) fn interrupted(dry_run: bool) -> Failed<EvictionResult> {
    Failed::new(
        EvictionResult {
            summary: "interrupted".into(),
            dry_run,
            interrupted: true,
            ..Default::default()
        },
        EngineError::Cancelled,
    )
}
