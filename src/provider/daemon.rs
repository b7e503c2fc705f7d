// src/provider/daemon.rs

use std::collections::HashSet;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use sysinfo::System;
use tokio::process::Command;
use tokio::task;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::base::CacheRoot;
use super::command::{split_command, CommandProvider};
use super::CleanMode;
use crate::cache::EvictionResult;
use crate::config::{ProviderConfig, PERFORMANCE_CONFIG};
use crate::error::Outcome;

/// Checks whether the background service a cache belongs to is running.
/// With neither check configured the service counts as running.
#[derive(Debug, Clone, Default)]
pub struct DaemonProbe {
    process: Option<String>,
    command: Option<String>,
    timeout: Duration,
}

impl DaemonProbe {
    pub fn new(process: Option<String>, command: Option<String>, timeout: Duration) -> Self {
        DaemonProbe {
            process,
            command,
            timeout,
        }
    }

    pub(crate) fn for_provider(name: &str, config: &ProviderConfig) -> Self {
        let command = config
            .probe_cmd
            .clone()
            .or_else(|| (name == "docker").then(|| "docker ps --quiet".to_string()));
        Self::new(
            config.probe_process.clone(),
            command,
            PERFORMANCE_CONFIG.probe_timeout(),
        )
    }

    pub async fn check(&self) -> bool {
        if let Some(name) = &self.process {
            if !ProcessSnapshot::capture().await.has_process_named(name) {
                debug!("daemon process {} not running", name);
                return false;
            }
        }
        match &self.command {
            Some(line) => probe_command(line, self.timeout).await,
            None => true,
        }
    }
}

async fn probe_command(line: &str, limit: Duration) -> bool {
    let argv = match split_command(line) {
        Ok(argv) => argv,
        Err(err) => {
            log::warn!("invalid probe command: {}", err);
            return false;
        }
    };
    let Some((program, args)) = argv.split_first() else {
        return true;
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match timeout(limit, command.status()).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(err)) => {
            debug!("probe {} failed to start: {}", program, err);
            false
        }
        Err(_) => {
            log::warn!("probe {} timed out after {:?}", program, limit);
            false
        }
    }
}

#[derive(Clone, Default)]
struct ProcessSnapshot {
    process_names: Arc<HashSet<String>>,
}

impl ProcessSnapshot {
    fn has_process_named(&self, name: &str) -> bool {
        self.process_names.contains(&name.to_lowercase())
    }

    async fn capture() -> Self {
        match task::spawn_blocking(capture_snapshot).await {
            Ok(snapshot) => snapshot,
            Err(join_err) => {
                debug!("Failed to capture process snapshot: {}", join_err);
                Self::default()
            }
        }
    }
}

fn capture_snapshot() -> ProcessSnapshot {
    let mut system = System::new();
    system.refresh_processes();

    let names: HashSet<String> = system
        .processes()
        .values()
        .map(|process| process.name().to_lowercase())
        .collect();

    ProcessSnapshot {
        process_names: Arc::new(names),
    }
}

/// A command-backed cache whose tool only works while its daemon is up.
/// Every size report and clean checks availability first.
#[derive(Debug, Clone)]
pub struct DaemonProvider {
    command: CommandProvider,
    probe: DaemonProbe,
}

impl DaemonProvider {
    pub fn new(command: CommandProvider, probe: DaemonProbe) -> Self {
        DaemonProvider { command, probe }
    }

    pub fn root(&self) -> &CacheRoot {
        self.command.root()
    }

    pub async fn available(&self) -> bool {
        self.probe.check().await
    }

    pub async fn clean(
        &self,
        mode: CleanMode,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Outcome<EvictionResult> {
        if !self.available().await {
            return Ok(EvictionResult::with_summary(
                format!("{} not available", self.root().name()),
                dry_run,
            ));
        }
        self.command.clean(mode, dry_run, cancel).await
    }
}
