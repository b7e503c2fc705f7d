// src/provider/files.rs

use tokio_util::sync::CancellationToken;

use super::base::CacheRoot;
use super::CleanMode;
use crate::cache::EvictionResult;
use crate::error::Outcome;

/// Evicts cache files directly, oldest first.
#[derive(Debug, Clone)]
pub struct FileProvider {
    root: CacheRoot,
}

impl FileProvider {
    pub fn new(root: CacheRoot) -> Self {
        FileProvider { root }
    }

    pub fn root(&self) -> &CacheRoot {
        &self.root
    }

    /// Full mode deletes oldest files until the total is at or under the
    /// limit. Smart mode runs the age-then-size trim.
    pub async fn clean(
        &self,
        mode: CleanMode,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Outcome<EvictionResult> {
        match mode {
            CleanMode::Smart => self.root.trim(dry_run, cancel).await,
            CleanMode::Full => {
                let current = self.root.current_size(cancel).await.map_err(|failed| {
                    failed.map(|partial| EvictionResult {
                        warnings: partial.warnings,
                        summary: "interrupted".into(),
                        dry_run,
                        interrupted: true,
                        ..Default::default()
                    })
                })?;
                if current.total_bytes <= self.root.size_limit() {
                    return Ok(EvictionResult {
                        warnings: current.warnings,
                        summary: "already under limit".into(),
                        dry_run,
                        ..Default::default()
                    });
                }
                self.root.trim_to_limit(dry_run, cancel).await
            }
        }
    }
}
