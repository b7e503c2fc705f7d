// src/provider/versioned.rs

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use super::base::{interrupted, run_blocking, CacheRoot};
use super::CleanMode;
use crate::cache::{self, classify, types::warning_suffix, EvictionResult};
use crate::error::{EngineError, Failed, Outcome};

lazy_static! {
    // `<product><year>.<release>`, e.g. IntelliJIdea2024.1
    static ref VERSION_DIR: Regex =
        Regex::new(r"^([A-Za-z][A-Za-z0-9]*)(\d{4}\.\d+)$").expect("version directory pattern");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDir {
    pub product: String,
    pub version: String,
    pub path: PathBuf,
}

impl VersionDir {
    /// `None` unless the final path component is `<product><version>`.
    pub fn parse(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let captures = VERSION_DIR.captures(name)?;
        Some(VersionDir {
            product: captures[1].to_string(),
            version: captures[2].to_string(),
            path: path.to_path_buf(),
        })
    }
}

/// Numeric comparison of dot-separated versions, so `2023.10 > 2023.3`.
/// Missing or non-numeric segments count as zero. Segments are compared as
/// digit strings, so their length is unbounded.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => {
                let l = numeric_segment(l);
                let r = numeric_segment(r);
                match l.len().cmp(&r.len()).then_with(|| l.cmp(r)) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
        }
    }
}

// Digits without leading zeros; zero is the empty string
fn numeric_segment(segment: Option<&str>) -> &str {
    match segment {
        Some(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.trim_start_matches('0'),
        _ => "",
    }
}

/// Every directory except the highest version of its product, grouped by
/// product name and ordered lowest version first within each group.
pub fn stale_versions(dirs: Vec<VersionDir>) -> Vec<VersionDir> {
    let mut products: BTreeMap<String, Vec<VersionDir>> = BTreeMap::new();
    for dir in dirs {
        products.entry(dir.product.clone()).or_default().push(dir);
    }

    let mut stale = Vec::new();
    for (_, mut versions) in products {
        versions.sort_by(|a, b| compare_versions(&a.version, &b.version));
        versions.pop();
        stale.extend(versions);
    }
    stale
}

/// Keeps only the newest version directory of each product.
#[derive(Debug, Clone)]
pub struct VersionProvider {
    root: CacheRoot,
}

impl VersionProvider {
    pub fn new(root: CacheRoot) -> Self {
        VersionProvider { root }
    }

    pub fn root(&self) -> &CacheRoot {
        &self.root
    }

    /// Old version directories across every base path. Missing base paths
    /// are skipped; unreadable ones fail the call.
    pub fn find_removable(&self) -> Result<Vec<VersionDir>, EngineError> {
        let mut candidates = Vec::new();
        for base in self.root.paths() {
            let entries = match fs::read_dir(base) {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(EngineError::Io {
                        path: base.clone(),
                        source,
                    })
                }
            };
            for entry in entries.flatten() {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if !is_dir {
                    continue;
                }
                if let Some(dir) = VersionDir::parse(&entry.path()) {
                    candidates.push(dir);
                }
            }
        }
        Ok(stale_versions(candidates))
    }

    /// Full mode removes every stale version. Smart mode only removes those
    /// untouched for longer than the age limit; a zero limit disables the
    /// filter. There is no size phase.
    pub async fn clean(
        &self,
        mode: CleanMode,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Outcome<EvictionResult> {
        let provider = self.clone();
        let removable = run_blocking(move || {
            provider
                .select(mode)
                .map_err(|err| Failed::new(Vec::new(), err))
        })
        .await
        .map_err(|failed| Failed::new(EvictionResult::with_summary("", dry_run), failed.error))?;

        if removable.is_empty() {
            return Ok(EvictionResult::with_summary("no old versions to clean", dry_run));
        }
        self.remove_dirs(removable, dry_run, cancel).await
    }

    fn select(&self, mode: CleanMode) -> Result<Vec<VersionDir>, EngineError> {
        let mut removable = self.find_removable()?;
        if mode == CleanMode::Smart && !self.root.age_limit().is_zero() {
            if let Ok(max_age) = ChronoDuration::from_std(self.root.age_limit()) {
                let cutoff = Utc::now() - max_age;
                removable.retain(|dir| modified_before(&dir.path, cutoff));
            }
        }
        Ok(removable)
    }

    async fn remove_dirs(
        &self,
        removable: Vec<VersionDir>,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Outcome<EvictionResult> {
        let mut result = EvictionResult {
            dry_run,
            ..Default::default()
        };
        let mut preview = String::new();

        for dir in removable {
            let paths = vec![dir.path.clone()];
            let token = cancel.clone();
            let scanned = run_blocking(move || cache::aggregate(&paths, &token)).await;
            // Covers a token that fired during the size scan
            if cancel.is_cancelled() {
                let mut failed = interrupted(dry_run);
                failed.partial.freed_bytes = result.freed_bytes;
                failed.partial.deleted_count = result.deleted_count;
                failed.partial.warnings = result.warnings;
                return Err(failed);
            }
            let size = match scanned {
                Ok(inventory) => inventory,
                Err(failed) => failed.partial,
            };
            result.warnings.extend(size.warnings);
            let name = dir
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if dry_run {
                let _ = writeln!(preview, "would remove: {} ({})", name, ByteSize(size.total_bytes));
                result.freed_bytes += size.total_bytes;
                result.deleted_count += 1;
                continue;
            }

            match tokio::fs::remove_dir_all(&dir.path).await {
                Ok(()) => {
                    log::info!("removed {} ({} bytes)", dir.path.display(), size.total_bytes);
                    result.freed_bytes += size.total_bytes;
                    result.deleted_count += 1;
                }
                Err(err) => {
                    log::warn!("failed to remove {}: {}", dir.path.display(), err);
                    result.warnings.push(classify(&dir.path, Some(err)));
                }
            }
        }

        let suffix = warning_suffix(&result.warnings);
        result.summary = if dry_run {
            format!("{}{}", preview.trim_end(), suffix)
        } else {
            format!(
                "removed {} old version directories{}",
                result.deleted_count, suffix
            )
        };
        Ok(result)
    }
}

fn modified_before(path: &Path, cutoff: DateTime<Utc>) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|modified| DateTime::<Utc>::from(modified) < cutoff)
        .unwrap_or(false)
}
