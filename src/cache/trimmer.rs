// src/cache/trimmer.rs

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use bytesize::ByteSize;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio_util::sync::CancellationToken;

use super::errors::{classify, AccessWarning};
use super::scanner;
use super::types::{warning_suffix, EvictionPolicy, EvictionResult, FileEntry, FileInventory};
use crate::error::{EngineError, Failed, Outcome};

/// Two-phase eviction: everything older than `max_age`, then the oldest of
/// what is left until the remainder fits `max_size_bytes × 0.9`.
pub fn trim(
    roots: &[PathBuf],
    policy: &EvictionPolicy,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Outcome<EvictionResult> {
    let inventory = enumerate_sorted(roots, dry_run, cancel)?;
    if inventory.files.is_empty() {
        return Ok(no_files(inventory, dry_run));
    }
    let plan = plan_eviction(&inventory.files, policy, Utc::now());
    execute(plan, inventory.warnings, dry_run, cancel)
}

/// Deletes oldest files until the total is at or under `max_size_bytes`.
/// No age phase and no headroom.
pub fn trim_to_limit(
    roots: &[PathBuf],
    max_size_bytes: u64,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Outcome<EvictionResult> {
    let inventory = enumerate_sorted(roots, dry_run, cancel)?;
    if inventory.files.is_empty() {
        return Ok(no_files(inventory, dry_run));
    }
    let plan = plan_size_limit(&inventory.files, max_size_bytes);
    execute(plan, inventory.warnings, dry_run, cancel)
}

fn enumerate_sorted(
    roots: &[PathBuf],
    dry_run: bool,
    cancel: &CancellationToken,
) -> Result<FileInventory, Failed<EvictionResult>> {
    let mut inventory = scanner::enumerate(roots, cancel).map_err(|failed| {
        failed.map(|partial| EvictionResult {
            warnings: partial.warnings,
            summary: "interrupted".into(),
            dry_run,
            interrupted: true,
            ..Default::default()
        })
    })?;
    // Walk order is filesystem-dependent; eviction order is not.
    inventory
        .files
        .sort_by(|a, b| a.mod_time.cmp(&b.mod_time).then_with(|| a.path.cmp(&b.path)));
    Ok(inventory)
}

fn no_files(inventory: FileInventory, dry_run: bool) -> EvictionResult {
    EvictionResult {
        warnings: inventory.warnings,
        summary: "no files found".into(),
        dry_run,
        ..Default::default()
    }
}

/// Picks files to delete from `files`, which must be sorted oldest first.
/// The returned plan keeps that order.
pub fn plan_eviction<'a>(
    files: &'a [FileEntry],
    policy: &EvictionPolicy,
    now: DateTime<Utc>,
) -> Vec<&'a FileEntry> {
    let cutoff = age_cutoff(now, policy);
    let target = policy.target_bytes();

    let mut marked = vec![false; files.len()];
    let mut remaining = 0u64;
    for (i, file) in files.iter().enumerate() {
        if cutoff.map_or(false, |cutoff| file.mod_time < cutoff) {
            marked[i] = true;
        } else {
            remaining += file.size;
        }
    }

    if remaining > target {
        for (i, file) in files.iter().enumerate() {
            if remaining <= target {
                break;
            }
            if marked[i] {
                continue;
            }
            marked[i] = true;
            remaining -= file.size;
        }
    }

    files
        .iter()
        .zip(marked)
        .filter_map(|(file, marked)| marked.then_some(file))
        .collect()
}

/// Oldest-first prefix of `files` whose removal brings the total to at most
/// `max_size_bytes`.
pub fn plan_size_limit(files: &[FileEntry], max_size_bytes: u64) -> Vec<&FileEntry> {
    let total: u64 = files.iter().map(|f| f.size).sum();
    let excess = total.saturating_sub(max_size_bytes);
    let mut planned = 0u64;
    files
        .iter()
        .take_while(|file| {
            if planned >= excess {
                return false;
            }
            planned += file.size;
            true
        })
        .collect()
}

/// `None` when the age limit reaches back past the representable range, in
/// which case nothing is old enough.
fn age_cutoff(now: DateTime<Utc>, policy: &EvictionPolicy) -> Option<DateTime<Utc>> {
    let max_age = ChronoDuration::from_std(policy.max_age).ok()?;
    now.checked_sub_signed(max_age)
}

/// Deletes or previews `plan` in order. `cancel` is checked before each file.
pub(crate) fn execute(
    plan: Vec<&FileEntry>,
    scan_warnings: Vec<AccessWarning>,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Outcome<EvictionResult> {
    let mut result = EvictionResult {
        warnings: scan_warnings,
        dry_run,
        ..Default::default()
    };
    let mut preview = String::new();
    let now = Utc::now();

    for file in plan {
        if cancel.is_cancelled() {
            result.interrupted = true;
            result.summary = if dry_run {
                format!("{}interrupted", preview)
            } else {
                format!("interrupted after deleting {} files", result.deleted_count)
            };
            return Err(Failed::new(result, EngineError::Cancelled));
        }

        if dry_run {
            let _ = writeln!(
                preview,
                "would delete: {} ({}, age: {})",
                file.path.display(),
                ByteSize(file.size),
                format_age(now.signed_duration_since(file.mod_time))
            );
            result.freed_bytes += file.size;
            result.deleted_count += 1;
            continue;
        }

        match fs::remove_file(&file.path) {
            Ok(()) => {
                result.freed_bytes += file.size;
                result.deleted_count += 1;
            }
            Err(err) => {
                log::warn!("failed to delete {}: {}", file.path.display(), err);
                result.warnings.push(classify(&file.path, Some(err)));
            }
        }
    }

    let suffix = warning_suffix(&result.warnings);
    result.summary = if dry_run {
        format!(
            "{}would delete {} files ({}){}",
            preview,
            result.deleted_count,
            ByteSize(result.freed_bytes),
            suffix
        )
    } else {
        format!("deleted {} files{}", result.deleted_count, suffix)
    };
    Ok(result)
}

fn format_age(age: ChronoDuration) -> String {
    if age.num_days() > 0 {
        format!("{}d", age.num_days())
    } else {
        format!("{}h", age.num_hours().max(0))
    }
}
