use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{AccessWarning, WarningReason};

/// One regular file as it looked at scan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
}

/// Aggregate-mode scan result.
#[derive(Debug, Default)]
pub struct SizeInventory {
    pub total_bytes: u64,
    pub warnings: Vec<AccessWarning>,
}

/// Enumerate-mode scan result. File order is whatever the walk produced.
#[derive(Debug, Default)]
pub struct FileInventory {
    pub files: Vec<FileEntry>,
    pub warnings: Vec<AccessWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionPolicy {
    pub max_size_bytes: u64,
    pub max_age: Duration,
}

impl EvictionPolicy {
    /// Fraction of `max_size_bytes` a size-driven trim evicts down to.
    pub const HEADROOM_FACTOR: f64 = 0.9;

    pub fn new(max_size_bytes: u64, max_age: Duration) -> Self {
        EvictionPolicy {
            max_size_bytes,
            max_age,
        }
    }

    pub fn target_bytes(&self) -> u64 {
        (self.max_size_bytes as f64 * Self::HEADROOM_FACTOR) as u64
    }
}

#[derive(Debug, Default)]
pub struct EvictionResult {
    pub freed_bytes: u64,
    pub deleted_count: u64,
    pub warnings: Vec<AccessWarning>,
    pub summary: String,
    pub dry_run: bool,
    pub interrupted: bool,
}

impl EvictionResult {
    pub fn with_summary(summary: impl Into<String>, dry_run: bool) -> Self {
        EvictionResult {
            summary: summary.into(),
            dry_run,
            ..Default::default()
        }
    }

    /// Count of warnings per reason, in reason order.
    pub fn warning_counts(&self) -> BTreeMap<WarningReason, usize> {
        count_by_reason(&self.warnings)
    }
}

pub(crate) fn count_by_reason(warnings: &[AccessWarning]) -> BTreeMap<WarningReason, usize> {
    let mut counts = BTreeMap::new();
    for warning in warnings {
        *counts.entry(warning.reason).or_insert(0) += 1;
    }
    counts
}

/// Renders " (2 permission denied, 1 locked)" or an empty string.
pub(crate) fn warning_suffix(warnings: &[AccessWarning]) -> String {
    if warnings.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = count_by_reason(warnings)
        .into_iter()
        .map(|(reason, count)| format!("{} {}", count, reason))
        .collect();
    format!(" ({})", parts.join(", "))
}
