// src/cache/scanner.rs

use std::fs::{self, Metadata};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
#[cfg(feature = "parallel-scan")]
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::errors::{classify, classify_walk_error, AccessWarning, WarningReason};
use super::types::{FileEntry, FileInventory, SizeInventory};
#[cfg(feature = "parallel-scan")]
use crate::config::PERFORMANCE_CONFIG;
use crate::error::{EngineError, Failed, Outcome};

/// What one root contributed before its walk ended.
struct RootWalk<T> {
    acc: T,
    warnings: Vec<AccessWarning>,
    cancelled: bool,
}

/// Sums the sizes of every regular file under `roots`.
///
/// Directories, symlinks and special files contribute nothing. Missing roots
/// are skipped silently. Unreadable entries become warnings. Cancellation
/// stops every walk and returns the bytes counted so far.
pub fn aggregate(roots: &[PathBuf], cancel: &CancellationToken) -> Outcome<SizeInventory> {
    let walks = fan_out(roots, cancel, |total: &mut u64, _, metadata| {
        *total += metadata.len();
        Ok(())
    });

    let mut inventory = SizeInventory::default();
    let mut cancelled = false;
    for walk in walks {
        inventory.total_bytes += walk.acc;
        inventory.warnings.extend(walk.warnings);
        cancelled |= walk.cancelled;
    }
    log::debug!(
        "aggregated {} root(s): {} bytes, {} warning(s)",
        roots.len(),
        inventory.total_bytes,
        inventory.warnings.len()
    );
    finish(inventory, cancelled)
}

/// Same traversal as [`aggregate`], collecting a [`FileEntry`] per file.
pub fn enumerate(roots: &[PathBuf], cancel: &CancellationToken) -> Outcome<FileInventory> {
    let walks = fan_out(roots, cancel, |files: &mut Vec<FileEntry>, path, metadata| {
        let modified = metadata.modified()?;
        files.push(FileEntry {
            path: path.to_path_buf(),
            size: metadata.len(),
            mod_time: DateTime::<Utc>::from(modified),
        });
        Ok(())
    });

    let mut inventory = FileInventory::default();
    let mut cancelled = false;
    for walk in walks {
        inventory.files.extend(walk.acc);
        inventory.warnings.extend(walk.warnings);
        cancelled |= walk.cancelled;
    }
    log::debug!(
        "enumerated {} root(s): {} file(s), {} warning(s)",
        roots.len(),
        inventory.files.len(),
        inventory.warnings.len()
    );
    finish(inventory, cancelled)
}

fn finish<T>(inventory: T, cancelled: bool) -> Outcome<T> {
    if cancelled {
        Err(Failed::new(inventory, EngineError::Cancelled))
    } else {
        Ok(inventory)
    }
}

#[cfg(feature = "parallel-scan")]
fn fan_out<T, F>(roots: &[PathBuf], cancel: &CancellationToken, visit: F) -> Vec<RootWalk<T>>
where
    T: Default + Send,
    F: Fn(&mut T, &Path, &Metadata) -> io::Result<()> + Sync,
{
    if roots.len() <= 1 {
        return roots
            .iter()
            .map(|root| walk_root(root, cancel, &visit))
            .collect();
    }

    // One worker per root, capped; the pool lives only for this call.
    let threads = roots
        .len()
        .min(PERFORMANCE_CONFIG.max_parallel_scans.max(1));
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(|| {
            roots
                .par_iter()
                .map(|root| walk_root(root, cancel, &visit))
                .collect()
        }),
        Err(err) => {
            log::warn!("scan pool unavailable, walking roots serially: {}", err);
            roots
                .iter()
                .map(|root| walk_root(root, cancel, &visit))
                .collect()
        }
    }
}

#[cfg(not(feature = "parallel-scan"))]
fn fan_out<T, F>(roots: &[PathBuf], cancel: &CancellationToken, visit: F) -> Vec<RootWalk<T>>
where
    T: Default + Send,
    F: Fn(&mut T, &Path, &Metadata) -> io::Result<()> + Sync,
{
    roots
        .iter()
        .map(|root| walk_root(root, cancel, &visit))
        .collect()
}

fn walk_root<T, F>(root: &Path, cancel: &CancellationToken, visit: &F) -> RootWalk<T>
where
    T: Default,
    F: Fn(&mut T, &Path, &Metadata) -> io::Result<()>,
{
    let mut walk = RootWalk {
        acc: T::default(),
        warnings: Vec::new(),
        cancelled: false,
    };

    if let Err(err) = fs::symlink_metadata(root) {
        if err.kind() == ErrorKind::NotFound {
            log::debug!("skipping missing root {}", root.display());
            return walk;
        }
    }

    // Never follow links, the root included: aliased targets would be
    // counted twice and link cycles would never terminate.
    let walker = WalkDir::new(root)
        .follow_links(false)
        .follow_root_links(false);

    for entry in walker {
        if cancel.is_cancelled() {
            walk.cancelled = true;
            break;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let warning = classify_walk_error(root, err);
                if warning.reason == WarningReason::NotFound {
                    // Removed between readdir and stat
                    log::debug!("entry vanished during scan: {}", warning.path.display());
                } else {
                    walk.warnings.push(warning);
                }
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                walk.warnings.push(classify_walk_error(entry.path(), err));
                continue;
            }
        };

        if let Err(err) = visit(&mut walk.acc, entry.path(), &metadata) {
            walk.warnings.push(classify(entry.path(), Some(err)));
        }
    }

    walk
}
