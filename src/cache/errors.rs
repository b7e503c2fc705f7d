// src/cache/errors.rs

use std::fmt;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningReason {
    PermissionDenied,
    Locked,
    NotFound,
    Unknown,
}

impl fmt::Display for WarningReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            WarningReason::PermissionDenied => "permission denied",
            WarningReason::Locked => "locked",
            WarningReason::NotFound => "not found",
            WarningReason::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

/// A non-fatal problem touching one path during a scan or a delete.
#[derive(Debug)]
pub struct AccessWarning {
    pub path: PathBuf,
    pub reason: WarningReason,
    pub cause: Option<io::Error>,
}

impl fmt::Display for AccessWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

impl std::error::Error for AccessWarning {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Maps an OS error for `path` to a stable reason. `None` classifies as
/// `Unknown`.
pub fn classify(path: &Path, error: Option<io::Error>) -> AccessWarning {
    let reason = error.as_ref().map(reason_for).unwrap_or(WarningReason::Unknown);
    AccessWarning {
        path: path.to_path_buf(),
        reason,
        cause: error,
    }
}

fn reason_for(error: &io::Error) -> WarningReason {
    match error.kind() {
        ErrorKind::PermissionDenied => return WarningReason::PermissionDenied,
        ErrorKind::NotFound => return WarningReason::NotFound,
        _ => {}
    }
    if is_busy(error) {
        WarningReason::Locked
    } else {
        WarningReason::Unknown
    }
}

#[cfg(unix)]
fn is_busy(error: &io::Error) -> bool {
    matches!(error.raw_os_error(), Some(code) if code == libc::EBUSY || code == libc::ETXTBSY)
}

#[cfg(not(unix))]
fn is_busy(error: &io::Error) -> bool {
    matches!(error.raw_os_error(), Some(code) if code == libc::EBUSY)
}

/// Classifies a walk failure, using the failing entry's path when walkdir
/// knows it and `fallback` otherwise.
pub(crate) fn classify_walk_error(fallback: &Path, error: walkdir::Error) -> AccessWarning {
    let path = error
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| fallback.to_path_buf());
    classify(&path, error.into_io_error())
}
