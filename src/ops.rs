use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

pub type OperationId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OperationStatus {
    Running,
    Completed,
    Canceled,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Scan,
    Clean,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpState {
    pub id: OperationId,
    pub kind: OperationKind,
    pub cache_root: String,
    pub started_at_ms: u128,
    pub status: OperationStatus,
}

/// In-flight scans and cleans. The engine itself does not serialize cleans
/// of one cache root; callers going through this registry get that.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    inner: Arc<DashMap<OperationId, (OpState, CancellationToken)>>,
    // cache root name -> id of the clean running against it
    cleaning: Arc<DashMap<String, OperationId>>,
    root_token: CancellationToken,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation and hands back its cancellation token. A
    /// second clean of the same cache root is refused while the first runs.
    pub fn register(
        &self,
        kind: OperationKind,
        cache_root: &str,
    ) -> Result<(OperationId, CancellationToken), EngineError> {
        let id = uuid::Uuid::new_v4().to_string();
        if kind == OperationKind::Clean {
            match self.cleaning.entry(cache_root.to_string()) {
                Entry::Occupied(_) => return Err(EngineError::Busy(cache_root.to_string())),
                Entry::Vacant(slot) => {
                    slot.insert(id.clone());
                }
            }
        }

        let token = self.root_token.child_token();
        let state = OpState {
            id: id.clone(),
            kind,
            cache_root: cache_root.to_string(),
            started_at_ms: now_ms(),
            status: OperationStatus::Running,
        };
        self.inner.insert(id.clone(), (state, token.clone()));
        Ok((id, token))
    }

    pub fn get(&self, id: &str) -> Option<OpState> {
        self.inner.get(id).map(|e| e.0.clone())
    }

    pub fn active(&self) -> Vec<OpState> {
        self.inner.iter().map(|e| e.value().0.clone()).collect()
    }

    pub fn cancel(&self, id: &str) -> bool {
        if let Some(entry) = self.inner.get(id) {
            entry.1.cancel();
            true
        } else {
            false
        }
    }

    /// Cancels every registered operation, including ones registered later.
    pub fn cancel_all(&self) {
        self.root_token.cancel();
    }

    /// Drops a finished operation and releases its cache root. Returns the
    /// final state.
    pub fn finish(&self, id: &str, status: OperationStatus) -> Option<OpState> {
        let (_, (mut state, _)) = self.inner.remove(id)?;
        state.status = status;
        if state.kind == OperationKind::Clean {
            self.cleaning
                .remove_if(&state.cache_root, |_, running| running == id);
        }
        Some(state)
    }
}

fn now_ms() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}
