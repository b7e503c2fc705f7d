// src/events.rs

use futures::future::join_all;
use tokio::sync::mpsc;

use crate::cache::EvictionResult;
use crate::error::{EngineError, Outcome};
use crate::ops::{OperationId, OperationKind, OperationRegistry, OperationStatus};
use crate::provider::{CleanMode, Provider, SizeReport};

/// Completion notifications for presentation layers. Each carries the full
/// outcome, partial value and error included.
#[derive(Debug)]
pub enum EngineEvent {
    ScanCompleted {
        id: OperationId,
        provider: String,
        outcome: Outcome<SizeReport>,
    },
    CleanCompleted {
        id: OperationId,
        provider: String,
        mode: CleanMode,
        outcome: Outcome<EvictionResult>,
    },
}

/// Drives providers through the operation registry and reports each
/// completion on a channel.
#[derive(Clone)]
pub struct Sweeper {
    registry: OperationRegistry,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl Sweeper {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let sweeper = Sweeper {
            registry: OperationRegistry::new(),
            events,
        };
        (sweeper, receiver)
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Measures every provider concurrently, one `ScanCompleted` each.
    pub async fn status(&self, providers: &[Provider]) {
        join_all(providers.iter().map(|provider| self.scan(provider))).await;
    }

    async fn scan(&self, provider: &Provider) {
        let (id, token) = match self.registry.register(OperationKind::Scan, provider.name()) {
            Ok(registered) => registered,
            Err(err) => {
                log::warn!("could not register scan of {}: {}", provider.name(), err);
                return;
            }
        };
        let outcome = provider.current_size(&token).await;
        self.registry.finish(&id, status_of(&outcome));
        self.emit(EngineEvent::ScanCompleted {
            id,
            provider: provider.name().to_string(),
            outcome,
        });
    }

    /// Cleans one provider. Fails only when a clean of the same cache root is
    /// already running; the clean's own outcome arrives as `CleanCompleted`.
    pub async fn clean(
        &self,
        provider: &Provider,
        mode: CleanMode,
        dry_run: bool,
    ) -> Result<OperationId, EngineError> {
        let (id, token) = self.registry.register(OperationKind::Clean, provider.name())?;
        let outcome = provider.clean(mode, dry_run, &token).await;
        self.registry.finish(&id, status_of(&outcome));
        self.emit(EngineEvent::CleanCompleted {
            id: id.clone(),
            provider: provider.name().to_string(),
            mode,
            outcome,
        });
        Ok(id)
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            log::debug!("event receiver dropped");
        }
    }
}

fn status_of<T>(outcome: &Outcome<T>) -> OperationStatus {
    match outcome {
        Ok(_) => OperationStatus::Completed,
        Err(failed) if failed.error.is_cancelled() => OperationStatus::Canceled,
        Err(_) => OperationStatus::Failed,
    }
}
