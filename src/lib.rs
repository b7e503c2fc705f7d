pub mod cache;
pub mod config;
mod error;
pub mod events;
pub mod ops;
pub mod provider;

pub use cache::{
    aggregate, enumerate, trim, trim_to_limit, AccessWarning, EvictionPolicy, EvictionResult,
    FileEntry, FileInventory, SizeInventory, WarningReason,
};
pub use config::{Config, ProviderConfig, StrategyKind};
pub use error::{EngineError, Failed, Outcome};
pub use events::{EngineEvent, Sweeper};
pub use ops::{OperationKind, OperationRegistry, OperationStatus};
pub use provider::{load_provider, load_providers, CacheRoot, CleanMode, Provider, SizeReport};
