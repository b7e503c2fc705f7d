mod errors;
pub mod scanner;
pub mod trimmer;
pub mod types;

#[cfg(test)]
mod tests;

pub use errors::{classify, AccessWarning, WarningReason};
pub use scanner::{aggregate, enumerate};
pub use trimmer::{trim, trim_to_limit};
pub use types::{EvictionPolicy, EvictionResult, FileEntry, FileInventory, SizeInventory};
