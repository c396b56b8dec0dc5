pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use record::{ExecutionRecord, StoredVersion, VersionSummary};
pub use traits::VersionStore;
