//! Snapshot storage for coachvault.
//!
//! The [`SnapshotStore`] trait is the whole contract; `memory` is always
//! available and `persistent` (feature `persistent`) adds the JSON document
//! backend.

mod memory;
mod traits;

#[cfg(feature = "persistent")]
pub mod persistent;

pub use memory::InMemorySnapshotStore;
pub use traits::{SnapshotStore, StorageError};

#[cfg(feature = "persistent")]
pub use persistent::{open_store, JsonFileStore, PersistentConfig};
