//! # coachvault - token-funded unlocks behind a request guard
//!
//! coachvault lets users spend tokens to unlock catalog items (coaches). Every
//! unlock is an all-or-nothing transaction against a snapshot store, and every
//! unlock request passes a fixed-window rate guard first.
//!
//! ## Core Concepts
//!
//! - **User**: token balance, experience points, and the set of unlocked items
//! - **Item**: a catalog entry with an unlock cost, availability, and an
//!   advisory risk flag
//! - **UnlockRecord**: the append-only audit entry written for each unlock
//! - **RateGuard**: fixed-window admission keyed by a per-operation policy
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use coachvault::guard::{GuardConfig, GuardPolicy, RateGuard, RequestContext};
//! use coachvault::storage::InMemorySnapshotStore;
//! use coachvault::{
//!     EconomyConfig, Item, ItemId, Snapshot, UnlockEngine, UnlockRequest, UnlockService, User,
//!     UserId,
//! };
//!
//! let store = Arc::new(InMemorySnapshotStore::new(
//!     Snapshot::new(EconomyConfig::default())
//!         .with_user(User::new("u1", "Ana", 10))
//!         .with_item(Item::new("c1", "Coach One", 4)),
//! ));
//! let service = UnlockService::new(
//!     UnlockEngine::new(store),
//!     Arc::new(RateGuard::new(GuardConfig::default())),
//!     GuardPolicy::unlock(),
//! );
//!
//! let request = UnlockRequest { user_id: UserId::new("u1") };
//! let response = service
//!     .unlock(&RequestContext::new("unlock"), &ItemId::new("c1"), &request)
//!     .unwrap();
//! assert_eq!(response.updated_user.tokens, 6);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Domain types
pub mod economy;
pub mod error;
pub mod item;
pub mod record;
pub mod snapshot;
pub mod time;
pub mod user;

// Transactions, admission and storage
pub mod config;
pub mod engine;
pub mod guard;
pub mod service;
pub mod storage;

#[cfg(feature = "transport-http")]
pub mod transport;

// Re-export primary types at crate root for convenience
pub use economy::EconomyConfig;
pub use engine::{UnlockEngine, UnlockOutcome};
pub use error::{PreconditionFailure, UnlockError, ValidationError, VaultError, VaultResult};
pub use guard::{GuardPolicy, RateGuard, RateLimit, RequestContext};
pub use item::{Item, ItemId};
pub use record::{RecordId, UnlockRecord};
pub use service::{UnlockRequest, UnlockResponse, UnlockService};
pub use snapshot::Snapshot;
pub use storage::{SnapshotStore, StorageError};
pub use user::{User, UserId};
