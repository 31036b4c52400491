//! # Shared Store
//!
//! The key-value store every participant in a group can reach over the
//! network. The pipe subsystem layers its queues, endpoint-state hashes, and
//! reference records on top of this command set.
//!
//! Atomicity is per-command only; nothing here assumes transactions. The
//! in-memory backend is suitable for single-process operation and tests;
//! distributed deployments would use a Redis-backed implementation of the
//! same trait.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod memory;
pub mod store;

pub use memory::InMemoryStore;
pub use store::{SharedStore, StoreError};
