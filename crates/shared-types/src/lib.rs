//! # Shared Types
//!
//! Domain entities shared across the orchestration crates.
//!
//! ## Clusters
//!
//! - **Identity**: `GroupId`, `ProcessId`
//! - **Processes**: `ProcessRecord`, `SpawnRequest`, `argkeys`
//! - **Context**: `GroupContext` (the ambient identity a participant carries)

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod context;
pub mod process;

pub use context::GroupContext;
pub use process::{argkeys, GroupId, ProcessId, ProcessRecord, SpawnRequest};
