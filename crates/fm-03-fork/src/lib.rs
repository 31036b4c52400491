//! # Fork Coordinator
//!
//! Spawns a batch of remote worker processes through the external Process
//! Registry, waits for each to prove end-to-end liveness over the handshake
//! channel, wires pipes for the survivors, deletes the rest, and retries the
//! failed subset with its original arguments until nothing is left to retry.
//!
//! ## One pass
//!
//! ```text
//! requests ──→ concurrent registry creates ──→ created / failed-to-create
//!                                                    │
//!                        handshake wait (deadline) ←─┘
//!                                │
//!                    alive ──────┴────── dead
//!                      │                  │
//!            share pipe + "start" ack   registry delete
//!                      │                  │
//!                  result set        re-queued with original args
//! ```
//!
//! The handshake, not the registry's status field, is the liveness source of
//! truth: a worker must prove it can publish to the channel, not merely that
//! the registry believes it exists.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod coordinator;
pub mod registry;
pub mod test_utils;

pub use coordinator::{ForkConfig, ForkCoordinator, ForkError};
pub use registry::{ProcessRegistry, RegistryError};
