//! # Distributed Pipes
//!
//! Ordered byte queues between remote processes, persisted in the shared
//! store. File descriptors cannot live in one address space when the
//! participants are remote, so every endpoint's open/closed state is an
//! explicit, independently queryable store entry:
//!
//! ```text
//! <ns>:<name>         queue of byte payloads (RPUSH / LPOP)
//! <ns>:<name>_read    hash: process id -> "close" | open timestamp
//! <ns>:<name>_write   hash: process id -> "close" | open timestamp
//! pipe:<name>:<pid>   reference record: which pipe <pid> inherited
//! ```
//!
//! Named pipes (user-chosen label) live under the `fifo:` namespace; unnamed
//! pipes (implicitly scoped to a process id, inheritable across fork) live
//! under `pipe:`. Correctness relies only on the store's per-command
//! atomicity; "no data and no open writer" is re-evaluated on every poll.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod pipe;
pub mod state;
pub mod store;

pub use pipe::{Pipe, ReadOutcome, WriteOutcome};
pub use state::EndpointState;
pub use store::{PipeConfig, PipeError, PipeStore};
