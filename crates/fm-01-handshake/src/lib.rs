//! # Handshake Channel
//!
//! The one-shot liveness protocol between a parent and its freshly spawned
//! children, built on a topic-routed publish/subscribe broker.
//!
//! ## Protocol
//!
//! ```text
//! child                          broker                         parent
//!   │  publish {pid}               │                               │
//!   │ ────────────────────────────→│  route <gid>.<parent-pid>     │
//!   │                              │ ─────────────────────────────→│
//!   │                              │        receive_until(deadline)│
//!   │                              │  publish {pid, "start"}       │
//!   │←──────────────────────────── │←───────────────────────────── │
//!   │  announce_and_wait_start     │                               │
//! ```
//!
//! One durable queue per process id, bound to the group's topic exchange with
//! routing key `<gid>.<pid>`. Consumption acknowledges each message after it
//! has been decoded locally; a deadline cancels the consume loop without
//! losing messages that already arrived.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod broker;
pub mod channel;
pub mod memory;
pub mod message;

pub use broker::{Delivery, HandshakeError, Mailbox, MessageBroker};
pub use channel::HandshakeChannel;
pub use memory::InMemoryBroker;
pub use message::HandshakeMessage;
