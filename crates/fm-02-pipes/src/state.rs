//! # Endpoint State
//!
//! Per-participant open/closed state of one pipe end, and the key shapes the
//! pipe subsystem writes into the shared store.

use std::time::{SystemTime, UNIX_EPOCH};

/// The stored marker for a closed endpoint.
const CLOSED_MARKER: &str = "close";

/// Open/closed state of one endpoint for one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Endpoint is open; the timestamp records when it was (re)opened,
    /// in milliseconds since the epoch.
    Open(u64),
    /// Endpoint was explicitly closed.
    Closed,
}

impl EndpointState {
    /// An endpoint opened right now.
    #[must_use]
    pub fn open_now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self::Open(millis)
    }

    /// True unless the endpoint is closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// Store representation: `"close"` or the open timestamp.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Open(millis) => millis.to_string(),
            Self::Closed => CLOSED_MARKER.to_owned(),
        }
    }

    /// Parse a store value. Anything that is not the closed marker counts as
    /// open; an unparseable timestamp degrades to `Open(0)`.
    #[must_use]
    pub fn decode(value: &str) -> Self {
        if value == CLOSED_MARKER {
            Self::Closed
        } else {
            Self::Open(value.parse().unwrap_or(0))
        }
    }

    /// The state a shared endpoint inherits: closed stays closed, anything
    /// open is re-stamped to now.
    #[must_use]
    pub fn restamped(&self) -> Self {
        match self {
            Self::Closed => Self::Closed,
            Self::Open(_) => Self::open_now(),
        }
    }
}

/// Which key namespace a pipe lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Unnamed pipes, implicitly scoped to a process id and inheritable
    /// across fork.
    Fork,
    /// Named pipes, addressed by a user-chosen label.
    Named,
}

impl Namespace {
    fn prefix(self) -> &'static str {
        match self {
            Self::Fork => "pipe",
            Self::Named => "fifo",
        }
    }
}

/// Key shapes. Reference records only exist for unnamed pipes.
pub(crate) mod keys {
    use super::Namespace;

    pub fn queue(ns: Namespace, name: &str) -> String {
        format!("{}:{}", ns.prefix(), name)
    }

    pub fn read_state(ns: Namespace, name: &str) -> String {
        format!("{}:{}_read", ns.prefix(), name)
    }

    pub fn write_state(ns: Namespace, name: &str) -> String {
        format!("{}:{}_write", ns.prefix(), name)
    }

    pub fn reference(name: &str, pid: &str) -> String {
        format!("pipe:{name}:{pid}")
    }

    /// Every reference record pointing a process at its inherited pipe.
    pub fn references_for_pid(pid: &str) -> String {
        format!("pipe:*:{pid}")
    }

    /// Every reference record pointing at a pipe.
    pub fn references_for_name(name: &str) -> String {
        format!("pipe:{name}:*")
    }
}
