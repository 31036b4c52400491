//! # Group Context
//!
//! The identity a participant carries while talking to the registry, the
//! shared store, and the broker. Passed explicitly into constructors; there
//! is no process-wide singleton.

use crate::process::{GroupId, ProcessId};
use serde::{Deserialize, Serialize};

/// Ambient identity of the current participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupContext {
    /// Group this participant belongs to.
    pub gid: GroupId,
    /// This participant's own process id.
    pub pid: ProcessId,
    /// Parent process id, absent for the group's root process.
    pub ppid: Option<ProcessId>,
}

impl GroupContext {
    /// Context for a root process (no parent).
    #[must_use]
    pub fn new(gid: GroupId, pid: ProcessId) -> Self {
        Self {
            gid,
            pid,
            ppid: None,
        }
    }

    /// Context for a child process.
    #[must_use]
    pub fn with_parent(gid: GroupId, pid: ProcessId, ppid: ProcessId) -> Self {
        Self {
            gid,
            pid,
            ppid: Some(ppid),
        }
    }

    /// True when this participant was spawned by another process.
    #[must_use]
    pub fn has_parent(&self) -> bool {
        self.ppid.is_some()
    }
}
