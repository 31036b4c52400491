//! # Registry Port
//!
//! What the coordinator needs from the external Process Registry. The
//! registry owns every `ProcessRecord`; this side only creates, reads, and
//! deletes them.

use async_trait::async_trait;
use shared_types::{GroupId, ProcessId, ProcessRecord};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from registry calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry rejected or failed the request.
    #[error("Registry request failed: {0}")]
    Request(String),

    /// The named process does not exist.
    #[error("Process not found: {0}")]
    NotFound(ProcessId),
}

/// Request/response interface to the Process Registry.
#[async_trait]
pub trait ProcessRegistry: Send + Sync {
    /// Create one process in `gid` under `ppid`.
    ///
    /// The returned record's `args` include both the caller's entries and
    /// the keys the registry assigned (group, process, parent, host).
    async fn create(
        &self,
        gid: &GroupId,
        ppid: &ProcessId,
        args: HashMap<String, String>,
    ) -> Result<ProcessRecord, RegistryError>;

    /// Delete one process.
    async fn delete(&self, gid: &GroupId, pid: &ProcessId) -> Result<(), RegistryError>;
}
