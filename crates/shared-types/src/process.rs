//! # Process Entities
//!
//! Identifiers and records for registry-managed worker processes.
//!
//! A "process" here is a remote worker unit owned by the external Process
//! Registry, not an OS process. The registry assigns identifiers at creation
//! time; everything in this crate only holds read-only references to them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Identifier of a process group.
///
/// Doubles as the broker topic-exchange name, so it must render as a plain
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(String);

impl GroupId {
    /// Generate a fresh random group id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a single process within a group.
///
/// Used as a store-key segment, a broker queue name, and the default name of
/// an unnamed pipe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(String);

impl ProcessId {
    /// Generate a fresh random process id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProcessId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ProcessId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Argument keys the registry assigns on creation.
///
/// These must be stripped from a process's arguments before the arguments are
/// resubmitted for a retry, otherwise the retry would carry identifiers that
/// belong to the dead incarnation. The fork coordinator treats this set as
/// configuration; the constants here are only the defaults.
pub mod argkeys {
    /// Group the process was created in.
    pub const GROUP_ID: &str = "group_id";
    /// Identifier the registry assigned to the process itself.
    pub const PROCESS_ID: &str = "process_id";
    /// Identifier of the parent process.
    pub const PARENT_ID: &str = "parent_id";
    /// Address of the host the process was placed on.
    pub const HOST: &str = "host";

    /// All registry-assigned keys, in no particular order.
    pub const ASSIGNED: [&str; 4] = [GROUP_ID, PROCESS_ID, PARENT_ID, HOST];
}

/// A process as reported by the registry.
///
/// Owned by the registry; callers hold it read-only. The `args` map carries
/// both caller-supplied and registry-assigned entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// Identifier assigned by the registry.
    pub pid: ProcessId,
    /// Group the process belongs to.
    pub gid: GroupId,
    /// Parent process, if any.
    pub ppid: Option<ProcessId>,
    /// Creation arguments, including registry-assigned entries.
    pub args: HashMap<String, String>,
}

impl ProcessRecord {
    /// Rebuild a spawn request from this record's arguments, dropping the
    /// keys named in `strip`.
    #[must_use]
    pub fn to_retry_request(&self, strip: &[String]) -> SpawnRequest {
        let args = self
            .args
            .iter()
            .filter(|(k, _)| !strip.iter().any(|s| s == *k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        SpawnRequest { args }
    }
}

/// Creation arguments for one child process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRequest {
    /// Key-value arguments handed to the registry verbatim.
    pub args: HashMap<String, String>,
}

impl SpawnRequest {
    /// An empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one argument (builder style).
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}
