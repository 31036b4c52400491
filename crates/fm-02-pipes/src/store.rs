//! # Pipe Store
//!
//! Opens pipes for the current process, shares them across a fork, and tears
//! them down administratively.

use crate::pipe::Pipe;
use crate::state::{keys, EndpointState, Namespace};
use shared_store::{SharedStore, StoreError};
use shared_types::{GroupContext, ProcessId};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from pipe operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipeError {
    /// Read attempted on a closed read end, or a write found no reader where
    /// one was required.
    #[error("Read descriptor not found")]
    NoReadDescriptor,

    /// Write attempted on a closed write end.
    #[error("Write descriptor not found")]
    NoWriteDescriptor,

    /// A bounded blocking read exhausted its maximum blocking time.
    #[error("Read exceeded the configured maximum blocking time")]
    ReadTimeout,

    /// The shared store failed underneath.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tuning for the blocking read loop.
#[derive(Debug, Clone, Copy)]
pub struct PipeConfig {
    /// Interval between queue polls.
    pub poll_interval: Duration,
    /// Upper bound on one blocking read; `None` blocks indefinitely.
    pub max_block: Option<Duration>,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_block: None,
        }
    }
}

/// Factory and administrative surface for pipes, bound to one process's
/// context.
pub struct PipeStore {
    ctx: GroupContext,
    store: Arc<dyn SharedStore>,
    config: PipeConfig,
}

impl PipeStore {
    /// Bind a pipe store to the calling process.
    #[must_use]
    pub fn new(ctx: GroupContext, store: Arc<dyn SharedStore>, config: PipeConfig) -> Self {
        Self { ctx, store, config }
    }

    /// Open a pipe.
    ///
    /// With `name`, the pipe is *named*: both endpoint states start "open
    /// now" regardless of history. Without it, the pipe is *unnamed*: a
    /// reference record left by the parent's `share` decides the name (and
    /// any previously recorded state for this process is adopted); with no
    /// reference the pipe is named after this process id. `read`/`write`
    /// override the computed state: `Some(true)` opens now, `Some(false)`
    /// closes, `None` leaves it as computed. The resulting states are
    /// persisted before the handle is returned.
    pub async fn open(
        &self,
        name: Option<&str>,
        read: Option<bool>,
        write: Option<bool>,
    ) -> Result<Pipe, PipeError> {
        let pid = self.ctx.pid.clone();
        let now = EndpointState::open_now();

        let (ns, pipe_name, mut read_state, mut write_state) = match name {
            Some(label) => (Namespace::Named, label.to_owned(), now, now),
            None => {
                let pipe_name = self.resolve_reference(&pid).await?;
                let read_state = self
                    .stored_state(Namespace::Fork, &pipe_name, keys::read_state, &pid)
                    .await?
                    .unwrap_or(now);
                let write_state = self
                    .stored_state(Namespace::Fork, &pipe_name, keys::write_state, &pid)
                    .await?
                    .unwrap_or(now);
                (Namespace::Fork, pipe_name, read_state, write_state)
            }
        };

        if let Some(read) = read {
            read_state = if read {
                EndpointState::open_now()
            } else {
                EndpointState::Closed
            };
        }
        if let Some(write) = write {
            write_state = if write {
                EndpointState::open_now()
            } else {
                EndpointState::Closed
            };
        }

        self.store
            .hset(
                &keys::read_state(ns, &pipe_name),
                pid.as_str(),
                &read_state.encode(),
            )
            .await?;
        self.store
            .hset(
                &keys::write_state(ns, &pipe_name),
                pid.as_str(),
                &write_state.encode(),
            )
            .await?;

        debug!(pipe = %pipe_name, named = name.is_some(), "pipe opened");
        Ok(Pipe::new(
            Arc::clone(&self.store),
            pid,
            pipe_name,
            ns,
            read_state,
            write_state,
            self.config,
        ))
    }

    /// Hand the parent's pipe down to a child.
    ///
    /// Resolves the pipe the parent is using (its own reference record, else
    /// a pipe named after the parent itself). Returns `false` when the
    /// parent has no pipe state at all. Otherwise writes the child's
    /// reference record and copies the parent's openness, re-stamped to now
    /// unless closed.
    pub async fn share(
        &self,
        parent: &ProcessId,
        child: &ProcessId,
    ) -> Result<bool, PipeError> {
        let refs = self
            .store
            .keys(&keys::references_for_pid(parent.as_str()))
            .await?;
        let referenced = match refs.first() {
            Some(key) => self.store.get(key).await?,
            None => None,
        };

        let name = match referenced {
            Some(name) => name,
            None => {
                let own_state = self
                    .store
                    .keys(&keys::read_state(Namespace::Fork, parent.as_str()))
                    .await?;
                if own_state.is_empty() {
                    return Ok(false);
                }
                parent.to_string()
            }
        };

        self.store
            .set(&keys::reference(&name, child.as_str()), &name)
            .await?;

        let read_hash = keys::read_state(Namespace::Fork, &name);
        let write_hash = keys::write_state(Namespace::Fork, &name);
        let read = self.inherited_state(&read_hash, parent).await?;
        let write = self.inherited_state(&write_hash, parent).await?;
        self.store
            .hset(&read_hash, child.as_str(), &read.encode())
            .await?;
        self.store
            .hset(&write_hash, child.as_str(), &write.encode())
            .await?;

        debug!(pipe = %name, parent = %parent, child = %child, "pipe shared");
        Ok(true)
    }

    /// Tear down the unnamed pipe owned by `pid`: queue, state hashes, and
    /// every reference record pointing at it.
    pub async fn flush_by_pid(&self, pid: &ProcessId) -> Result<(), PipeError> {
        let name = pid.as_str();
        let mut doomed = vec![
            keys::queue(Namespace::Fork, name),
            keys::read_state(Namespace::Fork, name),
            keys::write_state(Namespace::Fork, name),
        ];
        doomed.extend(self.store.keys(&keys::references_for_name(name)).await?);
        self.store.del(&doomed).await?;
        Ok(())
    }

    /// Tear down a named pipe.
    pub async fn flush_by_name(&self, name: &str) -> Result<(), PipeError> {
        let doomed = vec![
            keys::queue(Namespace::Named, name),
            keys::read_state(Namespace::Named, name),
            keys::write_state(Namespace::Named, name),
        ];
        self.store.del(&doomed).await?;
        Ok(())
    }

    /// The pipe name `pid` should use: its reference record's target, else
    /// its own id.
    async fn resolve_reference(&self, pid: &ProcessId) -> Result<String, PipeError> {
        let refs = self
            .store
            .keys(&keys::references_for_pid(pid.as_str()))
            .await?;
        if let Some(key) = refs.first() {
            if let Some(name) = self.store.get(key).await? {
                return Ok(name);
            }
        }
        Ok(pid.to_string())
    }

    async fn stored_state(
        &self,
        ns: Namespace,
        name: &str,
        key_fn: fn(Namespace, &str) -> String,
        pid: &ProcessId,
    ) -> Result<Option<EndpointState>, PipeError> {
        let value = self.store.hget(&key_fn(ns, name), pid.as_str()).await?;
        Ok(value.as_deref().map(EndpointState::decode))
    }

    /// Parent's recorded state for one hash, restamped for the child. A
    /// parent with no record of its own hands down an open endpoint.
    async fn inherited_state(
        &self,
        hash: &str,
        parent: &ProcessId,
    ) -> Result<EndpointState, PipeError> {
        let state = self
            .store
            .hget(hash, parent.as_str())
            .await?
            .map(|v| EndpointState::decode(&v))
            .unwrap_or_else(EndpointState::open_now);
        Ok(state.restamped())
    }
}
