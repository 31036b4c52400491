//! # Fork Coordinator
//!
//! The retry loop over create/handshake/classify passes.

use crate::registry::{ProcessRegistry, RegistryError};
use fm_01_handshake::{HandshakeChannel, HandshakeError, MessageBroker};
use fm_02_pipes::{PipeError, PipeStore};
use shared_types::{argkeys, GroupContext, ProcessRecord, SpawnRequest};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Errors that abort a `fork` outright.
///
/// Individual creation failures and handshake non-reports never surface
/// here; they feed the retry queue instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ForkError {
    /// A whole pass produced zero created processes.
    #[error("No child process was created")]
    NoChildCreated,

    /// A whole pass produced zero live processes.
    #[error("No child process is active")]
    NoChildActive,

    /// The handshake channel failed (connection loss is fatal here; the
    /// outer retry loop only re-runs whole passes, not channel opens).
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// Wiring a survivor's pipe failed.
    #[error(transparent)]
    Pipe(#[from] PipeError),

    /// Deleting a dead process failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Tuning for the fork protocol.
#[derive(Debug, Clone)]
pub struct ForkConfig {
    /// Deadline for one pass's handshake wait.
    pub handshake_timeout: Duration,
    /// Argument keys stripped before a dead child's arguments are
    /// resubmitted. Defaults to the registry-assigned set.
    pub strip_keys: Vec<String>,
}

impl Default for ForkConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(180),
            strip_keys: argkeys::ASSIGNED.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// Orchestrates spawn batches for one parent process.
pub struct ForkCoordinator {
    ctx: GroupContext,
    registry: Arc<dyn ProcessRegistry>,
    broker: Arc<dyn MessageBroker>,
    pipes: PipeStore,
    config: ForkConfig,
}

impl ForkCoordinator {
    /// Bind a coordinator to the calling process.
    #[must_use]
    pub fn new(
        ctx: GroupContext,
        registry: Arc<dyn ProcessRegistry>,
        broker: Arc<dyn MessageBroker>,
        pipes: PipeStore,
        config: ForkConfig,
    ) -> Self {
        Self {
            ctx,
            registry,
            broker,
            pipes,
            config,
        }
    }

    /// Spawn every requested child, retrying the failed subset until none
    /// remains.
    ///
    /// Returns the accumulated live records across all passes, each already
    /// pipe-shared with the caller and sent its `"start"` acknowledgement.
    /// Fatal conditions (`NoChildCreated`, `NoChildActive`, broker connect
    /// failure) abort the whole call with no partial result.
    pub async fn fork(
        &self,
        requests: Vec<SpawnRequest>,
    ) -> Result<Vec<ProcessRecord>, ForkError> {
        let mut result = Vec::new();
        let mut queue = requests;
        let mut pass = 0_u32;

        while !queue.is_empty() {
            pass += 1;
            debug!(pass, requests = queue.len(), "fork pass started");

            let (created, mut retry) = self.create_batch(std::mem::take(&mut queue)).await;
            if created.is_empty() {
                return Err(ForkError::NoChildCreated);
            }

            let mut channel =
                HandshakeChannel::open(self.ctx.clone(), Arc::clone(&self.broker)).await?;
            let reported = channel
                .receive_until(self.config.handshake_timeout, created.len())
                .await?;
            let reported: HashSet<_> = reported.into_iter().map(|m| m.pid).collect();

            let mut alive = Vec::new();
            let mut dead = 0_usize;
            for record in created {
                if reported.contains(&record.pid) {
                    self.pipes.share(&self.ctx.pid, &record.pid).await?;
                    channel.send(&record.pid, Some("start".to_owned())).await?;
                    alive.push(record);
                } else {
                    self.registry.delete(&self.ctx.gid, &record.pid).await?;
                    retry.push(record.to_retry_request(&self.config.strip_keys));
                    dead += 1;
                }
            }

            if alive.is_empty() {
                return Err(ForkError::NoChildActive);
            }

            info!(
                pass,
                alive = alive.len(),
                dead,
                retrying = retry.len(),
                "fork pass finished"
            );
            result.extend(alive);
            queue = retry;
        }

        Ok(result)
    }

    /// Delete one process, whatever its state.
    pub async fn kill(&self, pid: &shared_types::ProcessId) -> Result<(), ForkError> {
        self.registry.delete(&self.ctx.gid, pid).await?;
        Ok(())
    }

    /// Launch one concurrent creation call per request and join them all.
    ///
    /// Failures are captured per request, never propagated: one bad create
    /// must not abort its siblings. Results flow back through the join
    /// handles; there is no shared mutable collection.
    async fn create_batch(
        &self,
        requests: Vec<SpawnRequest>,
    ) -> (Vec<ProcessRecord>, Vec<SpawnRequest>) {
        let mut tasks = JoinSet::new();
        for request in requests {
            let registry = Arc::clone(&self.registry);
            let gid = self.ctx.gid.clone();
            let ppid = self.ctx.pid.clone();
            tasks.spawn(async move {
                match registry.create(&gid, &ppid, request.args.clone()).await {
                    Ok(record) => Ok(record),
                    Err(e) => {
                        warn!(error = %e, "process creation failed");
                        Err(request)
                    }
                }
            });
        }

        let mut created = Vec::new();
        let mut failed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(record)) => created.push(record),
                Ok(Err(request)) => failed.push(request),
                Err(e) => warn!(error = %e, "creation task failed to join"),
            }
        }
        debug!(
            created = created.len(),
            failed = failed.len(),
            "creation batch joined"
        );
        (created, failed)
    }
}
