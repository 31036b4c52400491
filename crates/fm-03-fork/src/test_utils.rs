//! # Test Utilities
//!
//! A scriptable in-memory registry whose "children" behave like freshly
//! booted workers: unless silenced, each announces itself over the broker
//! right after creation.

use crate::registry::{ProcessRegistry, RegistryError};
use async_trait::async_trait;
use fm_01_handshake::{HandshakeChannel, MessageBroker};
use shared_types::{argkeys, GroupContext, GroupId, ProcessId, ProcessRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    processes: HashMap<ProcessId, ProcessRecord>,
    fail_creates: usize,
    silent_children: usize,
    host_counter: u32,
}

/// In-memory stand-in for the Process Registry.
#[derive(Default)]
pub struct InMemoryRegistry {
    inner: Mutex<Inner>,
    broker: Option<Arc<dyn MessageBroker>>,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl InMemoryRegistry {
    /// Registry whose children never announce (no broker attached).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose children announce themselves over `broker` on boot.
    #[must_use]
    pub fn with_broker(broker: Arc<dyn MessageBroker>) -> Self {
        Self {
            broker: Some(broker),
            ..Self::default()
        }
    }

    /// Fail the next `n` creation calls.
    pub fn fail_next_creates(&self, n: usize) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_creates = n;
        }
    }

    /// The next `n` created children boot but never announce.
    pub fn silence_next_children(&self, n: usize) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.silent_children = n;
        }
    }

    /// Total creation calls observed, including failed ones.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Total deletion calls observed.
    #[must_use]
    pub fn deleted_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Records currently registered.
    #[must_use]
    pub fn live(&self) -> Vec<ProcessRecord> {
        self.inner
            .lock()
            .map(|inner| inner.processes.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProcessRegistry for InMemoryRegistry {
    async fn create(
        &self,
        gid: &GroupId,
        ppid: &ProcessId,
        mut args: HashMap<String, String>,
    ) -> Result<ProcessRecord, RegistryError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let (record, silent) = {
            let mut inner = self
                .inner
                .lock()
                .map_err(|_| RegistryError::Request("registry lock poisoned".into()))?;
            if inner.fail_creates > 0 {
                inner.fail_creates -= 1;
                return Err(RegistryError::Request("simulated creation failure".into()));
            }

            let pid = ProcessId::generate();
            inner.host_counter += 1;
            args.insert(argkeys::GROUP_ID.to_owned(), gid.to_string());
            args.insert(argkeys::PROCESS_ID.to_owned(), pid.to_string());
            args.insert(argkeys::PARENT_ID.to_owned(), ppid.to_string());
            args.insert(
                argkeys::HOST.to_owned(),
                format!("10.0.0.{}", inner.host_counter),
            );

            let record = ProcessRecord {
                pid: pid.clone(),
                gid: gid.clone(),
                ppid: Some(ppid.clone()),
                args,
            };
            inner.processes.insert(pid, record.clone());

            let silent = if inner.silent_children > 0 {
                inner.silent_children -= 1;
                true
            } else {
                false
            };
            (record, silent)
        };

        if !silent {
            if let Some(broker) = &self.broker {
                // The child's boot-time announcement, raced against the
                // parent's handshake wait just like a real worker's.
                let ctx =
                    GroupContext::with_parent(gid.clone(), record.pid.clone(), ppid.clone());
                let broker = Arc::clone(broker);
                let target = ppid.clone();
                tokio::spawn(async move {
                    let Ok(channel) = HandshakeChannel::open(ctx, broker).await else {
                        return;
                    };
                    let _ = channel.send(&target, None).await;
                });
            }
        } else {
            debug!(pid = %record.pid, "child created silent");
        }

        Ok(record)
    }

    async fn delete(&self, _gid: &GroupId, pid: &ProcessId) -> Result<(), RegistryError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| RegistryError::Request("registry lock poisoned".into()))?;
        inner
            .processes
            .remove(pid)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound(pid.clone()))
    }
}
