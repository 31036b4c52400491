//! # In-Memory Broker
//!
//! Single-process implementation of the broker ports, suitable for tests and
//! embedded operation. Queues are durable: they outlive consumers, and
//! publishing declares the target queue if nobody bound it yet (the broker
//! knows every process queue is bound under `<gid>.<pid>`).

use crate::broker::{routing_key, Delivery, HandshakeError, Mailbox, MessageBroker};
use async_trait::async_trait;
use shared_types::{GroupId, ProcessId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
struct Queue {
    messages: Mutex<VecDeque<Delivery>>,
    notify: Notify,
}

/// In-memory topic broker.
#[derive(Default)]
pub struct InMemoryBroker {
    /// Queues keyed by their binding routing key (`<gid>.<pid>`).
    queues: RwLock<HashMap<String, Arc<Queue>>>,
    next_tag: AtomicU64,
    acked: Arc<AtomicU64>,
    /// Simulates a broker outage; every operation fails while set.
    down: AtomicBool,
}

impl InMemoryBroker {
    /// Create a broker with no queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the broker being unreachable.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Number of deliveries acknowledged so far, across all mailboxes.
    #[must_use]
    pub fn acked(&self) -> u64 {
        self.acked.load(Ordering::SeqCst)
    }

    /// Messages currently sitting on a process's queue.
    #[must_use]
    pub fn queue_depth(&self, gid: &GroupId, pid: &ProcessId) -> usize {
        let key = routing_key(gid, pid);
        let queues = match self.queues.read() {
            Ok(q) => q,
            Err(_) => return 0,
        };
        queues
            .get(&key)
            .and_then(|q| q.messages.lock().ok().map(|m| m.len()))
            .unwrap_or(0)
    }

    fn queue(&self, key: &str) -> Result<Arc<Queue>, HandshakeError> {
        let mut queues = self
            .queues
            .write()
            .map_err(|_| HandshakeError::Broker("broker lock poisoned".into()))?;
        Ok(Arc::clone(queues.entry(key.to_owned()).or_default()))
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn open_mailbox(
        &self,
        gid: &GroupId,
        pid: &ProcessId,
    ) -> Result<Box<dyn Mailbox>, HandshakeError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(HandshakeError::Connect("broker is down".into()));
        }
        let queue = self.queue(&routing_key(gid, pid))?;
        debug!(gid = %gid, pid = %pid, "mailbox opened");
        Ok(Box::new(InMemoryMailbox {
            queue,
            unacked: HashSet::new(),
            acked: Arc::clone(&self.acked),
        }))
    }

    async fn publish(
        &self,
        _gid: &GroupId,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), HandshakeError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(HandshakeError::Broker("broker is down".into()));
        }
        let queue = self.queue(routing_key)?;
        let tag = self.next_tag.fetch_add(1, Ordering::SeqCst);
        {
            let mut messages = queue
                .messages
                .lock()
                .map_err(|_| HandshakeError::Broker("queue lock poisoned".into()))?;
            messages.push_back(Delivery { payload, tag });
        }
        queue.notify.notify_one();
        Ok(())
    }
}

struct InMemoryMailbox {
    queue: Arc<Queue>,
    unacked: HashSet<u64>,
    acked: Arc<AtomicU64>,
}

impl InMemoryMailbox {
    fn pop(&mut self) -> Option<Delivery> {
        let mut messages = self.queue.messages.lock().ok()?;
        let delivery = messages.pop_front()?;
        self.unacked.insert(delivery.tag);
        Some(delivery)
    }
}

#[async_trait]
impl Mailbox for InMemoryMailbox {
    async fn next(&mut self) -> Option<Delivery> {
        loop {
            if let Some(delivery) = self.pop() {
                return Some(delivery);
            }
            self.queue.notify.notified().await;
        }
    }

    async fn ack(&mut self, tag: u64) -> Result<(), HandshakeError> {
        if !self.unacked.remove(&tag) {
            return Err(HandshakeError::Broker(format!("unknown delivery tag {tag}")));
        }
        self.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn ids() -> (GroupId, ProcessId) {
        (GroupId::from("g"), ProcessId::from("p"))
    }

    #[tokio::test]
    async fn test_publish_then_consume() {
        let broker = InMemoryBroker::new();
        let (gid, pid) = ids();
        let mut mailbox = broker.open_mailbox(&gid, &pid).await.unwrap();

        broker
            .publish(&gid, &routing_key(&gid, &pid), b"hello".to_vec())
            .await
            .unwrap();

        let delivery = timeout(Duration::from_millis(100), mailbox.next())
            .await
            .expect("timeout")
            .expect("delivery");
        assert_eq!(delivery.payload, b"hello");

        mailbox.ack(delivery.tag).await.unwrap();
        assert_eq!(broker.acked(), 1);
    }

    #[tokio::test]
    async fn test_queue_survives_consumer() {
        let broker = InMemoryBroker::new();
        let (gid, pid) = ids();

        // Published before any mailbox exists; the durable queue keeps it.
        broker
            .publish(&gid, &routing_key(&gid, &pid), b"early".to_vec())
            .await
            .unwrap();
        assert_eq!(broker.queue_depth(&gid, &pid), 1);

        let mut mailbox = broker.open_mailbox(&gid, &pid).await.unwrap();
        let delivery = mailbox.next().await.unwrap();
        assert_eq!(delivery.payload, b"early");
    }

    #[tokio::test]
    async fn test_ack_unknown_tag_fails() {
        let broker = InMemoryBroker::new();
        let (gid, pid) = ids();
        let mut mailbox = broker.open_mailbox(&gid, &pid).await.unwrap();
        assert!(mailbox.ack(42).await.is_err());
    }

    #[tokio::test]
    async fn test_down_broker_refuses_connections() {
        let broker = InMemoryBroker::new();
        let (gid, pid) = ids();
        broker.set_down(true);

        let err = broker.open_mailbox(&gid, &pid).await.err().unwrap();
        assert!(matches!(err, HandshakeError::Connect(_)));

        let err = broker
            .publish(&gid, &routing_key(&gid, &pid), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Broker(_)));
    }

    #[tokio::test]
    async fn test_routing_is_per_process() {
        let broker = InMemoryBroker::new();
        let gid = GroupId::from("g");
        let (a, b) = (ProcessId::from("a"), ProcessId::from("b"));
        let mut mailbox_a = broker.open_mailbox(&gid, &a).await.unwrap();
        let _mailbox_b = broker.open_mailbox(&gid, &b).await.unwrap();

        broker
            .publish(&gid, &routing_key(&gid, &a), b"for-a".to_vec())
            .await
            .unwrap();

        let delivery = mailbox_a.next().await.unwrap();
        assert_eq!(delivery.payload, b"for-a");
        assert_eq!(broker.queue_depth(&gid, &b), 0);
    }
}
