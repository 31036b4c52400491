//! # Handshake Channel
//!
//! The parent- and child-side operations on a process's mailbox.

use crate::broker::{routing_key, HandshakeError, Mailbox, MessageBroker};
use crate::message::HandshakeMessage;
use shared_types::{GroupContext, ProcessId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A process's handle on its own mailbox plus the group exchange.
pub struct HandshakeChannel {
    ctx: GroupContext,
    broker: Arc<dyn MessageBroker>,
    mailbox: Box<dyn Mailbox>,
}

impl HandshakeChannel {
    /// Open the channel for the calling process.
    ///
    /// Declares this process's queue on the group exchange. A failure here is
    /// the fatal [`HandshakeError::Connect`] kind; the channel never retries
    /// it (the fork coordinator's outer loop is the only retry site).
    pub async fn open(
        ctx: GroupContext,
        broker: Arc<dyn MessageBroker>,
    ) -> Result<Self, HandshakeError> {
        let mailbox = broker.open_mailbox(&ctx.gid, &ctx.pid).await?;
        Ok(Self {
            ctx,
            broker,
            mailbox,
        })
    }

    /// Publish `{pid: self, message}` to `target`'s queue.
    pub async fn send(
        &self,
        target: &ProcessId,
        message: Option<String>,
    ) -> Result<(), HandshakeError> {
        let payload = HandshakeMessage {
            pid: self.ctx.pid.clone(),
            message,
        }
        .encode()?;
        let key = routing_key(&self.ctx.gid, target);
        debug!(target = %target, "sending handshake message");
        self.broker.publish(&self.ctx.gid, &key, payload).await
    }

    /// Consume exactly one message from the caller's queue, or `None` once
    /// `timeout` elapses.
    pub async fn receive_one(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<HandshakeMessage>, HandshakeError> {
        let deadline = Instant::now() + timeout;
        self.receive_one_until(deadline).await
    }

    /// Consume until `count_limit` distinct senders have been seen or
    /// `timeout` elapses, whichever comes first.
    ///
    /// Already-received messages are kept when the deadline cancels the
    /// consume loop.
    pub async fn receive_until(
        &mut self,
        timeout: Duration,
        count_limit: usize,
    ) -> Result<Vec<HandshakeMessage>, HandshakeError> {
        let deadline = Instant::now() + timeout;
        let mut received = Vec::new();
        let mut senders: HashSet<ProcessId> = HashSet::new();

        while senders.len() < count_limit {
            match self.receive_one_until(deadline).await? {
                Some(message) => {
                    senders.insert(message.pid.clone());
                    received.push(message);
                    debug!(count = received.len(), distinct = senders.len(), "handshake received");
                }
                None => break,
            }
        }
        Ok(received)
    }

    /// Child-side boot handshake: announce to the parent, then block until
    /// the parent's `"start"` acknowledgement arrives.
    ///
    /// A root process (no parent) has nobody to report to and returns
    /// immediately.
    pub async fn announce_and_wait_start(
        &mut self,
        timeout: Duration,
    ) -> Result<(), HandshakeError> {
        let Some(ppid) = self.ctx.ppid.clone() else {
            return Ok(());
        };

        debug!(parent = %ppid, "announcing to parent");
        self.send(&ppid, None).await?;

        let deadline = Instant::now() + timeout;
        loop {
            match self.receive_one_until(deadline).await? {
                Some(message) if message.pid == ppid => {
                    debug!(parent = %ppid, "start acknowledgement received");
                    return Ok(());
                }
                // Not from the parent; keep waiting.
                Some(_) => continue,
                None => return Err(HandshakeError::StartTimeout),
            }
        }
    }

    async fn receive_one_until(
        &mut self,
        deadline: Instant,
    ) -> Result<Option<HandshakeMessage>, HandshakeError> {
        loop {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Ok(None);
            };
            let delivery = match tokio::time::timeout(remaining, self.mailbox.next()).await {
                Ok(Some(delivery)) => delivery,
                // Broker went away mid-consume.
                Ok(None) => return Err(HandshakeError::Broker("mailbox closed".into())),
                Err(_) => return Ok(None),
            };

            let decoded = HandshakeMessage::decode(&delivery.payload);
            self.mailbox.ack(delivery.tag).await?;
            match decoded {
                Ok(message) => return Ok(Some(message)),
                Err(e) => {
                    // Acked and dropped; an undecodable payload must not wedge
                    // the queue.
                    warn!(error = %e, "discarding undecodable handshake payload");
                }
            }
        }
    }
}
