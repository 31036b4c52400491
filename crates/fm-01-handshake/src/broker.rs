//! # Broker Ports
//!
//! Traits the handshake channel needs from the publish/subscribe broker.

use async_trait::async_trait;
use shared_types::{GroupId, ProcessId};
use thiserror::Error;

/// Errors from the handshake channel and its broker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandshakeError {
    /// Opening the broker connection or declaring the mailbox failed.
    ///
    /// Fatal for the caller: the channel never retries this itself.
    #[error("Broker connection failed: {0}")]
    Connect(String),

    /// Publishing or consuming failed after the connection was up.
    #[error("Broker operation failed: {0}")]
    Broker(String),

    /// A payload could not be encoded or decoded.
    #[error("Handshake payload codec error: {0}")]
    Codec(String),

    /// The parent's "start" acknowledgement never arrived.
    #[error("Timed out waiting for the start acknowledgement")]
    StartTimeout,
}

/// One message taken off a mailbox, pending acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Opaque serialized payload.
    pub payload: Vec<u8>,
    /// Tag to acknowledge this delivery with.
    pub tag: u64,
}

/// A consuming handle on one process's queue.
///
/// Dropping the mailbox stops consumption; messages already on the queue
/// stay there for the next consumer.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Wait for the next delivery. `None` means the broker went away.
    async fn next(&mut self) -> Option<Delivery>;

    /// Acknowledge a delivery after it was processed locally.
    async fn ack(&mut self, tag: u64) -> Result<(), HandshakeError>;
}

/// The topic-routed broker.
///
/// One exchange per group (named after the group id); one durable queue per
/// process id, bound with routing key `<gid>.<pid>`.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Declare and start consuming the queue for `pid` in `gid`.
    ///
    /// Connection-level failures surface as [`HandshakeError::Connect`].
    async fn open_mailbox(
        &self,
        gid: &GroupId,
        pid: &ProcessId,
    ) -> Result<Box<dyn Mailbox>, HandshakeError>;

    /// Publish an opaque payload to the group's exchange under `routing_key`.
    async fn publish(
        &self,
        gid: &GroupId,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), HandshakeError>;
}

/// Routing key for a message addressed to `pid` within `gid`.
#[must_use]
pub fn routing_key(gid: &GroupId, pid: &ProcessId) -> String {
    format!("{gid}.{pid}")
}
