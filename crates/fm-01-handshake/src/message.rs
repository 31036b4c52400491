//! # Handshake Message
//!
//! The only record that ever crosses the handshake channel.

use serde::{Deserialize, Serialize};
use shared_types::ProcessId;

use crate::broker::HandshakeError;

/// A child's liveness announcement, or the parent's acknowledgement.
///
/// Ephemeral: exists only on the broker queue and is discarded after one
/// consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeMessage {
    /// Sender's process id.
    pub pid: ProcessId,
    /// Optional payload; the parent sends `"start"` here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HandshakeMessage {
    /// An announcement with no payload.
    #[must_use]
    pub fn announce(pid: ProcessId) -> Self {
        Self { pid, message: None }
    }

    /// Serialize for the wire. The broker treats the payload as opaque bytes.
    pub fn encode(&self) -> Result<Vec<u8>, HandshakeError> {
        serde_json::to_vec(self).map_err(|e| HandshakeError::Codec(e.to_string()))
    }

    /// Deserialize from the wire.
    pub fn decode(payload: &[u8]) -> Result<Self, HandshakeError> {
        serde_json::from_slice(payload).map_err(|e| HandshakeError::Codec(e.to_string()))
    }
}
