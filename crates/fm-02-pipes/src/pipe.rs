//! # Pipe Handle
//!
//! One process's handle on a pipe: its own endpoint states plus the shared
//! queue.

use crate::state::{keys, EndpointState, Namespace};
use crate::store::{PipeConfig, PipeError};
use shared_store::SharedStore;
use shared_types::ProcessId;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

/// Result of a blocking read.
///
/// End-of-stream is a normal outcome, not an error: callers distinguish
/// "stream ended" from "never had a read descriptor" without catching
/// anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One payload popped off the queue.
    Data(Vec<u8>),
    /// Queue empty and no participant holds an open write end. The pipe's
    /// keys have been flushed as a side effect.
    Eof,
}

/// Result of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// At least one participant holds an open read end.
    Delivered,
    /// Nobody is reading. The data was still enqueued; a reader may
    /// legitimately race the writer, so the write is not rolled back.
    NoReader,
}

/// A pipe as seen by one process.
pub struct Pipe {
    store: Arc<dyn SharedStore>,
    pid: ProcessId,
    name: String,
    ns: Namespace,
    read_state: EndpointState,
    write_state: EndpointState,
    config: PipeConfig,
    /// Latched once a read hit end-of-stream; later reads answer `Eof`
    /// again instead of resurrecting flushed state.
    eof: bool,
}

impl Pipe {
    pub(crate) fn new(
        store: Arc<dyn SharedStore>,
        pid: ProcessId,
        name: String,
        ns: Namespace,
        read_state: EndpointState,
        write_state: EndpointState,
        config: PipeConfig,
    ) -> Self {
        Self {
            store,
            pid,
            name,
            ns,
            read_state,
            write_state,
            config,
            eof: false,
        }
    }

    /// The pipe's resolved name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for named pipes, false for fork-scoped ones.
    #[must_use]
    pub fn is_named(&self) -> bool {
        self.ns == Namespace::Named
    }

    /// This process's read endpoint state.
    #[must_use]
    pub fn read_state(&self) -> EndpointState {
        self.read_state
    }

    /// This process's write endpoint state.
    #[must_use]
    pub fn write_state(&self) -> EndpointState {
        self.write_state
    }

    /// Blocking read: poll the queue until data arrives or the stream ends.
    ///
    /// Fails with [`PipeError::NoReadDescriptor`] when this process's read
    /// end is closed. Ends with [`ReadOutcome::Eof`] once the queue is empty
    /// and no open write end remains anywhere, flushing the pipe's keys.
    /// With `max_block` configured, gives up with [`PipeError::ReadTimeout`].
    pub async fn read(&mut self) -> Result<ReadOutcome, PipeError> {
        if !self.read_state.is_open() {
            return Err(PipeError::NoReadDescriptor);
        }
        if self.eof {
            return Ok(ReadOutcome::Eof);
        }

        let queue = keys::queue(self.ns, &self.name);
        let started = Instant::now();
        loop {
            if let Some(data) = self.store.lpop(&queue).await? {
                return Ok(ReadOutcome::Data(data));
            }
            if !self.has_writer().await? {
                debug!(pipe = %self.name, "end of stream, flushing");
                self.flush().await?;
                self.eof = true;
                return Ok(ReadOutcome::Eof);
            }
            if let Some(max) = self.config.max_block {
                if started.elapsed() >= max {
                    return Err(PipeError::ReadTimeout);
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Enqueue `data`, then report whether anyone is reading.
    ///
    /// The order is deliberate: the data is pushed before the reader check,
    /// and a [`WriteOutcome::NoReader`] answer does not undo it.
    pub async fn write(&mut self, data: Vec<u8>) -> Result<WriteOutcome, PipeError> {
        if !self.write_state.is_open() {
            return Err(PipeError::NoWriteDescriptor);
        }
        let queue = keys::queue(self.ns, &self.name);
        self.store.rpush(&queue, data).await?;
        if self.has_reader().await? {
            Ok(WriteOutcome::Delivered)
        } else {
            Ok(WriteOutcome::NoReader)
        }
    }

    /// Close this process's read end, persisted immediately.
    pub async fn close_reader(&mut self) -> Result<(), PipeError> {
        self.read_state = EndpointState::Closed;
        let hash = keys::read_state(self.ns, &self.name);
        self.store
            .hset(&hash, self.pid.as_str(), &self.read_state.encode())
            .await?;
        Ok(())
    }

    /// Close this process's write end, persisted immediately.
    pub async fn close_writer(&mut self) -> Result<(), PipeError> {
        self.write_state = EndpointState::Closed;
        let hash = keys::write_state(self.ns, &self.name);
        self.store
            .hset(&hash, self.pid.as_str(), &self.write_state.encode())
            .await?;
        Ok(())
    }

    /// Does any participant hold an open read end?
    ///
    /// Zero or one recorded state counts as "yes": a pipe nobody (or only one
    /// side) has registered on is assumed still usable.
    pub async fn has_reader(&self) -> Result<bool, PipeError> {
        let hash = keys::read_state(self.ns, &self.name);
        Ok(any_open(&self.store.hvals(&hash).await?))
    }

    /// Does any participant hold an open write end? Same registration rule
    /// as [`has_reader`](Self::has_reader).
    pub async fn has_writer(&self) -> Result<bool, PipeError> {
        let hash = keys::write_state(self.ns, &self.name);
        Ok(any_open(&self.store.hvals(&hash).await?))
    }

    /// Delete the queue and both state hashes; for unnamed pipes also every
    /// reference record pointing here.
    pub async fn flush(&self) -> Result<(), PipeError> {
        let mut doomed = vec![
            keys::queue(self.ns, &self.name),
            keys::read_state(self.ns, &self.name),
            keys::write_state(self.ns, &self.name),
        ];
        if self.ns == Namespace::Fork {
            doomed.extend(
                self.store
                    .keys(&keys::references_for_name(&self.name))
                    .await?,
            );
        }
        self.store.del(&doomed).await?;
        Ok(())
    }
}

fn any_open(states: &[String]) -> bool {
    if states.len() <= 1 {
        return true;
    }
    states.iter().any(|s| EndpointState::decode(s).is_open())
}
