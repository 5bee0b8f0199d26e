//! Output side of a retrieval: line sinks and backpressure.
//!
//! A [`Transport`] is the raw outlet (an HTTP body channel, a socket, a test
//! double). It answers every write attempt immediately with a
//! [`WriteStatus`] and can be awaited until it has room again.
//! [`BackpressureSink`] turns that into a [`LineSink`]: a line is retried
//! until accepted, and the next line is not attempted before that.

use std::future::Future;
use std::io;

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Outcome of a non-blocking write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Accepted,
    /// No room right now; await [`Transport::ready`] and retry.
    Full,
    /// The consumer is gone. Nothing more will be accepted.
    Closed,
}

/// A byte outlet that reports flow-control state per write.
pub trait Transport: Send {
    fn try_write(&mut self, payload: &Bytes) -> WriteStatus;

    /// Resolve once the transport can probably take another write.
    fn ready(&mut self) -> impl Future<Output = io::Result<()>> + Send;

    /// Stop accepting writes and signal end-of-stream to the consumer.
    fn close(&mut self) {}

    /// End the stream with an error instead of a clean close. Transports
    /// that cannot carry an error just close.
    fn abort(&mut self, err: io::Error) -> impl Future<Output = ()> + Send {
        drop(err);
        self.close();
        async {}
    }
}

/// Consumer of retrieved lines (or aggregated frames).
pub trait LineSink: Send {
    /// Deliver one unit. Resolves only once the unit has been accepted.
    fn send(&mut self, line: Bytes) -> impl Future<Output = io::Result<()>> + Send;

    fn close(&mut self) {}
}

impl LineSink for Vec<Bytes> {
    async fn send(&mut self, line: Bytes) -> io::Result<()> {
        self.push(line);
        Ok(())
    }
}

fn closed_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "output transport closed")
}

// ---------------------------------------------------------------------------
// BackpressureSink
// ---------------------------------------------------------------------------

/// Wraps a [`Transport`] so every line is written exactly once, in order,
/// waiting out backpressure between attempts.
#[derive(Debug)]
pub struct BackpressureSink<T> {
    transport: T,
    retries: u64,
    closed: bool,
}

impl<T: Transport> BackpressureSink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retries: 0,
            closed: false,
        }
    }

    /// How many writes had to wait for the transport.
    pub fn retries(&self) -> u64 {
        self.retries
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Terminate the output abnormally. Used when a failure happens after
    /// output has started and a clean end would look like success.
    pub async fn abort(&mut self, err: io::Error) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.transport.abort(err).await;
    }
}

impl<T: Transport> LineSink for BackpressureSink<T> {
    async fn send(&mut self, line: Bytes) -> io::Result<()> {
        if self.closed {
            return Err(closed_pipe());
        }
        loop {
            match self.transport.try_write(&line) {
                WriteStatus::Accepted => return Ok(()),
                WriteStatus::Full => {
                    self.retries += 1;
                    self.transport.ready().await?;
                }
                WriteStatus::Closed => return Err(closed_pipe()),
            }
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.transport.close();
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelTransport
// ---------------------------------------------------------------------------

/// Receiving half of a [`ChannelTransport`]; an `Err` item means the stream
/// was aborted.
pub type ChunkReceiver = mpsc::Receiver<io::Result<Bytes>>;

/// [`Transport`] over a bounded tokio channel. The channel capacity is the
/// only buffering between producer and consumer.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: Option<mpsc::Sender<io::Result<Bytes>>>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn channel(capacity: usize) -> (Self, ChunkReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

impl Transport for ChannelTransport {
    fn try_write(&mut self, payload: &Bytes) -> WriteStatus {
        let Some(tx) = &self.tx else {
            return WriteStatus::Closed;
        };
        match tx.try_send(Ok(payload.clone())) {
            Ok(()) => WriteStatus::Accepted,
            Err(TrySendError::Full(_)) => WriteStatus::Full,
            Err(TrySendError::Closed(_)) => WriteStatus::Closed,
        }
    }

    async fn ready(&mut self) -> io::Result<()> {
        let Some(tx) = &self.tx else {
            return Err(closed_pipe());
        };
        // The permit is released straight away; the caller retries try_write.
        tx.reserve().await.map(drop).map_err(|_| closed_pipe())
    }

    fn close(&mut self) {
        self.tx = None;
    }

    async fn abort(&mut self, err: io::Error) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(err)).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
