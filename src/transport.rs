//! TCP transport for eISCP sessions.
//!
//! This module knows about sockets and frames, not about the dictionary or
//! the session state machine:
//!
//! - [`connect`] opens the TCP stream with a timeout
//! - [`FrameWriter`] owns the write half and sends one framed message at a time
//! - [`spawn_reader`] runs a task that splits the read half into messages with
//!   [`EiscpCodec`] and forwards them, tagged with the session generation
//!
//! # Constants
//!
//! - [`DEFAULT_PORT`] - Default eISCP TCP and discovery port (60128)
//! - [`DEFAULT_CONNECT_TIMEOUT`] - Default TCP connect timeout (10 seconds)
//! - [`DEFAULT_WRITE_TIMEOUT`] - Default limit for writing one frame (5 seconds)

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use crate::error::{EiscpError, Result};
use crate::packet::{Destination, EiscpCodec};

/// Default eISCP port, used for both TCP sessions and UDP discovery.
pub const DEFAULT_PORT: u16 = 60128;

/// Default timeout for a TCP connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default limit for writing one frame before the connection is given up.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

const READ_BUFFER_SIZE: usize = 4096;

/// Opens a TCP session to a receiver.
///
/// # Errors
///
/// Returns `EiscpError::Io` if the connect fails or does not complete within
/// `timeout` (`ErrorKind::TimedOut`).
pub(crate) async fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    debug!(host, port, "connecting to receiver");

    let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect to {}:{} timed out after {:?}", host, port, timeout),
            )
        })??;

    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Write side of a session. Only the session actor holds one.
pub(crate) struct FrameWriter {
    half: OwnedWriteHalf,
    codec: EiscpCodec,
    buffer: BytesMut,
}

impl FrameWriter {
    pub(crate) fn new(half: OwnedWriteHalf) -> Self {
        Self {
            half,
            codec: EiscpCodec::new(Destination::Receiver),
            buffer: BytesMut::with_capacity(64),
        }
    }

    /// Frames `payload` and writes it completely before returning.
    pub(crate) async fn send(&mut self, payload: &str) -> Result<()> {
        self.buffer.clear();
        self.codec.encode(payload, &mut self.buffer)?;
        self.half.write_all(&self.buffer).await?;
        self.half.flush().await?;
        trace!(payload, bytes = self.buffer.len(), "frame written");
        Ok(())
    }
}

impl std::fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWriter")
            .field("peer_addr", &self.half.peer_addr().ok())
            .finish()
    }
}

/// What the reader task reports to the session.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// One ISCP message, terminators stripped.
    Message(String),
    /// The stream ended; `None` for an orderly close by the peer.
    Closed(Option<EiscpError>),
}

/// Spawns the task reading frames from `half`.
///
/// Every report carries `generation` so the session can drop reports from a
/// connection it has already replaced. The task ends after sending `Closed`
/// or when the receiving side goes away.
pub(crate) fn spawn_reader(
    half: OwnedReadHalf,
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, Inbound)>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reason = read_loop(half, generation, &tx).await;
        debug!(generation, error = ?reason.as_ref().err(), "reader finished");
        let _ = tx.send((generation, Inbound::Closed(reason.err())));
    })
}

async fn read_loop(
    mut half: OwnedReadHalf,
    generation: u64,
    tx: &mpsc::UnboundedSender<(u64, Inbound)>,
) -> Result<()> {
    let mut codec = EiscpCodec::default();
    let mut buffer = BytesMut::with_capacity(READ_BUFFER_SIZE);

    loop {
        let n = half.read_buf(&mut buffer).await?;
        if n == 0 {
            return Ok(());
        }

        while let Some(message) = codec.decode(&mut buffer)? {
            if tx.send((generation, Inbound::Message(message))).is_err() {
                return Ok(());
            }
        }
    }
}
