//! Connection pairing
//!
//! One accepted connection gets a write-direction and a read-direction
//! adapter running concurrently over it. Their outputs are normalised into
//! result pairs for the broker's unified channel: every decoded message
//! becomes an `Ok` pair, the first fatal error from either direction becomes
//! one `Err` pair, and then the connection is released.

use crate::queue::error::{QueueError, QueueResult};
use crate::queue::message::Message;
use crate::queue::stream::{sink_from_stream, source_from_stream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Outcome of one connection event: a decoded message or why it failed
pub type Pair = QueueResult<Message>;

/// Keeps the broker's live connection count accurate however pairing ends
pub(crate) struct ConnectionGuard {
    active: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub(crate) fn new(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        Self { active }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Run both directions of `stream` until it fails, ends or the broker closes
///
/// Messages from this connection reach `pairs` in the order they were
/// decoded. No reconnection is attempted; producers redial themselves.
pub(crate) async fn pair_connection<S>(
    stream: S,
    peer: String,
    pairs: mpsc::Sender<Pair>,
    closed: CancellationToken,
    guard: ConnectionGuard,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    // Nothing is written back to producers; holding the inbox keeps the
    // write half open and its failures observable.
    let (replies, mut write_errors) = sink_from_stream(writer);
    let (mut messages, mut read_errors) = source_from_stream(reader);

    let failure = loop {
        tokio::select! {
            biased;
            message = messages.recv() => match message {
                Some(message) => {
                    if !forward(&pairs, &closed, Ok(message)).await {
                        break None;
                    }
                }
                None => {
                    // The reader reports its error before dropping the outbox
                    let err = read_errors
                        .recv()
                        .await
                        .unwrap_or_else(|| QueueError::disconnected("reader stopped"));
                    break Some(err);
                }
            },
            Some(err) = write_errors.recv() => break Some(err),
        }
    };

    if let Some(err) = failure {
        log::debug!("Connection from {} ended: {}", peer, err);
        forward(&pairs, &closed, Err(err)).await;
    } else {
        log::debug!("Connection from {} released", peer);
    }

    drop(replies);
    drop(messages);
    drop(guard);
}

/// Hand one pair to the broker; false once the broker no longer accepts pairs
async fn forward(pairs: &mpsc::Sender<Pair>, closed: &CancellationToken, pair: Pair) -> bool {
    if closed.is_cancelled() {
        return false;
    }
    tokio::select! {
        sent = pairs.send(pair) => sent.is_ok(),
        _ = closed.cancelled() => false,
    }
}
