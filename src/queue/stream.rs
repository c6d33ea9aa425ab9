//! Stream adapters
//!
//! Bridges an arbitrary byte stream to typed [`Message`] traffic. Each
//! adapter runs as its own Tokio task and talks to its owner through
//! channels:
//!
//! - [`sink_from_stream`] writes every message placed in its inbox onto the
//!   stream, in order, one at a time.
//! - [`source_from_stream`] decodes messages off the stream and publishes
//!   them on its outbox until decoding fails or the stream ends.
//!
//! Both report failures on a separate error source. Closing an error source
//! (the receiver returning `None`) means the adapter has finished.

use crate::queue::codec::MessageCodec;
use crate::queue::error::QueueError;
use crate::queue::message::Message;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};

/// Messages buffered between the owner of an inbox and the writer task
pub const SINK_CAPACITY: usize = 64;

/// Decoded messages buffered before the reader task waits for its owner
pub const SOURCE_CAPACITY: usize = 64;

const ERROR_CAPACITY: usize = 16;

/// Read side of an adapter's error reporting
pub type ErrorSource = mpsc::Receiver<QueueError>;

/// Serialize messages from the returned inbox onto `stream`
///
/// Dropping every clone of the inbox sender is the "no more sends" signal:
/// the adapter finishes the write in progress, shuts the stream down and
/// then closes the error source.
///
/// After a write fails the error is reported once and nothing more is
/// written. The inbox stays open until its owner closes it; any message
/// received in the meantime is reported back as a `Disconnected` error.
///
/// Must be called from within a Tokio runtime.
pub fn sink_from_stream<W>(stream: W) -> (mpsc::Sender<Message>, ErrorSource)
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (inbox_tx, inbox_rx) = mpsc::channel(SINK_CAPACITY);
    let (error_tx, error_rx) = mpsc::channel(ERROR_CAPACITY);

    let framed = FramedWrite::new(stream, MessageCodec::new());
    tokio::spawn(write_messages(framed, inbox_rx, error_tx));

    (inbox_tx, error_rx)
}

async fn write_messages<W>(
    mut framed: FramedWrite<W, MessageCodec>,
    mut inbox: mpsc::Receiver<Message>,
    errors: mpsc::Sender<QueueError>,
) where
    W: AsyncWrite + Unpin,
{
    let mut failed = false;

    while let Some(message) = inbox.recv().await {
        if failed {
            let rejected = QueueError::disconnected(format!(
                "sink stopped after a write failure, '{}' was not sent",
                message.action
            ));
            if errors.try_send(rejected).is_err() {
                log::warn!(
                    "Error source full, '{}' was not sent and could not be reported",
                    message.action
                );
            }
            continue;
        }

        log::trace!("Writing message {}", message);
        if let Err(err) = framed.send(message).await {
            log::debug!("Message write failed: {}", err);
            failed = true;
            let _ = errors.send(err).await;
        }
    }

    // Inbox closed by its owner
    if let Err(err) = framed.close().await {
        log::trace!("Stream shutdown after inbox close failed: {}", err);
    }
}

/// Decode messages from `stream` onto the returned outbox
///
/// Decoding stops at the first failure, which is delivered exactly once on
/// the error source. A stream that ends cleanly is reported as a
/// `Disconnected` error too: from the outside, "ended" and "broken" both
/// mean no more messages will come from this stream.
///
/// Dropping the outbox receiver stops the adapter without an error.
///
/// Must be called from within a Tokio runtime.
pub fn source_from_stream<R>(stream: R) -> (mpsc::Receiver<Message>, ErrorSource)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let (outbox_tx, outbox_rx) = mpsc::channel(SOURCE_CAPACITY);
    let (error_tx, error_rx) = mpsc::channel(1);

    let framed = FramedRead::new(stream, MessageCodec::new());
    tokio::spawn(read_messages(framed, outbox_tx, error_tx));

    (outbox_rx, error_rx)
}

async fn read_messages<R>(
    mut framed: FramedRead<R, MessageCodec>,
    outbox: mpsc::Sender<Message>,
    errors: mpsc::Sender<QueueError>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = tokio::select! {
            frame = framed.next() => frame,
            _ = outbox.closed() => {
                log::trace!("Outbox dropped, reader stopping");
                return;
            }
        };

        match frame {
            Some(Ok(message)) => {
                log::trace!("Decoded message {}", message);
                if outbox.send(message).await.is_err() {
                    return;
                }
            }
            Some(Err(err)) => {
                log::debug!("Message decode failed: {}", err);
                let _ = errors.send(err).await;
                return;
            }
            None => {
                let _ = errors
                    .send(QueueError::disconnected("EOF: client disconnected"))
                    .await;
                return;
            }
        }
    }
}
