//! Client side of the queue: dial a broker and send messages

use crate::core::retry::{retry_async, RetryPolicy};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::message::Message;
use crate::queue::stream::{sink_from_stream, ErrorSource};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Connect to the broker at `addr`
///
/// Returns the outbox to place messages into and the error source of the
/// underlying sink. Dropping the outbox ends the session: the connection is
/// closed and the error source closes after it.
pub async fn dial(addr: &str) -> QueueResult<(mpsc::Sender<Message>, ErrorSource)> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| QueueError::Connect {
            addr: addr.to_string(),
            source,
        })?;
    let _ = stream.set_nodelay(true);
    log::debug!("Dialed broker at {}", addr);

    Ok(sink_from_stream(stream))
}

/// Send `messages` to the broker at `addr` over one session
///
/// Waits until the session has ended so that every message has been
/// handed to the connection. Returns the number of messages sent, or the
/// first error the sink reported.
pub async fn publish<I>(addr: &str, messages: I) -> QueueResult<usize>
where
    I: IntoIterator<Item = Message>,
{
    let session = dial(addr).await?;
    send_all(session, messages).await
}

/// Like [`publish`], redialing according to `policy` while the broker is
/// unreachable
pub async fn publish_with_retry(
    addr: &str,
    messages: Vec<Message>,
    policy: RetryPolicy,
) -> QueueResult<usize> {
    let session = retry_async(
        "dial broker",
        policy,
        || dial(addr),
        |err: &QueueError| matches!(err, QueueError::Connect { .. }),
    )
    .await?;
    send_all(session, messages).await
}

async fn send_all<I>(
    (outbox, mut errors): (mpsc::Sender<Message>, ErrorSource),
    messages: I,
) -> QueueResult<usize>
where
    I: IntoIterator<Item = Message>,
{
    let mut sent = 0;
    for message in messages {
        outbox
            .send(message)
            .await
            .map_err(|_| QueueError::disconnected("sink stopped accepting messages"))?;
        sent += 1;
    }
    drop(outbox);

    match errors.recv().await {
        Some(err) => Err(err),
        None => {
            log::debug!("Published {} message(s)", sent);
            Ok(sent)
        }
    }
}
