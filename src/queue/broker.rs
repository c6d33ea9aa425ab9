//! Broker - TCP front end and unified consumption point
//!
//! The broker owns a listening socket and a single bounded channel fed by
//! every paired connection. Consumers pull from that channel with
//! [`Broker::message`] and hand failed work back with [`Broker::put_back`].
//!
//! ```text
//!  producer ──┐   ┌─ pairing ─┐
//!  producer ──┼──►├─ pairing ─┼──► unified channel ──► message()
//!  producer ──┘   └─ pairing ─┘          ▲
//!                                        └──────────── put_back()
//! ```

use crate::queue::error::{QueueError, QueueResult};
use crate::queue::message::Message;
use crate::queue::pairing::{pair_connection, ConnectionGuard, Pair};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default bound on pairs waiting in the unified channel
pub const DEFAULT_CAPACITY: usize = 1024;

/// Message broker
///
/// Share it between producers of work and consumers with `Arc<Broker>`;
/// every operation takes `&self`.
///
/// # Example
///
/// ```rust,no_run
/// use jobqueue::queue::{dial, Broker, Message};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let broker = Broker::start("127.0.0.1:0").await?;
///
/// let (outbox, _errors) = dial(&broker.addr().to_string()).await?;
/// outbox.send(Message::new("start-app").arg("myapp")).await?;
///
/// let message = broker.message(Some(Duration::from_secs(2))).await?;
/// assert_eq!(message.action, "start-app");
///
/// broker.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Broker {
    addr: SocketAddr,
    sender: mpsc::Sender<Pair>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<Pair>>,
    /// Accept loop handle; `None` once the broker has been closed
    accept_loop: Mutex<Option<JoinHandle<()>>>,
    closed: CancellationToken,
    connections: Arc<AtomicUsize>,
}

impl Broker {
    /// Bind `bind` and start accepting connections in the background
    pub async fn start(bind: &str) -> QueueResult<Self> {
        Self::start_with_capacity(bind, DEFAULT_CAPACITY).await
    }

    pub async fn start_with_capacity(bind: &str, capacity: usize) -> QueueResult<Self> {
        let bind_error = |source| QueueError::Bind {
            addr: bind.to_string(),
            source,
        };
        let listener = TcpListener::bind(bind).await.map_err(bind_error)?;
        let addr = listener.local_addr().map_err(bind_error)?;

        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let closed = CancellationToken::new();
        let connections = Arc::new(AtomicUsize::new(0));

        let accept_loop = tokio::spawn(accept_connections(
            listener,
            sender.clone(),
            closed.clone(),
            connections.clone(),
        ));
        log::info!("Broker listening on {}", addr);

        Ok(Self {
            addr,
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
            accept_loop: Mutex::new(Some(accept_loop)),
            closed,
            connections,
        })
    }

    /// Resolved local address of the listener
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Connections currently paired with this broker
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Wait for the next message or connection error
    ///
    /// `None` or a zero duration waits indefinitely. Otherwise a `Timeout`
    /// error is returned when nothing arrived within `timeout`. Once the
    /// broker is closed, anything still pending is returned first and then
    /// every call fails with `Closed`.
    ///
    /// Concurrent callers each receive a different item.
    pub async fn message(&self, timeout: Option<Duration>) -> QueueResult<Message> {
        match timeout.filter(|t| !t.is_zero()) {
            Some(timeout) => tokio::time::timeout(timeout, self.next_pair())
                .await
                .map_err(|_| QueueError::Timeout { timeout })?,
            None => self.next_pair().await,
        }
    }

    async fn next_pair(&self) -> Pair {
        let mut receiver = self.receiver.lock().await;
        tokio::select! {
            biased;
            pair = receiver.recv() => pair.unwrap_or(Err(QueueError::Closed)),
            _ = self.closed.cancelled() => Err(QueueError::Closed),
        }
    }

    /// Re-enqueue `message` for another consumption attempt
    ///
    /// The visit count goes up by exactly one. There is no deduplication:
    /// a message put back twice is delivered twice. When the unified
    /// channel is full the re-enqueue completes in the background, so the
    /// caller never waits on its own consumption.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn put_back(&self, mut message: Message) -> QueueResult<()> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }
        message.visits = message.visits.saturating_add(1);
        log::debug!("Putting back {}", message);

        match self.sender.try_send(Ok(message)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(pair)) => {
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    if sender.send(pair).await.is_err() {
                        log::warn!("Broker dropped before a put back message was re-enqueued");
                    }
                });
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    /// Stop accepting connections and release the listener
    ///
    /// Succeeds once; later calls fail with `AlreadyClosed`. Connections
    /// already accepted are not cut mid-read, but nothing they produce is
    /// accepted any more.
    pub async fn close(&self) -> QueueResult<()> {
        let accept_loop = {
            let mut guard = self
                .accept_loop
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.take().ok_or(QueueError::AlreadyClosed)?
        };

        self.closed.cancel();
        if let Err(err) = accept_loop.await {
            log::warn!("Accept loop for {} ended abnormally: {}", self.addr, err);
        }
        log::info!("Broker on {} closed", self.addr);
        Ok(())
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("addr", &self.addr)
            .field("closed", &self.is_closed())
            .field("connections", &self.connections())
            .finish()
    }
}

async fn accept_connections(
    listener: TcpListener,
    pairs: mpsc::Sender<Pair>,
    closed: CancellationToken,
    connections: Arc<AtomicUsize>,
) {
    loop {
        let accepted = tokio::select! {
            _ = closed.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                log::debug!("Accepted connection from {}", peer);
                let _ = stream.set_nodelay(true);
                let guard = ConnectionGuard::new(connections.clone());
                tokio::spawn(pair_connection(
                    stream,
                    peer.to_string(),
                    pairs.clone(),
                    closed.clone(),
                    guard,
                ));
            }
            Err(err) => {
                log::debug!("Accept failed, listener stopping: {}", err);
                break;
            }
        }
    }
}
