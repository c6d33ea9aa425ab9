//! Recording broker for tests of code that publishes work
//!
//! Starts a real broker on an ephemeral local port and keeps every message
//! it receives, in arrival order, so a test can assert on exactly what was
//! published.

use crate::queue::broker::Broker;
use crate::queue::error::{ErrorKind, QueueResult};
use crate::queue::message::Message;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub struct RecordingBroker {
    broker: Arc<Broker>,
    messages: Arc<Mutex<Vec<Message>>>,
    arrived: Arc<Notify>,
    drain: JoinHandle<()>,
}

impl RecordingBroker {
    pub async fn start() -> QueueResult<Self> {
        let broker = Arc::new(Broker::start("127.0.0.1:0").await?);
        let messages = Arc::new(Mutex::new(Vec::new()));
        let arrived = Arc::new(Notify::new());

        let drain = tokio::spawn(record(broker.clone(), messages.clone(), arrived.clone()));

        Ok(Self {
            broker,
            messages,
            arrived,
            drain,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.broker.addr()
    }

    /// Snapshot of every message received so far
    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Wait until at least `count` messages arrived; false on timeout
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.arrived.notified();
            if self.messages().len() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.messages().len() >= count;
            }
        }
    }

    pub async fn stop(mut self) -> QueueResult<Vec<Message>> {
        self.broker.close().await?;
        let _ = (&mut self.drain).await;
        Ok(self.messages())
    }
}

impl Drop for RecordingBroker {
    fn drop(&mut self) {
        // The drain task holds the broker alive until it is gone
        self.drain.abort();
    }
}

async fn record(broker: Arc<Broker>, messages: Arc<Mutex<Vec<Message>>>, arrived: Arc<Notify>) {
    loop {
        match broker.message(None).await {
            Ok(message) => {
                messages
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(message);
                arrived.notify_waiters();
            }
            Err(err) if err.kind() == ErrorKind::Closed => return,
            Err(err) => log::debug!("Recording broker ignored: {}", err),
        }
    }
}
