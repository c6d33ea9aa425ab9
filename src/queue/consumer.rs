//! Consumer runtime
//!
//! Pulls messages from a [`Broker`], dispatches them to handlers by action
//! and puts failed work back for another attempt. The polling loop treats
//! errors the way a broker consumer should:
//!
//! - `Timeout`: nothing to do yet, keep polling
//! - `Disconnected`: that producer is gone, nothing to do
//! - `Validation`: a producer sent garbage; its connection is already dropped
//! - `Closed`: the broker shut down, stop cleanly
//! - anything else: terminal

use crate::queue::broker::Broker;
use crate::queue::error::{ErrorKind, QueueError, QueueResult};
use crate::queue::message::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = Result<(), HandlerError>;

/// Default retrieval window of one poll
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of put backs before a failing message is abandoned
pub const DEFAULT_MAX_VISITS: u32 = 10;

/// Processes messages for one or more actions
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, message: &Message) -> HandlerResult;
}

/// What a single poll did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A handler processed the message
    Handled(Message),
    /// The handler failed and the message was put back
    Retried(Message),
    /// The handler failed and the message ran out of visits
    Abandoned(Message),
    /// No handler is registered for the message's action
    Unhandled(Message),
    /// Nothing arrived within the poll timeout
    Idle,
    /// A producer connection ended
    ProducerGone,
    /// A producer sent bytes that do not decode to a message
    Rejected,
}

/// Counters for everything a consumer has seen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub handled: u64,
    pub retried: u64,
    pub abandoned: u64,
    pub unhandled: u64,
    pub idle: u64,
    pub producers_gone: u64,
    pub rejected: u64,
}

impl ConsumerStats {
    fn record(&mut self, step: &Step) {
        match step {
            Step::Handled(_) => self.handled += 1,
            Step::Retried(_) => self.retried += 1,
            Step::Abandoned(_) => self.abandoned += 1,
            Step::Unhandled(_) => self.unhandled += 1,
            Step::Idle => self.idle += 1,
            Step::ProducerGone => self.producers_gone += 1,
            Step::Rejected => self.rejected += 1,
        }
    }
}

/// Dispatches broker messages to registered handlers
///
/// # Example
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use jobqueue::queue::{Broker, Consumer, Handler, HandlerResult, Message};
/// use std::sync::Arc;
///
/// struct StartApp;
///
/// #[async_trait]
/// impl Handler for StartApp {
///     async fn handle(&self, message: &Message) -> HandlerResult {
///         println!("starting {:?}", message.args);
///         Ok(())
///     }
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let broker = Arc::new(Broker::start("127.0.0.1:0").await?);
/// let mut consumer = Consumer::new(broker.clone());
/// consumer.handle("start-app", Arc::new(StartApp));
///
/// let (_tx, shutdown) = tokio::sync::broadcast::channel(1);
/// let stats = consumer.run(shutdown).await?;
/// println!("handled {}", stats.handled);
/// # Ok(())
/// # }
/// ```
pub struct Consumer {
    broker: Arc<Broker>,
    handlers: HashMap<String, Arc<dyn Handler>>,
    fallback: Option<Arc<dyn Handler>>,
    poll_timeout: Duration,
    max_visits: Option<u32>,
}

impl Consumer {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self {
            broker,
            handlers: HashMap::new(),
            fallback: None,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            max_visits: Some(DEFAULT_MAX_VISITS),
        }
    }

    /// Route messages whose action is `action` to `handler`
    pub fn handle(&mut self, action: impl Into<String>, handler: Arc<dyn Handler>) -> &mut Self {
        self.handlers.insert(action.into(), handler);
        self
    }

    /// Handler for actions with no dedicated handler
    pub fn fallback(&mut self, handler: Arc<dyn Handler>) -> &mut Self {
        self.fallback = Some(handler);
        self
    }

    pub fn poll_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.poll_timeout = timeout;
        self
    }

    /// Put backs allowed before a failing message is abandoned; `None` retries forever
    pub fn max_visits(&mut self, max_visits: Option<u32>) -> &mut Self {
        self.max_visits = max_visits;
        self
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Retrieve one outcome from the broker and process it
    ///
    /// Returns `Err` only for errors the consumer cannot continue after,
    /// including `Closed`.
    pub async fn poll_once(&self) -> QueueResult<Step> {
        match self.broker.message(Some(self.poll_timeout)).await {
            Ok(message) => Ok(self.process(message).await),
            Err(err) => Self::classify(err),
        }
    }

    /// Poll until the broker closes, `shutdown` fires, or a terminal error
    ///
    /// Shutdown is only observed while waiting for the next message; a
    /// message already retrieved is always processed to completion.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> QueueResult<ConsumerStats> {
        let mut stats = ConsumerStats::default();

        loop {
            let outcome = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    log::info!("Consumer stopping on shutdown request");
                    return Ok(stats);
                }
                outcome = self.broker.message(Some(self.poll_timeout)) => outcome,
            };

            let step = match outcome {
                Ok(message) => self.process(message).await,
                Err(QueueError::Closed) => {
                    log::info!("Broker closed, consumer stopping");
                    return Ok(stats);
                }
                Err(err) => Self::classify(err)?,
            };
            stats.record(&step);
        }
    }

    fn classify(err: QueueError) -> QueueResult<Step> {
        match err.kind() {
            ErrorKind::Timeout => Ok(Step::Idle),
            ErrorKind::Disconnected => {
                log::debug!("{}", err);
                Ok(Step::ProducerGone)
            }
            ErrorKind::Validation => {
                log::warn!("Dropped a producer connection: {}", err);
                Ok(Step::Rejected)
            }
            _ => {
                log::error!("Consumer cannot continue: {}", err);
                Err(err)
            }
        }
    }

    async fn process(&self, message: Message) -> Step {
        let handler = match self.handlers.get(&message.action).or(self.fallback.as_ref()) {
            Some(handler) => handler,
            None => {
                log::warn!("No handler for {}, message dropped", message);
                return Step::Unhandled(message);
            }
        };

        match handler.handle(&message).await {
            Ok(()) => {
                log::debug!("Handled {}", message);
                Step::Handled(message)
            }
            Err(err) => self.retry(message, err),
        }
    }

    fn retry(&self, message: Message, err: HandlerError) -> Step {
        if let Some(max_visits) = self.max_visits {
            if message.visits >= max_visits {
                log::error!(
                    "Abandoning {} after {} visits: {}",
                    message,
                    message.visits,
                    err
                );
                return Step::Abandoned(message);
            }
        }

        log::warn!("Handling {} failed, putting it back: {}", message, err);
        match self.broker.put_back(message.clone()) {
            Ok(()) => Step::Retried(message),
            Err(put_back_err) => {
                log::error!("Could not put back {}: {}", message, put_back_err);
                Step::Abandoned(message)
            }
        }
    }
}
