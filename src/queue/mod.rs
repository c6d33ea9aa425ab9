//! Message Queue Broker
//!
//! A small self-hosted broker for asynchronous work items. Producers dial the
//! broker over TCP and stream MessagePack-encoded [`Message`] values; the
//! broker merges every connection into one consumption point that consumers
//! pull from, and failed work can be put back for another attempt.
//!
//! # Overview
//!
//! - **Stream adapters**: turn any byte stream into a message sink or source
//! - **Connection pairing**: one read and one write adapter per connection
//! - **Broker**: accept loop plus a single bounded unified channel
//! - **Client**: dial a broker and send messages
//! - **Consumer**: handler dispatch with bounded redelivery
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Producer A  │     │  Producer B  │     │  Producer C  │
//! └──────┬───────┘     └──────┬───────┘     └──────┬───────┘
//!        │ dial/send          │ dial/send          │ dial/send
//!        ▼                    ▼                    ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                        Broker                           │
//! │   pairing A          pairing B          pairing C       │
//! │       └──────────────────┼──────────────────┘           │
//! │                          ▼                              │
//! │              unified channel (bounded)  ◄── put_back    │
//! └──────────────────────────┬──────────────────────────────┘
//!                            │ message(timeout)
//!                   ┌────────┴────────┐
//!                   │   Consumer(s)   │
//!                   └─────────────────┘
//! ```
//!
//! Delivery is at least once: a message is redelivered only when a consumer
//! puts it back, and its visit count records how often that happened.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use jobqueue::queue::{publish, Broker, Message};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = Broker::start("127.0.0.1:0").await?;
//! let addr = broker.addr().to_string();
//!
//! publish(&addr, [Message::with_args("regenerate-apprc", ["myapp"])]).await?;
//!
//! let message = broker.message(Some(Duration::from_secs(1))).await?;
//! if message.action == "regenerate-apprc" {
//!     // work failed, try again later
//!     broker.put_back(message)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
mod broker;
mod client;
mod codec;
mod consumer;
mod error;
mod message;
mod pairing;
mod recording;
mod stream;

pub use broker::{Broker, DEFAULT_CAPACITY};
pub use client::{dial, publish, publish_with_retry};
pub use codec::{MessageCodec, DEFAULT_MAX_MESSAGE_SIZE};
pub use consumer::{
    Consumer, ConsumerStats, Handler, HandlerError, HandlerResult, Step, DEFAULT_MAX_VISITS,
    DEFAULT_POLL_TIMEOUT,
};
pub use error::{ErrorKind, QueueError, QueueResult};
pub use message::{Message, REGENERATE_APPRC, START_APP};
pub use pairing::Pair;
pub use recording::RecordingBroker;
pub use stream::{sink_from_stream, source_from_stream, ErrorSource};

#[cfg(test)]
mod tests;
