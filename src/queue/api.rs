//! Public API for the queue system
//!
//! External modules should import from here rather than directly from
//! internal modules. See the module documentation for architecture details.

// Broker and client
pub use crate::queue::broker::Broker;
pub use crate::queue::client::{dial, publish, publish_with_retry};

// Consuming
pub use crate::queue::consumer::{Consumer, ConsumerStats, Handler, HandlerResult, Step};

// Messages
pub use crate::queue::message::{Message, REGENERATE_APPRC, START_APP};

// Error handling
pub use crate::queue::error::{ErrorKind, QueueError, QueueResult};

// Testing support
pub use crate::queue::recording::RecordingBroker;
