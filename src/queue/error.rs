//! Queue Error Types

use std::time::Duration;

/// Coarse classification of a [`QueueError`]
///
/// Errors travel through channels and across connection boundaries, so
/// consumers usually only care about which kind of failure they received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Bind,
    Connect,
    Disconnected,
    Timeout,
    AlreadyClosed,
    Closed,
    Validation,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection disconnected: {reason}")]
    Disconnected { reason: String },

    #[error("No message within {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Broker already closed")]
    AlreadyClosed,

    #[error("Broker is closed")]
    Closed,

    #[error("Invalid message: {message}")]
    Validation { message: String },
}

impl QueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueueError::Bind { .. } => ErrorKind::Bind,
            QueueError::Connect { .. } => ErrorKind::Connect,
            QueueError::Disconnected { .. } => ErrorKind::Disconnected,
            QueueError::Timeout { .. } => ErrorKind::Timeout,
            QueueError::AlreadyClosed => ErrorKind::AlreadyClosed,
            QueueError::Closed => ErrorKind::Closed,
            QueueError::Validation { .. } => ErrorKind::Validation,
        }
    }

    pub(crate) fn disconnected(reason: impl Into<String>) -> Self {
        QueueError::Disconnected {
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        QueueError::Validation {
            message: message.into(),
        }
    }

    /// True for failures confined to a single producer connection
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Disconnected | ErrorKind::Validation
        )
    }
}

// Required by the tokio-util codec traits: transport failures end the connection.
impl From<std::io::Error> for QueueError {
    fn from(error: std::io::Error) -> Self {
        QueueError::disconnected(error.to_string())
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
