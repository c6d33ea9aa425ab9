//! Message type carried by the broker
//!
//! Messages are plain values: they are copied onto the wire, through the
//! broker's unified channel and back out to consumers. Equality is
//! structural over all three fields.

use serde::{Deserialize, Serialize};

/// Regenerate the runtime configuration of an app (args: app, optional unit)
pub const REGENERATE_APPRC: &str = "regenerate-apprc";

/// Start an app on a unit (args: app, unit)
pub const START_APP: &str = "start-app";

/// A unit of asynchronous work
///
/// # Example
///
/// ```rust
/// use jobqueue::queue::Message;
///
/// let message = Message::new("start-app").arg("myapp").arg("myapp/1");
/// assert_eq!(message.args, vec!["myapp", "myapp/1"]);
/// assert_eq!(message.visits, 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Selects the handler on the consumer side
    pub action: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Number of times the message was put back for redelivery
    #[serde(default)]
    pub visits: u32,
}

impl Message {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            args: Vec::new(),
            visits: 0,
        }
    }

    pub fn with_args<I, S>(action: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action: action.into(),
            args: args.into_iter().map(Into::into).collect(),
            visits: 0,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// True until the message has been put back at least once
    pub fn is_first_delivery(&self) -> bool {
        self.visits == 0
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.action)?;
        if !self.args.is_empty() {
            write!(f, "({})", self.args.join(", "))?;
        }
        if self.visits > 0 {
            write!(f, " [visit {}]", self.visits)?;
        }
        Ok(())
    }
}
