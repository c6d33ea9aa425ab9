//! Subcommand implementations

use crate::app::cli::{PublishArgs, Settings};
use crate::core::retry::RetryPolicy;
use crate::core::shutdown::ShutdownCoordinator;
use crate::queue::{publish_with_retry, Broker, Consumer, Handler, HandlerResult, Message};
use async_trait::async_trait;
use std::io::Write;
use std::sync::{Arc, Mutex};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Writes every message it handles as one JSON line
pub struct JsonLinesHandler {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesHandler {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

#[async_trait]
impl Handler for JsonLinesHandler {
    async fn handle(&self, message: &Message) -> HandlerResult {
        let line = serde_json::to_string(message)?;
        let mut out = self
            .out
            .lock()
            .map_err(|_| "output writer lock poisoned")?;
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

/// Run a broker until a shutdown signal, printing every message
pub async fn serve(settings: &Settings) -> CommandResult {
    let broker = Arc::new(
        Broker::start_with_capacity(&settings.queue_server, settings.capacity).await?,
    );

    let shutdown = ShutdownCoordinator::new();
    shutdown.listen_for_signals();

    let mut consumer = Consumer::new(broker.clone());
    consumer
        .poll_timeout(settings.poll_timeout)
        .max_visits(settings.max_visits)
        .fallback(Arc::new(JsonLinesHandler::stdout()));

    let outcome = consumer.run(shutdown.subscribe()).await;
    broker.close().await?;

    let stats = outcome?;
    log::info!(
        "Handled {} message(s), {} retried, {} abandoned, {} producer(s) disconnected",
        stats.handled,
        stats.retried,
        stats.abandoned,
        stats.producers_gone
    );
    Ok(())
}

/// Send one message built from the command line
pub async fn publish(settings: &Settings, args: &PublishArgs) -> CommandResult {
    let message = Message::with_args(args.action.clone(), args.args.iter().cloned());
    log::debug!("Publishing {} to {}", message, settings.queue_server);

    publish_with_retry(
        &settings.queue_server,
        vec![message],
        RetryPolicy::with_attempts(settings.connect_attempts),
    )
    .await?;

    log::info!("Published {} to {}", args.action, settings.queue_server);
    Ok(())
}
