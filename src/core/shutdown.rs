//! Shutdown coordination
//!
//! Turns process signals into a broadcast that long-running loops (the
//! broker's consumer, mostly) can select on. The first signal requests a
//! graceful shutdown; a second one exits immediately.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Exit status used when a second signal forces the process down
pub const FORCED_EXIT_CODE: i32 = 130;

#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<()>,
    requested: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(8);
        Self {
            sender,
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    pub fn trigger(&self) {
        self.requested.store(true, Ordering::Release);
        let _ = self.sender.send(());
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Trigger this coordinator on SIGINT, SIGTERM or SIGHUP
    ///
    /// Must be called from within a Tokio runtime.
    pub fn listen_for_signals(&self) {
        #[cfg(unix)]
        {
            // Exit quietly when stdout is a closed pipe; sockets never raise it
            unsafe {
                libc::signal(libc::SIGPIPE, libc::SIG_DFL);
            }

            use tokio::signal::unix::{signal, SignalKind};

            let received = Arc::new(AtomicUsize::new(0));
            for kind in [
                SignalKind::interrupt(),
                SignalKind::terminate(),
                SignalKind::hangup(),
            ] {
                let coordinator = self.clone();
                let received = received.clone();
                tokio::spawn(async move {
                    let Ok(mut stream) = signal(kind) else {
                        log::warn!("Could not install handler for {:?}", kind);
                        return;
                    };
                    while stream.recv().await.is_some() {
                        coordinator.on_signal(&received);
                    }
                });
            }
        }

        #[cfg(not(unix))]
        {
            let coordinator = self.clone();
            tokio::spawn(async move {
                let received = AtomicUsize::new(0);
                while tokio::signal::ctrl_c().await.is_ok() {
                    coordinator.on_signal(&received);
                }
            });
        }
    }

    fn on_signal(&self, received: &AtomicUsize) {
        if received.fetch_add(1, Ordering::AcqRel) >= 1 {
            log::warn!("Second signal received; exiting");
            std::process::exit(FORCED_EXIT_CODE);
        }
        log::info!("Shutdown requested");
        self.trigger();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_starts_without_request() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_requested());
    }

    #[tokio::test]
    async fn test_trigger_reaches_every_subscriber() {
        let coordinator = ShutdownCoordinator::new();
        let mut first = coordinator.subscribe();
        let mut second = coordinator.clone().subscribe();

        coordinator.trigger();

        assert!(coordinator.is_requested());
        assert!(timeout(Duration::from_millis(100), first.recv()).await.is_ok());
        assert!(timeout(Duration::from_millis(100), second.recv()).await.is_ok());
    }

    #[tokio::test]
    async fn test_first_signal_only_requests_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();
        let received = AtomicUsize::new(0);

        coordinator.on_signal(&received);

        assert!(coordinator.is_requested());
        assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_ok());
    }
}
