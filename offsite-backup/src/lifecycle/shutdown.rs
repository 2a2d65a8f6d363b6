//! SIGTERM / SIGINT handling.
//!
//! A signal cancels the run token. The controller drops the in-flight stage
//! (child processes are killed with it) and takes the normal failure path:
//! clean intermediate storage, notify, exit non-zero.

use std::sync::{Arc, OnceLock};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shutdown coordinator
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    reason: Arc<OnceLock<&'static str>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled when a shutdown is requested
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// What requested the shutdown, if anything did
    pub fn reason(&self) -> Option<&'static str> {
        self.reason.get().copied()
    }

    /// Request shutdown. The first reason wins.
    pub fn trigger(&self, reason: &'static str) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    /// Install SIGINT and SIGTERM handlers in a background task.
    pub fn listen(&self) -> std::io::Result<JoinHandle<()>> {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        let this = self.clone();

        Ok(tokio::spawn(async move {
            tokio::select! {
                result = signal::ctrl_c() => {
                    if result.is_ok() {
                        info!("Received SIGINT (Ctrl+C), aborting run");
                        this.trigger("SIGINT");
                    }
                }
                _ = terminate.recv() => {
                    info!("Received SIGTERM, aborting run");
                    this.trigger("SIGTERM");
                }
                _ = this.token.cancelled() => {}
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_cancels_token() {
        let coordinator = ShutdownCoordinator::new();
        let token = coordinator.token();

        let handle = tokio::spawn(async move {
            token.cancelled().await;
        });

        coordinator.trigger("SIGTERM");
        handle.await.unwrap();

        assert_eq!(coordinator.reason(), Some("SIGTERM"));
    }

    #[tokio::test]
    async fn test_first_reason_wins() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.trigger("SIGINT");
        coordinator.trigger("SIGTERM");
        assert_eq!(coordinator.reason(), Some("SIGINT"));
    }

    #[tokio::test]
    async fn test_listener_exits_when_cancelled() {
        let coordinator = ShutdownCoordinator::new();
        let handle = coordinator.listen().unwrap();
        coordinator.trigger("test");
        handle.await.unwrap();
    }
}
