//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - Route the first termination signal into `trigger_shutdown`
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The teardown runs on its own task so closing this listener never
//!   cancels a shutdown that is already in progress

use std::io;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;

use crate::lifecycle::resource::{CloseError, ResourceHandle};
use crate::lifecycle::shutdown::{ShutdownCause, ShutdownCoordinator};

/// Background task waiting for a termination signal.
pub struct SignalListener {
    task: JoinHandle<()>,
}

/// Install SIGTERM/SIGINT handlers that trigger shutdown on `coordinator`.
///
/// Must be called from within a Tokio runtime.
pub fn install(coordinator: Arc<ShutdownCoordinator>) -> io::Result<SignalListener> {
    let termination = termination_signal()?;
    let task = tokio::spawn(async move {
        let signal = termination.await;
        tracing::info!(signal, "Shutdown signal received");
        tokio::spawn(async move {
            coordinator.trigger_shutdown(ShutdownCause::Signal).await;
        });
    });
    tracing::info!("Signal handlers installed");
    Ok(SignalListener { task })
}

#[cfg(unix)]
fn termination_signal() -> io::Result<BoxFuture<'static, &'static str>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    Ok(Box::pin(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    }))
}

#[cfg(not(unix))]
fn termination_signal() -> io::Result<BoxFuture<'static, &'static str>> {
    Ok(Box::pin(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "ctrl-c",
            Err(e) => {
                tracing::error!(error = %e, "Ctrl+C handler failed");
                std::future::pending().await
            }
        }
    }))
}

impl ResourceHandle for SignalListener {
    fn name(&self) -> &str {
        "signal-listener"
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), CloseError>> {
        Box::pin(async move {
            self.task.abort();
            Ok(())
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::lifecycle::shutdown::LifecycleState;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_closes_without_triggering_shutdown() {
        let coordinator = Arc::new(ShutdownCoordinator::default());
        let listener = install(coordinator.clone()).unwrap();
        coordinator.register(Box::new(listener)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(coordinator.state(), LifecycleState::Bootstrapping);

        let report = coordinator.trigger_shutdown(ShutdownCause::Requested).await;
        assert!(report.is_clean());
        assert_eq!(report.attempted, vec!["signal-listener"]);
    }
}
