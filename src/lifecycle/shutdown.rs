//! Shutdown coordination for the receiver.
//!
//! # State Machine
//! ```text
//! Bootstrapping → Running → ShuttingDown → Stopped
//! Bootstrapping → FailedStartup → ShuttingDown
//! ```
//!
//! The first `trigger_shutdown` call drains the registry and spawns the close
//! pass; later or concurrent calls wait for the same report.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;

use crate::lifecycle::resource::{CloseStage, ResourceHandle};
use crate::observability::metrics;

/// Process lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Bootstrapping,
    Running,
    FailedStartup,
    ShuttingDown,
    Stopped,
}

/// What initiated the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// OS termination signal.
    Signal,
    /// A startup phase failed or timed out.
    FatalBootstrap,
    /// Requested programmatically.
    Requested,
}

/// A resource whose close failed or did not finish in time.
#[derive(Debug, Clone, Error)]
#[error("failed to close {resource} ({stage}): {reason}")]
pub struct TeardownError {
    pub resource: String,
    pub stage: CloseStage,
    pub reason: String,
}

/// Outcome of the single close pass.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub cause: ShutdownCause,
    /// Resource names in the order their close was attempted.
    pub attempted: Vec<String>,
    pub errors: Vec<TeardownError>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Registration refused because teardown already began.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("shutdown already started; {name} was closed instead of registered")]
    ShuttingDown { name: String },
}

struct Registry {
    accepting: bool,
    entries: Vec<Box<dyn ResourceHandle>>,
}

/// Coordinator for deterministic teardown.
///
/// Owns every registered resource and provides a broadcast channel that
/// long-running tasks can subscribe to.
pub struct ShutdownCoordinator {
    registry: Mutex<Registry>,
    state: watch::Sender<LifecycleState>,
    report: watch::Sender<Option<Arc<ShutdownReport>>>,
    /// Broadcast channel sender.
    tx: broadcast::Sender<ShutdownCause>,
    close_timeout: Duration,
}

impl ShutdownCoordinator {
    /// Create a coordinator that bounds each close by `close_timeout`.
    pub fn new(close_timeout: Duration) -> Self {
        let (tx, _) = broadcast::channel(1);
        let (state, _) = watch::channel(LifecycleState::Bootstrapping);
        let (report, _) = watch::channel(None);
        Self {
            registry: Mutex::new(Registry {
                accepting: true,
                entries: Vec::new(),
            }),
            state,
            report,
            tx,
            close_timeout,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownCause> {
        self.tx.subscribe()
    }

    /// Number of registered resources not yet closed.
    pub fn registered(&self) -> usize {
        self.lock_registry().entries.len()
    }

    /// Bootstrapping → Running. No-op from any other state.
    pub fn mark_running(&self) -> bool {
        self.transition(LifecycleState::Bootstrapping, LifecycleState::Running)
    }

    /// Bootstrapping → FailedStartup. No-op from any other state.
    pub fn mark_failed_startup(&self) -> bool {
        self.transition(LifecycleState::Bootstrapping, LifecycleState::FailedStartup)
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Take ownership of a resource for teardown.
    ///
    /// Once shutdown has begun the resource is closed right away and an error
    /// is returned.
    pub async fn register(&self, resource: Box<dyn ResourceHandle>) -> Result<(), RegisterError> {
        let rejected = {
            let mut registry = self.lock_registry();
            if registry.accepting {
                tracing::debug!(
                    resource = resource.name(),
                    stage = %resource.stage(),
                    "Resource registered"
                );
                registry.entries.push(resource);
                None
            } else {
                Some(resource)
            }
        };

        let Some(resource) = rejected else {
            return Ok(());
        };

        let name = resource.name().to_string();
        tracing::warn!(
            resource = %name,
            "Registration after shutdown started, closing immediately"
        );
        if let Err(e) = self.close_one(resource).await {
            tracing::warn!(error = %e, "Late resource failed to close");
        }
        Err(RegisterError::ShuttingDown { name })
    }

    /// Close every registered resource exactly once.
    ///
    /// The first caller starts the close pass on its own task, so dropping
    /// any caller's future does not stop the pass. Every caller, concurrent
    /// or later, waits for that pass and receives its report.
    pub async fn trigger_shutdown(self: &Arc<Self>, cause: ShutdownCause) -> Arc<ShutdownReport> {
        let drained = {
            let mut registry = self.lock_registry();
            if registry.accepting {
                registry.accepting = false;
                Some(std::mem::take(&mut registry.entries))
            } else {
                None
            }
        };

        match drained {
            Some(entries) => {
                self.state.send_replace(LifecycleState::ShuttingDown);
                let _ = self.tx.send(cause);
                tracing::info!(?cause, resources = entries.len(), "Shutdown started");
                let coordinator = Arc::clone(self);
                tokio::spawn(async move { coordinator.close_all(cause, entries).await });
            }
            None => tracing::debug!(?cause, "Shutdown already in progress"),
        }
        self.wait_stopped().await
    }

    async fn close_all(&self, cause: ShutdownCause, mut entries: Vec<Box<dyn ResourceHandle>>) {
        // Latest registration first within a stage, stages in fixed order.
        entries.reverse();
        entries.sort_by_key(|resource| resource.stage());

        let mut attempted = Vec::with_capacity(entries.len());
        let mut errors = Vec::new();
        for resource in entries {
            attempted.push(resource.name().to_string());
            if let Err(e) = self.close_one(resource).await {
                tracing::warn!(
                    resource = %e.resource,
                    reason = %e.reason,
                    "Resource failed to close"
                );
                metrics::record_teardown_error();
                errors.push(e);
            }
        }

        tracing::info!(
            closed = attempted.len(),
            failures = errors.len(),
            "Shutdown complete"
        );
        self.report.send_replace(Some(Arc::new(ShutdownReport {
            cause,
            attempted,
            errors,
        })));
        self.state.send_replace(LifecycleState::Stopped);
    }

    /// Wait until the close pass has finished.
    pub async fn wait_stopped(&self) -> Arc<ShutdownReport> {
        let mut rx = self.report.subscribe();
        loop {
            if let Some(report) = rx.borrow_and_update().as_ref() {
                return Arc::clone(report);
            }
            // The sender lives in `self`, so `changed` cannot fail here.
            let _ = rx.changed().await;
        }
    }

    async fn close_one(&self, resource: Box<dyn ResourceHandle>) -> Result<(), TeardownError> {
        let name = resource.name().to_string();
        let stage = resource.stage();
        match timeout(self.close_timeout, resource.close()).await {
            Ok(Ok(())) => {
                tracing::debug!(resource = %name, %stage, "Resource closed");
                Ok(())
            }
            Ok(Err(e)) => Err(TeardownError {
                resource: name,
                stage,
                reason: e.to_string(),
            }),
            Err(_) => Err(TeardownError {
                resource: name,
                stage,
                reason: format!("close timed out after {:?}", self.close_timeout),
            }),
        }
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        // A poisoned registry still holds valid handles.
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}
