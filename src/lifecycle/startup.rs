//! Startup orchestration.
//!
//! # Responsibilities
//! - Run named startup phases in order, each under its own deadline
//! - Hand every resource a phase creates to the shutdown coordinator at once
//! - Abort on the first failure and close everything acquired so far
//!
//! # Design Decisions
//! - Fail fast: any phase error or timeout is fatal, never retried
//! - Phases run in order, not concurrently
//! - No per-phase rollback: teardown always closes the whole registry

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::time::timeout;

use crate::lifecycle::resource::ResourceHandle;
use crate::lifecycle::shutdown::{ShutdownCause, ShutdownCoordinator};

/// Error produced inside a phase body.
pub type PhaseError = Box<dyn std::error::Error + Send + Sync>;

/// Fatal bootstrap failure.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("startup phase '{phase}' failed: {source}")]
    PhaseFailed {
        phase: String,
        #[source]
        source: PhaseError,
    },

    #[error("startup phase '{phase}' timed out after {timeout:?}")]
    PhaseTimedOut { phase: String, timeout: Duration },

    #[error("bootstrap already aborted; phase '{phase}' was not run")]
    Aborted { phase: String },
}

impl BootstrapError {
    /// Name of the phase this error refers to.
    pub fn phase(&self) -> &str {
        match self {
            BootstrapError::PhaseFailed { phase, .. }
            | BootstrapError::PhaseTimedOut { phase, .. }
            | BootstrapError::Aborted { phase } => phase,
        }
    }
}

/// Handle given to a running phase for registering what it starts.
#[derive(Clone)]
pub struct PhaseContext {
    phase: Arc<str>,
    coordinator: Arc<ShutdownCoordinator>,
}

impl PhaseContext {
    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.coordinator
    }

    /// Register a resource. It is owned by the coordinator from here on.
    pub async fn register<R>(&self, resource: R) -> Result<(), PhaseError>
    where
        R: ResourceHandle + 'static,
    {
        self.register_boxed(Box::new(resource)).await
    }

    pub async fn register_boxed(
        &self,
        resource: Box<dyn ResourceHandle>,
    ) -> Result<(), PhaseError> {
        tracing::debug!(phase = %self.phase, resource = resource.name(), "Phase acquired resource");
        self.coordinator.register(resource).await?;
        Ok(())
    }
}

type PhaseBody = Box<dyn FnOnce(PhaseContext) -> BoxFuture<'static, Result<(), PhaseError>> + Send>;

/// A named, ordered unit of bootstrap work that yields no value.
pub struct StartupPhase {
    name: String,
    timeout: Duration,
    run: PhaseBody,
}

impl StartupPhase {
    pub fn new<F, Fut>(name: impl Into<String>, timeout: Duration, run: F) -> Self
    where
        F: FnOnce(PhaseContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), PhaseError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            timeout,
            run: Box::new(move |ctx| Box::pin(run(ctx))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Executes startup phases in order.
pub struct BootstrapSequencer {
    coordinator: Arc<ShutdownCoordinator>,
    completed: Vec<String>,
    aborted: bool,
}

impl BootstrapSequencer {
    pub fn new(coordinator: Arc<ShutdownCoordinator>) -> Self {
        Self {
            coordinator,
            completed: Vec::new(),
            aborted: false,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Run one phase under `limit`.
    ///
    /// On error or timeout the sequencer aborts: every registered resource is
    /// closed before this returns, and any later phase is refused.
    pub async fn run_phase<T, F, Fut>(
        &mut self,
        name: &str,
        limit: Duration,
        body: F,
    ) -> Result<T, BootstrapError>
    where
        F: FnOnce(PhaseContext) -> Fut,
        Fut: Future<Output = Result<T, PhaseError>>,
    {
        if self.aborted {
            return Err(BootstrapError::Aborted {
                phase: name.to_string(),
            });
        }

        tracing::info!(phase = name, timeout_ms = limit.as_millis() as u64, "Starting phase");
        let ctx = PhaseContext {
            phase: Arc::from(name),
            coordinator: Arc::clone(&self.coordinator),
        };

        let started = Instant::now();
        match timeout(limit, body(ctx)).await {
            Ok(Ok(value)) => {
                tracing::info!(
                    phase = name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Phase complete"
                );
                self.completed.push(name.to_string());
                Ok(value)
            }
            Ok(Err(source)) => Err(self
                .abort(BootstrapError::PhaseFailed {
                    phase: name.to_string(),
                    source,
                })
                .await),
            Err(_) => Err(self
                .abort(BootstrapError::PhaseTimedOut {
                    phase: name.to_string(),
                    timeout: limit,
                })
                .await),
        }
    }

    /// Run a homogeneous list of phases, stopping at the first failure.
    pub async fn run(&mut self, phases: Vec<StartupPhase>) -> Result<(), BootstrapError> {
        for phase in phases {
            let StartupPhase { name, timeout: limit, run } = phase;
            self.run_phase(&name, limit, run).await?;
        }
        Ok(())
    }

    /// All phases done: the process is now running.
    pub fn finish(self) -> Arc<ShutdownCoordinator> {
        self.coordinator.mark_running();
        tracing::info!(phases = ?self.completed, "Bootstrap complete");
        self.coordinator
    }

    async fn abort(&mut self, error: BootstrapError) -> BootstrapError {
        self.aborted = true;
        tracing::error!(phase = error.phase(), error = %error, "Startup failed, tearing down");

        self.coordinator.mark_failed_startup();
        let report = self
            .coordinator
            .trigger_shutdown(ShutdownCause::FatalBootstrap)
            .await;
        for failure in &report.errors {
            tracing::error!(
                resource = %failure.resource,
                reason = %failure.reason,
                "Teardown failure after aborted startup"
            );
        }
        error
    }
}
