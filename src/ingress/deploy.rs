//! Concurrent deployment of identical workers.

use std::time::Duration;

use futures_util::future::{join_all, BoxFuture};
use thiserror::Error;
use tokio::time::timeout;

use crate::lifecycle::resource::ResourceHandle;
use crate::lifecycle::shutdown::RegisterError;
use crate::lifecycle::startup::PhaseContext;

/// Error raised by a worker while starting.
pub type WorkerError = Box<dyn std::error::Error + Send + Sync>;

/// Supplier of identical ingress workers.
pub trait WorkerFactory: Send + Sync {
    /// Start worker number `instance` and return its teardown handle.
    fn create(&self, instance: usize)
        -> BoxFuture<'_, Result<Box<dyn ResourceHandle>, WorkerError>>;
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("ingress worker {instance} failed to start: {source}")]
    Worker {
        instance: usize,
        #[source]
        source: WorkerError,
    },

    #[error(transparent)]
    Register(#[from] RegisterError),

    #[error("deployment of {instances} workers did not finish within {deadline:?}")]
    TimedOut { instances: usize, deadline: Duration },
}

/// Start `instances` workers concurrently and wait for all of them.
///
/// Each worker is registered with the coordinator as soon as it is up, so a
/// partial deployment is torn down with everything else when startup aborts.
pub async fn deploy(
    factory: &dyn WorkerFactory,
    instances: usize,
    ctx: &PhaseContext,
    deadline: Duration,
) -> Result<usize, DeployError> {
    let starts = (0..instances).map(|instance| async move {
        let worker = factory
            .create(instance)
            .await
            .map_err(|source| DeployError::Worker { instance, source })?;
        ctx.coordinator().register(worker).await?;
        tracing::debug!(instance, "Ingress worker deployed");
        Ok::<_, DeployError>(())
    });

    let results = timeout(deadline, join_all(starts))
        .await
        .map_err(|_| DeployError::TimedOut { instances, deadline })?;

    // Report the first failure; workers that did start are already registered.
    results.into_iter().collect::<Result<Vec<()>, _>>()?;

    tracing::info!(instances, "Ingress workers deployed");
    Ok(instances)
}
