//! Bounded, degrade-on-failure acquisition.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;

use crate::capability::{OptionalCapability, UnavailableReason};
use crate::observability::metrics;

/// Failure reported by a capability source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("permission denied: {0}")]
    Permission(String),

    #[error("{0}")]
    Failed(String),
}

/// Acquires optional capabilities within a fixed deadline.
#[derive(Debug, Clone, Copy)]
pub struct ResilientAcquirer {
    timeout: Duration,
}

impl ResilientAcquirer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `acquisition` under the deadline. Never fails: every outcome is
    /// representable and logged, and the caller continues either way.
    pub async fn acquire<T, Fut>(&self, capability: &str, acquisition: Fut) -> OptionalCapability<T>
    where
        Fut: Future<Output = Result<T, AcquireError>>,
    {
        let outcome = match timeout(self.timeout, acquisition).await {
            Ok(Ok(value)) => {
                tracing::info!(capability, "Optional capability available");
                OptionalCapability::Available(value)
            }
            Ok(Err(AcquireError::Permission(reason))) => {
                tracing::warn!(
                    capability,
                    error = %reason,
                    "Insufficient permissions to list/watch {capability}; continuing without it. \
                     Grant list and watch on {capability} to the receiver's service account \
                     to avoid redundant auto-create requests"
                );
                OptionalCapability::Unavailable(UnavailableReason::Permission(reason))
            }
            Ok(Err(AcquireError::Failed(reason))) => {
                tracing::warn!(
                    capability,
                    error = %reason,
                    "Failed to start {capability}; continuing without it"
                );
                OptionalCapability::Unavailable(UnavailableReason::Other(reason))
            }
            Err(_) => {
                tracing::warn!(
                    capability,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Timed out starting {capability}; continuing without it"
                );
                OptionalCapability::TimedOut(self.timeout)
            }
        };
        metrics::record_capability_outcome(outcome.label());
        outcome
    }
}
