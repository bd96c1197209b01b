//! Optional capability subsystem.
//!
//! # Data Flow
//! ```text
//! source.rs (control-plane list of event types)
//!     → informer.rs (initial sync + periodic resync → Lister snapshot)
//!     → acquirer.rs (bounded start-up: Available | Unavailable | TimedOut)
//!     → receiver: Option<Lister> handed to the ingress workers
//! ```
//!
//! # Design Decisions
//! - No outcome is fatal by default; absence is a permanent, valid state
//! - Permission failures stay distinguishable from timeouts and other errors
//! - Never retried after start-up

pub mod acquirer;
pub mod informer;
pub mod source;

use std::time::Duration;

pub use acquirer::{AcquireError, ResilientAcquirer};
pub use informer::{EventTypeInformer, InformerHandle, Lister, StartedInformer};
pub use source::{EventType, EventTypeSource, HttpEventTypeSource};

/// Why an optional capability could not be acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The source rejected our credentials or lacks RBAC grants.
    Permission(String),
    Other(String),
}

/// Outcome of acquiring an optional capability.
#[derive(Debug)]
pub enum OptionalCapability<T> {
    Available(T),
    Unavailable(UnavailableReason),
    TimedOut(Duration),
}

impl<T> OptionalCapability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, OptionalCapability::Available(_))
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            OptionalCapability::Available(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            OptionalCapability::Available(value) => Some(value),
            _ => None,
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            OptionalCapability::Available(_) => "available",
            OptionalCapability::Unavailable(UnavailableReason::Permission(_)) => {
                "permission_denied"
            }
            OptionalCapability::Unavailable(UnavailableReason::Other(_)) => "unavailable",
            OptionalCapability::TimedOut(_) => "timed_out",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_available_yields_a_value() {
        assert_eq!(OptionalCapability::Available(7).into_option(), Some(7));
        assert_eq!(
            OptionalCapability::<i32>::TimedOut(Duration::from_secs(5)).into_option(),
            None
        );
        let denied =
            OptionalCapability::<i32>::Unavailable(UnavailableReason::Permission("403".into()));
        assert!(!denied.is_available());
        assert_eq!(denied.label(), "permission_denied");
    }
}
