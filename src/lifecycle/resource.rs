//! Closeable resource abstraction.
//!
//! Anything with a teardown action (a worker, a watcher, the event bus, the
//! tracer provider) is wrapped as a [`ResourceHandle`] and handed to the
//! [`ShutdownCoordinator`](crate::lifecycle::shutdown::ShutdownCoordinator),
//! which becomes its sole owner for teardown purposes.

use std::future::Future;

use futures_util::future::BoxFuture;
use thiserror::Error;

/// Teardown stage of a resource.
///
/// Stages close in declaration order, so nothing still running depends on a
/// substrate that has already been torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CloseStage {
    /// Background producers: watchers, informers, publishers, ingress workers.
    Background,
    /// The process-wide communication substrate (event bus).
    Substrate,
    /// Tracing and other infrastructure.
    Infrastructure,
}

impl std::fmt::Display for CloseStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CloseStage::Background => "background",
            CloseStage::Substrate => "substrate",
            CloseStage::Infrastructure => "infrastructure",
        };
        f.write_str(label)
    }
}

/// Error reported by a resource's close action.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CloseError {
    message: String,
}

impl CloseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A named unit with an explicit teardown action.
///
/// `close` consumes the handle: a resource is closed at most once.
pub trait ResourceHandle: Send {
    /// Name used in logs and teardown reports.
    fn name(&self) -> &str;

    /// Stage in which this resource is closed.
    fn stage(&self) -> CloseStage {
        CloseStage::Background
    }

    /// Release the resource.
    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), CloseError>>;
}

/// Resource handle backed by a closure.
pub struct FnResource<F> {
    name: String,
    stage: CloseStage,
    close: F,
}

impl<F, Fut> FnResource<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), CloseError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, stage: CloseStage, close: F) -> Self {
        Self {
            name: name.into(),
            stage,
            close,
        }
    }
}

impl<F, Fut> ResourceHandle for FnResource<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), CloseError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn stage(&self) -> CloseStage {
        self.stage
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), CloseError>> {
        Box::pin((self.close)())
    }
}
