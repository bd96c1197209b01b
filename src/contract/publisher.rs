//! Contract publisher.
//!
//! Sends the whole contract to the reconciler address on every change. The
//! send is fire-and-forget, but the call itself only succeeds once the
//! payload is handed to the bus.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::bus::{BusError, EventBus, Message};
use crate::contract::watcher::{ContractChangeHandler, HandlerError};
use crate::lifecycle::resource::{CloseError, ResourceHandle};
use crate::observability::metrics;

/// Address the reconciler consumer listens on.
pub const RECONCILER_ADDRESS: &str = "resourcesreconciler.core";

/// Header carrying the contract file path.
pub const SOURCE_HEADER: &str = "contract-source";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to read contract {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("contract publisher is closed")]
    Closed,

    #[error(transparent)]
    Bus(#[from] BusError),
}

#[derive(Clone)]
pub struct ContractPublisher {
    bus: EventBus,
    address: Arc<str>,
    closed: Arc<AtomicBool>,
}

impl ContractPublisher {
    pub fn new(bus: EventBus, address: &str) -> Self {
        Self {
            bus,
            address: Arc::from(address),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Read the contract at `path` and send it. Returns the payload size.
    pub fn update_contract(&self, path: &Path) -> Result<usize, PublishError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PublishError::Closed);
        }
        let payload = fs::read(path).map_err(|source| PublishError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.publish(path, payload)
    }

    /// Send contents already read from `path`.
    pub fn publish(
        &self,
        path: &Path,
        payload: impl Into<Arc<[u8]>>,
    ) -> Result<usize, PublishError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PublishError::Closed);
        }
        let payload = payload.into();
        let size = payload.len();

        let message = Message::new(&*self.address, payload)
            .with_header(SOURCE_HEADER, path.display().to_string());
        let consumers = self.bus.send(message)?;

        metrics::record_contract_published(size);
        tracing::info!(
            address = %self.address,
            bytes = size,
            consumers,
            "Contract published"
        );
        Ok(size)
    }

    /// Teardown handle sharing this publisher's state.
    pub fn handle(&self) -> PublisherHandle {
        PublisherHandle {
            closed: Arc::clone(&self.closed),
        }
    }
}

impl ContractChangeHandler for ContractPublisher {
    fn contract_changed(&self, path: &Path, contents: &[u8]) -> Result<(), HandlerError> {
        self.publish(path, contents)?;
        Ok(())
    }
}

pub struct PublisherHandle {
    closed: Arc<AtomicBool>,
}

impl ResourceHandle for PublisherHandle {
    fn name(&self) -> &str {
        "contract-publisher"
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), CloseError>> {
        Box::pin(async move {
            self.closed.store(true, Ordering::Release);
            Ok(())
        })
    }
}
