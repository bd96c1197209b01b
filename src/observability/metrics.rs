//! Metrics collection and exposition.
//!
//! # Metrics
//! - `receiver_contract_publish_total` (counter): contracts sent to the reconciler
//! - `receiver_watch_cycle_errors_total` (counter): failed fingerprint or publish cycles
//! - `receiver_capability_outcome_total` (counter): optional capability outcomes by label
//! - `receiver_teardown_errors_total` (counter): resources that failed to close

use std::net::SocketAddr;

use futures_util::future::BoxFuture;
use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::lifecycle::resource::{CloseError, CloseStage, ResourceHandle};

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("a global metrics recorder is already installed")]
    AlreadyInstalled,
}

/// Scrape listener task. Closing it stops serving `/metrics`.
pub struct MetricsExporter {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<MetricsExporter, MetricsError> {
    let (recorder, exporter) = PrometheusBuilder::new().with_http_listener(addr).build()?;
    metrics::set_global_recorder(recorder).map_err(|_| MetricsError::AlreadyInstalled)?;

    let task = tokio::spawn(async move {
        if let Err(e) = exporter.await {
            tracing::error!(error = ?e, "Metrics exporter stopped");
        }
    });
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(MetricsExporter { addr, task })
}

impl ResourceHandle for MetricsExporter {
    fn name(&self) -> &str {
        "metrics-exporter"
    }

    fn stage(&self) -> CloseStage {
        CloseStage::Infrastructure
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), CloseError>> {
        Box::pin(async move {
            let MetricsExporter { addr, task } = *self;
            task.abort();
            let _ = task.await;
            tracing::info!(address = %addr, "Metrics exporter stopped listening");
            Ok(())
        })
    }
}

pub fn record_contract_published(bytes: usize) {
    counter!("receiver_contract_publish_total").increment(1);
    counter!("receiver_contract_publish_bytes_total").increment(bytes as u64);
}

pub fn record_watch_error() {
    counter!("receiver_watch_cycle_errors_total").increment(1);
}

pub fn record_capability_outcome(outcome: &'static str) {
    counter!("receiver_capability_outcome_total", "outcome" => outcome).increment(1);
}

pub fn record_teardown_error() {
    counter!("receiver_teardown_errors_total").increment(1);
}
