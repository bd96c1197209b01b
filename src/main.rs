//! Event receiver (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!   config (TOML + env) ──▶ Receiver::start
//!                              │
//!        ┌─────────────────────┼──────────────────────────────┐
//!        │  BootstrapSequencer (ordered phases, per deadline) │
//!        │   tracing → backend config → server options        │
//!        │   → event bus → event type index (optional)        │
//!        │   → ingress workers → contract watcher → signals   │
//!        └─────────────────────┬──────────────────────────────┘
//!                              │ every resource registered
//!                              ▼
//!                    ShutdownCoordinator ◀── SIGTERM / SIGINT
//!                    (stage-ordered, idempotent teardown)
//! ```
//!
//! Exit code 0 after a full teardown, 1 when startup fails.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use event_receiver::bus::EventBus;
use event_receiver::config::load_config;
use event_receiver::contract::RECONCILER_ADDRESS;
use event_receiver::ingress::INGRESS_ADDRESS;
use event_receiver::observability::logging::init_logging;
use event_receiver::{exit_status, Receiver};

#[derive(Parser)]
#[command(name = "event-receiver")]
#[command(about = "Network event receiver", long_about = None)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), |key| std::env::var(key).ok()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    if cli.check {
        println!("configuration ok");
        return ExitCode::SUCCESS;
    }

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        port = config.ingress.port,
        tls_port = config.ingress.tls_port,
        instances = config.ingress.effective_instances(),
        contract = ?config.paths.contract,
        "event-receiver v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let receiver = Receiver::new(Arc::new(config));
    if let Err(e) = attach_local_consumers(receiver.bus()) {
        tracing::error!(error = %e, "Failed to attach local consumers");
        return ExitCode::FAILURE;
    }

    let outcome = receiver.run().await;
    match &outcome {
        Ok(report) => tracing::info!(
            cause = ?report.cause,
            failures = report.errors.len(),
            "Shutdown complete"
        ),
        Err(e) => tracing::error!(phase = e.phase(), error = %e, "Startup failed"),
    }
    ExitCode::from(exit_status(&outcome))
}

/// Log what the in-process addresses receive when no embedding consumer is
/// attached.
fn attach_local_consumers(bus: &EventBus) -> Result<(), event_receiver::bus::BusError> {
    for address in [RECONCILER_ADDRESS, INGRESS_ADDRESS] {
        let mut rx = bus.consumer(address)?;
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                tracing::debug!(
                    address,
                    bytes = message.payload.len(),
                    headers = message.headers.len(),
                    "Message received"
                );
            }
        });
    }
    Ok(())
}
