//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters for publishes, watch errors, teardown)
//!     → tracing.rs (tracer provider configured from the tracing directory)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Logging is installed once in `main`, before bootstrap starts
//! - Metrics are cheap (atomic increments) and no-ops without an exporter
//! - The tracer provider is a registered resource and closes last

pub mod logging;
pub mod metrics;
pub mod tracing;
