//! Ingress workload.
//!
//! # Data Flow
//! ```text
//! HTTP client ──POST /{namespace}/{name}──▶ IngressWorker (× instances)
//!     → EventBus "receiver.ingress" → backend producer
//! ```

pub mod deploy;
pub mod server;

pub use deploy::{deploy, DeployError, WorkerError, WorkerFactory};
pub use server::{IngressFactory, IngressWorker, INGRESS_ADDRESS};
