//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Phase 1..N, each under a deadline → resources registered as created
//!     Any failure → abort → shutdown.rs closes everything → exit 1
//!
//! Shutdown (shutdown.rs):
//!     Signal or fatal error → trigger_shutdown (once) → close by stage → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger_shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: tracing first, the ingress workload late, signals last
//! - Ordered shutdown: background producers, then the bus, then tracing
//! - Every close has a timeout: teardown always reaches Stopped

pub mod resource;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use resource::{CloseError, CloseStage, FnResource, ResourceHandle};
pub use shutdown::{LifecycleState, ShutdownCause, ShutdownCoordinator, ShutdownReport};
pub use startup::{BootstrapError, BootstrapSequencer, PhaseContext, PhaseError, StartupPhase};
