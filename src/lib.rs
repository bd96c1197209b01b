//! Event receiver bootstrap, contract propagation and lifecycle core.

pub mod bus;
pub mod capability;
pub mod config;
pub mod contract;
pub mod ingress;
pub mod lifecycle;
pub mod observability;
pub mod receiver;

pub use config::schema::ReceiverConfig;
pub use lifecycle::ShutdownCoordinator;
pub use receiver::{exit_status, Receiver, ReceiverContext, RunningReceiver};
