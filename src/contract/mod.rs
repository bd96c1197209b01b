//! Contract propagation subsystem.
//!
//! # Data Flow
//! ```text
//! contract file on disk
//!     → watcher.rs (poll tick / fs event → fingerprint.rs)
//!     → fingerprint differs from last publish?
//!     → publisher.rs (the bytes just fingerprinted → event bus, reconciler address)
//!     → Ok: fingerprint advances | Err: retried next cycle
//! ```
//!
//! # Design Decisions
//! - The contract is opaque here; it is never parsed
//! - Change identity is a content hash, not mtime
//! - At-least-once delivery: the fingerprint moves only after a publish
//! - Changes between two checks coalesce into the state seen at check time

pub mod fingerprint;
pub mod publisher;
pub mod watcher;

pub use fingerprint::Fingerprint;
pub use publisher::{ContractPublisher, PublishError, RECONCILER_ADDRESS};
pub use watcher::{CheckOutcome, ContractChangeHandler, ContractWatcher, WatchCycleError};
