//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! receiver.toml (optional)
//!     → loader.rs (parse & deserialize)
//!     → env.rs (environment overlay)
//!     → validation.rs (semantic checks)
//!     → ReceiverConfig (validated, immutable)
//!     → shared by reference or Arc with every component
//!
//! During bootstrap:
//!     properties.rs reads producer / HTTP server option files
//!     → options.rs (BackendClientConfig, ServerOptions)
//! ```
//!
//! # Design Decisions
//! - Config is resolved once at process entry and never mutated afterwards
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod options;
pub mod properties;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use options::{BackendClientConfig, ServerOptions};
pub use schema::{
    CapabilityConfig, IngressConfig, LogFormat, ObservabilityConfig, PathsConfig, ReceiverConfig,
    ShutdownConfig, StartupConfig, WatcherConfig,
};
