//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the receiver.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the receiver.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Ingress listener settings.
    pub ingress: IngressConfig,

    /// Paths of the files read during bootstrap.
    pub paths: PathsConfig,

    /// Startup deadlines.
    pub startup: StartupConfig,

    /// Contract watcher settings.
    pub watcher: WatcherConfig,

    /// Optional event type index.
    pub capability: CapabilityConfig,

    /// Teardown settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Ingress listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IngressConfig {
    /// Host the listeners bind to.
    pub bind_host: String,

    /// Plaintext listener port.
    pub port: u16,

    /// Secure listener port.
    pub tls_port: u16,

    /// Number of identical ingress workers. Defaults to the CPU count.
    pub instances: Option<usize>,
}

impl IngressConfig {
    pub fn effective_instances(&self) -> usize {
        self.instances.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 8080,
            tls_port: 8443,
            instances: None,
        }
    }
}

/// Files consumed at startup.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Backend producer properties.
    pub producer_config: PathBuf,

    /// HTTP server option properties.
    pub http_server_config: PathBuf,

    /// Contract file watched for changes.
    pub contract: PathBuf,

    /// Directory holding tracing settings.
    pub tracing_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            producer_config: PathBuf::from("/etc/config/producer.properties"),
            http_server_config: PathBuf::from("/etc/config/http-server.properties"),
            contract: PathBuf::from("/etc/receiver-data-plane/data"),
            tracing_dir: PathBuf::from("/etc/tracing"),
        }
    }
}

/// Startup deadlines.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StartupConfig {
    /// Deadline for the ingress workers to become ready, in seconds.
    pub wait_secs: u64,

    /// Deadline for every other phase, in seconds.
    pub phase_timeout_secs: u64,
}

impl StartupConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn phase_timeout(&self) -> Duration {
        Duration::from_secs(self.phase_timeout_secs)
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            wait_secs: 8,
            phase_timeout_secs: 10,
        }
    }
}

/// Contract watcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WatcherConfig {
    /// Fallback polling interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

/// Event type index fed from the control plane.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CapabilityConfig {
    /// Attempt to start the index at all.
    pub enabled: bool,

    /// Control-plane URL listing event types.
    pub endpoint: Option<String>,

    /// File holding the bearer token for the control plane.
    pub token_path: Option<PathBuf>,

    /// Startup timeout in seconds.
    pub startup_timeout_secs: u64,

    /// Refresh interval in seconds.
    pub resync_secs: u64,

    /// Treat a permission failure as a fatal startup error.
    pub require_permission: bool,
}

impl CapabilityConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            token_path: None,
            startup_timeout_secs: 5,
            resync_secs: 30,
            require_permission: false,
        }
    }
}

/// Teardown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Deadline for each resource's close, in seconds.
    pub close_timeout_secs: u64,
}

impl ShutdownConfig {
    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            close_timeout_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ReceiverConfig = toml::from_str(
            r#"
            [ingress]
            port = 9000

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.ingress.port, 9000);
        assert_eq!(config.ingress.tls_port, 8443);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.capability.resync_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_explicit_instances_win() {
        let ingress = IngressConfig {
            instances: Some(3),
            ..IngressConfig::default()
        };
        assert_eq!(ingress.effective_instances(), 3);
        assert!(IngressConfig::default().effective_instances() >= 1);
    }
}
