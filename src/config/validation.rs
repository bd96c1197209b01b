//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid and distinct)
//! - Check the control-plane endpoint parses as a URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ReceiverConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ReceiverConfig;

/// Upper bound for every configured duration, one day.
pub const MAX_DURATION_SECS: u64 = 86_400;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be non-zero")]
    Zero { field: &'static str },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("ingress.port and ingress.tls_port must differ (both {port})")]
    PortConflict { port: u16 },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("capability.endpoint {endpoint:?} is not a valid URL: {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("observability.metrics_address {address:?} is not a socket address")]
    MetricsAddress { address: String },
}

pub fn validate_config(config: &ReceiverConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut non_zero = |value: u64, field: &'static str| {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    };
    non_zero(config.ingress.port.into(), "ingress.port");
    non_zero(config.ingress.tls_port.into(), "ingress.tls_port");
    if let Some(instances) = config.ingress.instances {
        non_zero(instances as u64, "ingress.instances");
    }

    let mut duration = |value: u64, max: u64, field: &'static str| {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        } else if value > max {
            errors.push(ValidationError::TooLarge { field, max });
        }
    };
    let max_secs = MAX_DURATION_SECS;
    let max_ms = MAX_DURATION_SECS * 1000;
    duration(config.startup.wait_secs, max_secs, "startup.wait_secs");
    duration(config.startup.phase_timeout_secs, max_secs, "startup.phase_timeout_secs");
    duration(config.watcher.poll_interval_ms, max_ms, "watcher.poll_interval_ms");
    duration(config.capability.startup_timeout_secs, max_secs, "capability.startup_timeout_secs");
    duration(config.capability.resync_secs, max_secs, "capability.resync_secs");
    duration(config.shutdown.close_timeout_secs, max_secs, "shutdown.close_timeout_secs");

    if config.ingress.port != 0 && config.ingress.port == config.ingress.tls_port {
        errors.push(ValidationError::PortConflict {
            port: config.ingress.port,
        });
    }

    if config.paths.contract.as_os_str().is_empty() {
        errors.push(ValidationError::Empty {
            field: "paths.contract",
        });
    }
    if config.ingress.bind_host.trim().is_empty() {
        errors.push(ValidationError::Empty {
            field: "ingress.bind_host",
        });
    }

    if let Some(endpoint) = &config.capability.endpoint {
        if let Err(e) = url::Url::parse(endpoint) {
            errors.push(ValidationError::Endpoint {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            });
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress {
            address: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&ReceiverConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ReceiverConfig::default();
        config.startup.wait_secs = 0;
        config.ingress.tls_port = config.ingress.port;
        config.capability.endpoint = Some("not a url".into());
        config.paths.contract = Default::default();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero {
            field: "startup.wait_secs"
        }));
        assert!(errors.contains(&ValidationError::PortConflict { port: 8080 }));
    }

    #[test]
    fn test_rejects_unbounded_durations() {
        let mut config = ReceiverConfig::default();
        config.startup.wait_secs = u64::MAX;
        config.capability.startup_timeout_secs = MAX_DURATION_SECS + 1;
        config.watcher.poll_interval_ms = MAX_DURATION_SECS * 1000;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::TooLarge {
                    field: "startup.wait_secs",
                    max: MAX_DURATION_SECS
                },
                ValidationError::TooLarge {
                    field: "capability.startup_timeout_secs",
                    max: MAX_DURATION_SECS
                },
            ]
        );
    }
}
