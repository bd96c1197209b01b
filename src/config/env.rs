//! Environment overlay.
//!
//! Receiver deployments pass their parameters as environment variables. They
//! are resolved once at process start, on top of the file configuration.

use std::path::PathBuf;
use std::str::FromStr;

use crate::config::loader::ConfigError;
use crate::config::schema::ReceiverConfig;

pub const INGRESS_PORT: &str = "INGRESS_PORT";
pub const INGRESS_TLS_PORT: &str = "INGRESS_TLS_PORT";
pub const INGRESS_INSTANCES: &str = "INGRESS_INSTANCES";
pub const WAIT_STARTUP_SECONDS: &str = "WAIT_STARTUP_SECONDS";
pub const PRODUCER_CONFIG_FILE_PATH: &str = "PRODUCER_CONFIG_FILE_PATH";
pub const HTTPSERVER_CONFIG_FILE_PATH: &str = "HTTPSERVER_CONFIG_FILE_PATH";
pub const DATA_PLANE_CONFIG_FILE_PATH: &str = "DATA_PLANE_CONFIG_FILE_PATH";
pub const CONFIG_TRACING_PATH: &str = "CONFIG_TRACING_PATH";
pub const CONTROL_PLANE_URL: &str = "CONTROL_PLANE_URL";
pub const CONTROL_PLANE_TOKEN_PATH: &str = "CONTROL_PLANE_TOKEN_PATH";
pub const METRICS_ADDRESS: &str = "METRICS_ADDRESS";

/// Apply environment variables from `lookup` onto `config`.
///
/// `lookup` is usually `|key| std::env::var(key).ok()`; tests pass a map.
pub fn apply_env<F>(config: &mut ReceiverConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = parsed(&lookup, INGRESS_PORT)? {
        config.ingress.port = port;
    }
    if let Some(port) = parsed(&lookup, INGRESS_TLS_PORT)? {
        config.ingress.tls_port = port;
    }
    if let Some(instances) = parsed(&lookup, INGRESS_INSTANCES)? {
        config.ingress.instances = Some(instances);
    }
    if let Some(secs) = parsed(&lookup, WAIT_STARTUP_SECONDS)? {
        config.startup.wait_secs = secs;
    }

    if let Some(path) = lookup(PRODUCER_CONFIG_FILE_PATH) {
        config.paths.producer_config = PathBuf::from(path);
    }
    if let Some(path) = lookup(HTTPSERVER_CONFIG_FILE_PATH) {
        config.paths.http_server_config = PathBuf::from(path);
    }
    if let Some(path) = lookup(DATA_PLANE_CONFIG_FILE_PATH) {
        config.paths.contract = PathBuf::from(path);
    }
    if let Some(path) = lookup(CONFIG_TRACING_PATH) {
        config.paths.tracing_dir = PathBuf::from(path);
    }

    if let Some(url) = lookup(CONTROL_PLANE_URL) {
        config.capability.endpoint = Some(url);
    }
    if let Some(path) = lookup(CONTROL_PLANE_TOKEN_PATH) {
        config.capability.token_path = Some(PathBuf::from(path));
    }
    if let Some(addr) = lookup(METRICS_ADDRESS) {
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = addr;
    }

    Ok(())
}

fn parsed<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Env {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = ReceiverConfig::default();
        apply_env(
            &mut config,
            lookup_from(&[
                (INGRESS_PORT, "18080"),
                (WAIT_STARTUP_SECONDS, " 3 "),
                (DATA_PLANE_CONFIG_FILE_PATH, "/tmp/contract"),
                (CONTROL_PLANE_URL, "https://cp.local/eventtypes"),
            ]),
        )
        .unwrap();

        assert_eq!(config.ingress.port, 18080);
        assert_eq!(config.startup.wait_secs, 3);
        assert_eq!(config.paths.contract, PathBuf::from("/tmp/contract"));
        assert_eq!(
            config.capability.endpoint.as_deref(),
            Some("https://cp.local/eventtypes")
        );
        assert_eq!(config.ingress.tls_port, 8443);
    }

    #[test]
    fn test_bad_number_names_the_variable() {
        let mut config = ReceiverConfig::default();
        let err = apply_env(&mut config, lookup_from(&[(INGRESS_TLS_PORT, "https")])).unwrap_err();
        match err {
            ConfigError::Env { var, value, .. } => {
                assert_eq!(var, INGRESS_TLS_PORT);
                assert_eq!(value, "https");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
