//! Backend client and server options resolved during bootstrap.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};

use crate::config::loader::ConfigError;
use crate::config::properties::{read_properties, read_properties_as_json};

pub const KEY_SERIALIZER: &str = "key.serializer";
pub const VALUE_SERIALIZER: &str = "value.serializer";
pub const INTERCEPTOR_CLASSES: &str = "interceptor.classes";

/// Properties handed to the backend producer factory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendClientConfig {
    properties: BTreeMap<String, String>,
}

impl BackendClientConfig {
    /// Read producer properties and force the serializer overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::from_properties(read_properties(path)?))
    }

    pub fn from_properties(mut properties: BTreeMap<String, String>) -> Self {
        properties.insert(KEY_SERIALIZER.into(), "string".into());
        properties.insert(VALUE_SERIALIZER.into(), "cloudevent".into());
        properties.insert(INTERCEPTOR_CLASSES.into(), "partition-key".into());
        Self { properties }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

/// Options for one ingress listener.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    pub properties: Map<String, Value>,
}

impl ServerOptions {
    /// Read the shared option file and bind it to `port`.
    pub fn from_file(path: &Path, host: &str, port: u16) -> Result<Self, ConfigError> {
        Ok(Self::new(host, port, read_properties_as_json(path)?))
    }

    pub fn new(host: &str, port: u16, properties: Map<String, Value>) -> Self {
        Self {
            host: host.to_string(),
            port,
            properties,
        }
    }

    /// Request body limit in bytes, from `maxBodySize`.
    pub fn max_body_size(&self) -> Option<usize> {
        self.properties
            .get("maxBodySize")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_user_serializers() {
        let mut props = BTreeMap::new();
        props.insert(KEY_SERIALIZER.to_string(), "custom".to_string());
        props.insert("acks".to_string(), "all".to_string());

        let config = BackendClientConfig::from_properties(props);
        assert_eq!(config.get(KEY_SERIALIZER), Some("string"));
        assert_eq!(config.get(VALUE_SERIALIZER), Some("cloudevent"));
        assert_eq!(config.get("acks"), Some("all"));
    }

    #[test]
    fn test_body_limit_from_properties() {
        let mut props = Map::new();
        props.insert("maxBodySize".into(), Value::from(1024));
        let options = ServerOptions::new("127.0.0.1", 8080, props);
        assert_eq!(options.max_body_size(), Some(1024));
        assert_eq!(ServerOptions::new("127.0.0.1", 8080, Map::new()).max_body_size(), None);
    }
}
