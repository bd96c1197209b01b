//! Properties file reader.
//!
//! Producer and HTTP server options are shipped as `key=value` properties
//! files. Lines starting with `#` or `!` are comments; `:` is accepted as a
//! separator as well as `=`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::config::loader::ConfigError;

pub fn parse_properties(text: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = match line.find(['=', ':']) {
            Some(idx) => (&line[..idx], &line[idx + 1..]),
            None => (line, ""),
        };
        properties.insert(key.trim().to_string(), value.trim().to_string());
    }
    properties
}

pub fn read_properties(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_properties(&text))
}

/// Read a properties file as a JSON object.
///
/// Values that look like booleans or numbers become JSON booleans and numbers.
pub fn read_properties_as_json(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    Ok(read_properties(path)?
        .into_iter()
        .map(|(key, value)| (key, typed(value)))
        .collect())
}

fn typed(raw: String) -> Value {
    if let Ok(flag) = raw.parse::<bool>() {
        return Value::Bool(flag);
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_skips_comments_and_trims() {
        let props = parse_properties(
            "# producer\n! legacy comment\nacks = all\nlinger.ms: 5\n\nbootstrap.servers=a:9092,b:9092\nflag\n",
        );
        assert_eq!(props.get("acks").map(String::as_str), Some("all"));
        assert_eq!(props.get("linger.ms").map(String::as_str), Some("5"));
        assert_eq!(
            props.get("bootstrap.servers").map(String::as_str),
            Some("a:9092,b:9092")
        );
        assert_eq!(props.get("flag").map(String::as_str), Some(""));
        assert_eq!(props.len(), 4);
    }

    #[test]
    fn test_json_values_are_typed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "idleTimeout=30\nuseAlpn=true\nhost=localhost").unwrap();

        let json = read_properties_as_json(file.path()).unwrap();
        assert_eq!(json["idleTimeout"], Value::from(30));
        assert_eq!(json["useAlpn"], Value::Bool(true));
        assert_eq!(json["host"], Value::from("localhost"));
    }
}
