//! One parsed configuration file.

use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Parsed contents of one configuration file.
///
/// Top-level dotted keys are expanded into nested objects, so
/// `{"sites.default.remote.port": 2121}` and
/// `{"sites": {"default": {"remote": {"port": 2121}}}}` are equivalent.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFragment {
    source: PathBuf,
    values: Map<String, Value>,
}

impl ConfigFragment {
    /// Parse `content` read from `source`. Empty files and a bare `null` parse
    /// to an empty fragment; any other non-object document is rejected.
    pub fn parse(source: impl Into<PathBuf>, content: &str) -> Result<Self, ConfigError> {
        let source = source.into();
        if content.trim().is_empty() {
            return Ok(Self {
                source,
                values: Map::new(),
            });
        }

        let parsed: Value = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            path: source.clone(),
            message: e.to_string(),
        })?;

        let raw = match parsed {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ConfigError::NotAnObject(source)),
        };

        let mut values = Map::new();
        for (key, value) in raw {
            set_node(&mut values, &key, value);
        }
        Ok(Self { source, values })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Store `value` under a dotted `key`, creating (or overwriting non-object)
/// intermediate nodes.
fn set_node(root: &mut Map<String, Value>, key: &str, value: Value) {
    let mut segments: Vec<&str> = key.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut current = root;
    for segment in segments {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => return,
        };
    }

    match current.get_mut(last) {
        Some(Value::Object(existing)) if value.is_object() => {
            if let Value::Object(incoming) = value {
                existing.extend(incoming);
            }
        }
        _ => {
            current.insert(last.to_string(), value);
        }
    }
}
