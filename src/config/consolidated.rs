//! ConsolidatedConfig: immutable snapshot produced by every consolidation.

use super::fragment::ConfigFragment;
use crate::error::ConfigError;
use crate::remote::ConnectionInfo;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// A fragment that could not be read or parsed during the last load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Site entry under `sites.<name>` in the consolidated configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub remote: ConnectionInfo,
}

/// Overlay of every fragment, in fragment order, with later fragments winning.
///
/// Snapshots are never mutated after publication; a new revision replaces the
/// previous one as a whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedConfig {
    revision: u64,
    contents: Value,
    sources: Vec<PathBuf>,
    parse_errors: Vec<ParseFailure>,
}

impl Default for ConsolidatedConfig {
    fn default() -> Self {
        Self {
            revision: 0,
            contents: Value::Object(Map::new()),
            sources: Vec::new(),
            parse_errors: Vec::new(),
        }
    }
}

impl ConsolidatedConfig {
    /// Overlay `fragments` in iteration order.
    pub fn build<'a>(
        revision: u64,
        fragments: impl IntoIterator<Item = &'a ConfigFragment>,
        parse_errors: Vec<ParseFailure>,
    ) -> Self {
        let mut contents = Map::new();
        let mut sources = Vec::new();
        for fragment in fragments {
            for (key, value) in fragment.values() {
                overlay(&mut contents, key, value);
            }
            sources.push(fragment.source().to_path_buf());
        }
        Self {
            revision,
            contents: Value::Object(contents),
            sources,
            parse_errors,
        }
    }

    /// Monotonic revision; 0 is the empty snapshot before any load.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn contents(&self) -> &Value {
        &self.contents
    }

    /// Fragments that contributed, in overlay order.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn parse_errors(&self) -> &[ParseFailure] {
        &self.parse_errors
    }

    pub fn has_parse_errors(&self) -> bool {
        !self.parse_errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.as_object().map_or(true, Map::is_empty)
    }

    /// Value at a dotted key, or `None` when any segment is missing.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        if key.is_empty() {
            return None;
        }
        key.split('.')
            .try_fold(&self.contents, |value, segment| value.as_object()?.get(segment))
    }

    /// Section-scoped view: the whole snapshot for `None`, one subtree otherwise.
    pub fn section(&self, section: Option<&str>) -> Option<&Value> {
        match section {
            None => Some(&self.contents),
            Some(key) => self.lookup(key),
        }
    }

    /// Deserialize the value at `key`. Absent keys are `Ok(None)`; present
    /// values of the wrong shape are an error.
    pub fn lookup_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.lookup(key)
            .map(|value| {
                T::deserialize(value).map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn site(&self, name: &str) -> Result<Option<SiteConfig>, ConfigError> {
        self.lookup_as(&format!("sites.{}", name))
    }

    /// Connection parameters of site `name`; `Ok(None)` when no such site is configured.
    pub fn connection(&self, name: &str) -> Result<Option<ConnectionInfo>, ConfigError> {
        Ok(self.site(name)?.map(|site| site.remote))
    }

    pub fn site_names(&self) -> Vec<String> {
        self.lookup("sites")
            .and_then(Value::as_object)
            .map(|sites| sites.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Merge `value` into `map[key]`: objects merge recursively, anything else
/// replaces what was there.
fn overlay(map: &mut Map<String, Value>, key: &str, value: &Value) {
    if let (Some(Value::Object(existing)), Value::Object(incoming)) = (map.get_mut(key), value) {
        for (k, v) in incoming {
            overlay(existing, k, v);
        }
        return;
    }
    map.insert(key.to_string(), value.clone());
}
