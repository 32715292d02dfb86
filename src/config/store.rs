//! ConfigStore: owns the fragment map and publishes consolidated snapshots.

use super::consolidated::{ConsolidatedConfig, ParseFailure};
use super::fragment::ConfigFragment;
use super::layout::ConfigLayout;
use super::source::ConfigSource;
use arc_swap::ArcSwap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// New state of one fragment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentUpdate {
    Content(String),
    Deleted,
}

/// Result of a bulk load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub failed: usize,
}

/// Cheap read handle onto the latest published snapshot.
#[derive(Clone)]
pub struct ConfigReader {
    published: Arc<ArcSwap<ConsolidatedConfig>>,
}

impl ConfigReader {
    pub fn snapshot(&self) -> Arc<ConsolidatedConfig> {
        self.published.load_full()
    }

    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.published.load().lookup(key).cloned()
    }
}

/// Fragment map keyed by workspace-relative path.
///
/// Iteration order of the map is the overlay order, which keeps consolidation
/// deterministic. Only the store mutates the map; readers see immutable
/// snapshots published by [`ConfigStore::consolidate`].
pub struct ConfigStore {
    layout: ConfigLayout,
    source: Arc<dyn ConfigSource>,
    fragments: BTreeMap<PathBuf, ConfigFragment>,
    failures: BTreeMap<PathBuf, String>,
    bulk_loaded: bool,
    revision: u64,
    published: Arc<ArcSwap<ConsolidatedConfig>>,
}

impl ConfigStore {
    pub fn new(layout: ConfigLayout, source: Arc<dyn ConfigSource>) -> Self {
        Self {
            layout,
            source,
            fragments: BTreeMap::new(),
            failures: BTreeMap::new(),
            bulk_loaded: false,
            revision: 0,
            published: Arc::new(ArcSwap::from_pointee(ConsolidatedConfig::default())),
        }
    }

    pub fn layout(&self) -> &ConfigLayout {
        &self.layout
    }

    /// Whether the folder has been scanned since the last invalidation.
    pub fn is_bulk_loaded(&self) -> bool {
        self.bulk_loaded
    }

    pub fn fragment(&self, relative: &Path) -> Option<&ConfigFragment> {
        self.fragments.get(relative)
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Whether the primary FTP fragment is present.
    pub fn has_ftp_configuration(&self) -> bool {
        self.fragments.contains_key(&self.layout.ftp_fragment())
    }

    /// Scan the configuration folder and replace the whole fragment set.
    ///
    /// Never fails: a missing folder is an empty set, and unreadable or
    /// malformed files are recorded as failures and skipped.
    pub async fn load_all(&mut self) -> LoadReport {
        let folder = self.layout.folder_path();
        let listed = match self.source.list(&folder).await {
            Ok(listed) => listed,
            Err(e) if e.is_not_found() => {
                debug!(folder = %folder.display(), "Configuration folder absent");
                Vec::new()
            }
            Err(e) => {
                warn!(
                    folder = %folder.display(),
                    error = %e,
                    "Failed to list configuration folder"
                );
                Vec::new()
            }
        };

        let mut fragments = BTreeMap::new();
        let mut failures = BTreeMap::new();
        for path in listed {
            let Some(relative) = self.layout.relative(&path) else {
                continue;
            };
            if !self.layout.is_fragment(&relative) {
                continue;
            }
            let parsed = match self.source.read(&path).await {
                Ok(content) => ConfigFragment::parse(relative.clone(), &content),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(fragment) => {
                    fragments.insert(relative, fragment);
                }
                Err(e) => {
                    warn!(path = %relative.display(), error = %e, "Skipping configuration file");
                    failures.insert(relative, e.to_string());
                }
            }
        }

        let report = LoadReport {
            loaded: fragments.len(),
            failed: failures.len(),
        };
        self.fragments = fragments;
        self.failures = failures;
        self.bulk_loaded = true;
        info!(
            folder = %folder.display(),
            loaded = report.loaded,
            failed = report.failed,
            "Loaded configuration folder"
        );
        report
    }

    /// Update or remove exactly one fragment. Returns whether the fragment set
    /// (or its failure record) changed.
    pub fn apply_change(&mut self, relative: &Path, update: FragmentUpdate) -> bool {
        match update {
            FragmentUpdate::Deleted => {
                let removed = self.fragments.remove(relative).is_some();
                let cleared = self.failures.remove(relative).is_some();
                removed || cleared
            }
            FragmentUpdate::Content(content) => {
                match ConfigFragment::parse(relative.to_path_buf(), &content) {
                    Ok(fragment) => {
                        self.failures.remove(relative);
                        self.fragments.insert(relative.to_path_buf(), fragment);
                    }
                    Err(e) => {
                        warn!(
                            path = %relative.display(),
                            error = %e,
                            "Configuration file failed to parse"
                        );
                        self.fragments.remove(relative);
                        self.failures.insert(relative.to_path_buf(), e.to_string());
                    }
                }
                true
            }
        }
    }

    /// Re-read one fragment from the source and apply it. A file that no
    /// longer exists is treated as deleted.
    pub async fn refresh_fragment(&mut self, relative: &Path) -> bool {
        let absolute = self.layout.workspace_root.join(relative);
        match self.source.read(&absolute).await {
            Ok(content) => self.apply_change(relative, FragmentUpdate::Content(content)),
            Err(e) if e.is_not_found() => self.apply_change(relative, FragmentUpdate::Deleted),
            Err(e) => {
                warn!(path = %relative.display(), error = %e, "Failed to read configuration file");
                self.fragments.remove(relative);
                self.failures.insert(relative.to_path_buf(), e.to_string());
                true
            }
        }
    }

    /// Drop every fragment and require a fresh scan before the next reload.
    pub fn invalidate(&mut self) {
        self.fragments.clear();
        self.failures.clear();
        self.bulk_loaded = false;
    }

    /// Recompute the consolidated configuration from scratch and publish it.
    pub fn consolidate(&mut self) -> Arc<ConsolidatedConfig> {
        self.revision += 1;
        let parse_errors = self
            .failures
            .iter()
            .map(|(path, message)| ParseFailure {
                path: path.clone(),
                message: message.clone(),
            })
            .collect();
        let snapshot = Arc::new(ConsolidatedConfig::build(
            self.revision,
            self.fragments.values(),
            parse_errors,
        ));
        self.published.store(Arc::clone(&snapshot));
        debug!(
            revision = snapshot.revision(),
            fragments = snapshot.sources().len(),
            parse_errors = snapshot.parse_errors().len(),
            "Published consolidated configuration"
        );
        snapshot
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<ConsolidatedConfig> {
        self.published.load_full()
    }

    /// Value at a dotted key in the latest published snapshot.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.published.load().lookup(key).cloned()
    }

    pub fn reader(&self) -> ConfigReader {
        ConfigReader {
            published: Arc::clone(&self.published),
        }
    }
}
