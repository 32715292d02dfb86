//! File access seam for the configuration store.

use crate::error::ConfigError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory listing and file reads used by [`ConfigStore`](super::ConfigStore).
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Files directly inside `folder`, as absolute paths.
    async fn list(&self, folder: &Path) -> Result<Vec<PathBuf>, ConfigError>;

    async fn read(&self, path: &Path) -> Result<String, ConfigError>;
}

/// Local filesystem source on `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsConfigSource;

#[async_trait]
impl ConfigSource for FsConfigSource {
    async fn list(&self, folder: &Path) -> Result<Vec<PathBuf>, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: folder.to_path_buf(),
            source,
        };
        let mut reader = tokio::fs::read_dir(folder).await.map_err(io_err)?;

        let mut files = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(io_err)? {
            // Follows symlinks, matching what `read` sees.
            match tokio::fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_file() => files.push(entry.path()),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        path = %entry.path().display(),
                        error = %e,
                        "Failed to stat config entry"
                    );
                }
            }
        }
        Ok(files)
    }

    async fn read(&self, path: &Path) -> Result<String, ConfigError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// In-memory source keyed by absolute path, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryConfigSource {
    files: RwLock<BTreeMap<PathBuf, String>>,
}

impl MemoryConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.write().insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.files.write().remove(path).is_some()
    }

    /// Remove every file below `folder`.
    pub fn remove_folder(&self, folder: &Path) {
        self.files.write().retain(|path, _| !path.starts_with(folder));
    }
}

fn not_found(path: &Path) -> ConfigError {
    ConfigError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
    }
}

#[async_trait]
impl ConfigSource for MemoryConfigSource {
    async fn list(&self, folder: &Path) -> Result<Vec<PathBuf>, ConfigError> {
        let files = self.files.read();
        let listed: Vec<PathBuf> = files
            .keys()
            .filter(|path| path.parent() == Some(folder))
            .cloned()
            .collect();
        if listed.is_empty() && !files.keys().any(|path| path.starts_with(folder)) {
            return Err(not_found(folder));
        }
        Ok(listed)
    }

    async fn read(&self, path: &Path) -> Result<String, ConfigError> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }
}
