//! Resolver backed by a local directory mirror.

use super::{ConnectionInfo, RemoteResolver};
use crate::error::ResolveError;
use crate::tree::RemoteEntry;
use crate::types::RemotePath;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Serves listings from a local copy of the whole server: the server path `/`
/// maps onto `base`, so a site with `remoteDir: "/www"` lists `base/www`.
///
/// The connection descriptor is ignored. Entries are reported sorted by name.
pub struct LocalDirResolver {
    base: PathBuf,
}

impl LocalDirResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn local_path(&self, path: &RemotePath) -> PathBuf {
        path.segments()
            .fold(self.base.clone(), |acc, segment| acc.join(segment))
    }
}

#[async_trait]
impl RemoteResolver for LocalDirResolver {
    async fn resolve(
        &self,
        path: &RemotePath,
        _connection: &ConnectionInfo,
    ) -> Result<Vec<RemoteEntry>, ResolveError> {
        let dir = self.local_path(path);
        let mut reader = tokio::fs::read_dir(&dir).await?;

        let mut entries = Vec::new();
        while let Some(item) = reader.next_entry().await? {
            let name = match item.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::warn!(name = ?raw, dir = %dir.display(), "Skipping non UTF8 entry");
                    continue;
                }
            };
            let metadata = item.metadata().await?;
            let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

            let entry = if metadata.is_dir() {
                RemoteEntry::directory(name)
            } else {
                RemoteEntry::file(name, metadata.len())
            };
            entries.push(match modified {
                Some(time) => entry.with_modified(time),
                None => entry,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lists_mirror_directory() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("b.txt"), b"12345").unwrap();
        std::fs::create_dir(temp.path().join("a-dir")).unwrap();
        std::fs::write(temp.path().join("a-dir").join("inner.txt"), b"x").unwrap();

        let resolver = LocalDirResolver::new(temp.path());
        let info = ConnectionInfo::new("unused");

        let root = resolver.resolve(&RemotePath::root(), &info).await.unwrap();
        assert_eq!(root.len(), 2);
        assert_eq!(root[0].name, "a-dir");
        assert!(root[0].is_directory);
        assert_eq!(root[1].name, "b.txt");
        assert_eq!(root[1].size, Some(5));

        let inner = resolver
            .resolve(&RemotePath::new("/a-dir"), &info)
            .await
            .unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].name, "inner.txt");
    }

    #[tokio::test]
    async fn test_server_paths_map_below_base() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("www/site")).unwrap();
        assert_eq!(
            LocalDirResolver::new(temp.path()).local_path(&RemotePath::new("/www/site")),
            temp.path().join("www").join("site")
        );

        let info = ConnectionInfo::new("unused").with_remote_dir("/www");
        let listing = LocalDirResolver::new(temp.path())
            .resolve(&info.root_path(), &info)
            .await
            .unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "site");
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let resolver = LocalDirResolver::new(temp.path());
        let result = resolver
            .resolve(&RemotePath::new("/missing"), &ConnectionInfo::new("unused"))
            .await;
        assert!(matches!(result, Err(ResolveError::Io(_))));
    }
}
