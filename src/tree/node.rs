//! Remote tree node types

use crate::types::{NodeKey, RemotePath};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// One row of a directory listing as reported by a resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub is_directory: bool,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    /// Change token compared across refreshes, when the server offers one.
    #[serde(default)]
    pub etag: Option<String>,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            size: Some(size),
            modified: None,
            etag: None,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            size: None,
            modified: None,
            etag: None,
        }
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn kind(&self) -> NodeKind {
        if self.is_directory {
            NodeKind::Directory
        } else {
            NodeKind::File
        }
    }
}

/// A file or directory in the remote tree.
///
/// Nodes live in the arena owned by [`TreeModel`](super::TreeModel); callers
/// only ever see clones. `children` and `parent` are arena keys, so a node
/// never owns its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) key: NodeKey,
    pub(crate) path: RemotePath,
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) size: Option<u64>,
    pub(crate) modified: Option<DateTime<Utc>>,
    pub(crate) etag: Option<String>,
    pub(crate) children_resolved: bool,
    pub(crate) children: Vec<NodeKey>,
    pub(crate) parent: Option<NodeKey>,
}

impl Node {
    /// Unresolved directory placeholder used for the tree root.
    pub(crate) fn root(key: NodeKey, path: RemotePath) -> Self {
        let name = path.name().to_string();
        Self {
            key,
            path,
            name,
            kind: NodeKind::Directory,
            size: None,
            modified: None,
            etag: None,
            children_resolved: false,
            children: Vec::new(),
            parent: None,
        }
    }

    pub(crate) fn from_entry(
        key: NodeKey,
        parent: NodeKey,
        parent_path: &RemotePath,
        entry: &RemoteEntry,
    ) -> Self {
        Self {
            key,
            path: parent_path.join(&entry.name),
            name: entry.name.clone(),
            kind: entry.kind(),
            size: entry.size,
            modified: entry.modified,
            etag: entry.etag.clone(),
            children_resolved: false,
            children: Vec::new(),
            parent: Some(parent),
        }
    }

    /// Copy the mutable attributes of a fresh listing row onto this node.
    /// Returns whether anything changed.
    pub(crate) fn apply_entry(&mut self, entry: &RemoteEntry) -> bool {
        let changed =
            self.size != entry.size || self.modified != entry.modified || self.etag != entry.etag;
        self.size = entry.size;
        self.modified = entry.modified;
        self.etag = entry.etag.clone();
        changed
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn path(&self) -> &RemotePath {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn children_resolved(&self) -> bool {
        self.children_resolved
    }

    /// Child keys in listing order. Only meaningful once `children_resolved`.
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }
}
