//! Core types shared by the tree model, the resolver seam, and the view state.

use serde::{Deserialize, Serialize};
use std::fmt;

slotmap::new_key_type! {
    /// NodeKey: generational handle of a node inside a tree arena.
    ///
    /// A key stays valid for as long as the node it names lives in the tree;
    /// once the node is dropped by a merge the key never resolves again.
    pub struct NodeKey;
}

/// RemotePath: normalized, `/`-separated absolute path on the remote side.
///
/// Normalization drops empty and `.` segments and folds `..` into its parent,
/// so two spellings of the same location compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// The remote root, `/`.
    pub fn root() -> Self {
        RemotePath("/".to_string())
    }

    pub fn new(raw: &str) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        if segments.is_empty() {
            return Self::root();
        }
        RemotePath(format!("/{}", segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Last segment, empty for the root.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    pub fn parent(&self) -> Option<RemotePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) | None => Some(Self::root()),
            Some(idx) => Some(RemotePath(self.0[..idx].to_string())),
        }
    }

    /// Append a single entry name. The name is taken verbatim; callers are
    /// expected to have rejected names containing separators.
    pub fn join(&self, name: &str) -> RemotePath {
        if self.is_root() {
            RemotePath(format!("/{}", name))
        } else {
            RemotePath(format!("{}/{}", self.0, name))
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn starts_with(&self, base: &RemotePath) -> bool {
        base.is_root()
            || self.0 == base.0
            || (self.0.starts_with(&base.0) && self.0.as_bytes().get(base.0.len()) == Some(&b'/'))
    }

    /// Segments of `self` below `base`, or `None` when `self` is not inside `base`.
    pub fn relative_to(&self, base: &RemotePath) -> Option<Vec<&str>> {
        if !self.starts_with(base) {
            return None;
        }
        Some(self.segments().skip(base.segments().count()).collect())
    }
}

impl Default for RemotePath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RemotePath {
    fn from(raw: String) -> Self {
        RemotePath::new(&raw)
    }
}

impl From<&str> for RemotePath {
    fn from(raw: &str) -> Self {
        RemotePath::new(raw)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}
