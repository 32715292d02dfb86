//! Error types for the tree model, configuration store, and watch runtime.

use crate::types::RemotePath;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a remote resolver.
///
/// Resolvers must fail rather than hand back a partial listing, so an empty
/// `Ok` always means an empty directory.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a tree operation that did not produce nodes.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Failed to resolve {path}: {source}")]
    ResolutionFailed {
        path: RemotePath,
        #[source]
        source: ResolveError,
    },

    #[error("Path not in tree: {0}")]
    NotFound(RemotePath),

    #[error("Path {path} is below unresolved directory {ancestor}")]
    UnresolvedAncestor {
        path: RemotePath,
        ancestor: RemotePath,
    },

    #[error("Resolution of {0} was superseded by a newer request")]
    Superseded(RemotePath),

    #[error("Node {0} was removed before its listing arrived")]
    NodeRemoved(RemotePath),

    #[error("Not a directory: {0}")]
    NotADirectory(RemotePath),

    #[error("Node key does not refer to a node in the current tree")]
    StaleKey,
}

impl TreeError {
    /// Whether the failure came from the resolver (and may succeed on retry).
    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, TreeError::ResolutionFailed { .. })
    }
}

/// Configuration fragment and settings errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Configuration file {0} does not contain a JSON object")]
    NotAnObject(PathBuf),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Settings error: {0}")]
    Settings(#[from] ::config::ConfigError),
}

impl ConfigError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ConfigError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Filesystem change source errors
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Watch channel closed")]
    ChannelClosed,
}

/// Top-level error surfaced to the binary and to setup code.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}
