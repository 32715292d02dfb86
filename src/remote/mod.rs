//! Remote resolver seam and connection descriptor.
//!
//! The tree model never speaks a wire protocol. It is handed a
//! [`RemoteResolver`] at construction and asks it for one directory listing at
//! a time.

mod local;

pub use local::LocalDirResolver;

use crate::error::ResolveError;
use crate::tree::RemoteEntry;
use crate::types::RemotePath;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default FTP control port.
pub const DEFAULT_FTP_PORT: u16 = 21;

fn default_port() -> u16 {
    DEFAULT_FTP_PORT
}

/// Parameters needed to reach one FTP site.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub hostname: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Directory the tree is rooted at; `/` when unset.
    #[serde(default, rename = "remoteDir", skip_serializing_if = "Option::is_none")]
    pub remote_dir: Option<String>,
}

impl ConnectionInfo {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            port: DEFAULT_FTP_PORT,
            username: String::new(),
            password: String::new(),
            remote_dir: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_remote_dir(mut self, remote_dir: impl Into<String>) -> Self {
        self.remote_dir = Some(remote_dir.into());
        self
    }

    /// Path the remote tree is rooted at.
    pub fn root_path(&self) -> RemotePath {
        self.remote_dir
            .as_deref()
            .map(RemotePath::new)
            .unwrap_or_else(RemotePath::root)
    }

    /// `ftp://host[:port]/remoteDir`, with the port omitted when it is the default.
    pub fn root_uri(&self) -> String {
        let authority = if self.port == DEFAULT_FTP_PORT {
            self.hostname.clone()
        } else {
            format!("{}:{}", self.hostname, self.port)
        };
        let root = self.root_path();
        if root.is_root() {
            format!("ftp://{}/", authority)
        } else {
            format!("ftp://{}{}", authority, root)
        }
    }
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("remote_dir", &self.remote_dir)
            .finish()
    }
}

/// Lists the immediate children of a remote directory.
///
/// Implementations must return `Err` on connection or protocol failures; an
/// empty `Ok` is taken to mean "empty directory".
#[async_trait]
pub trait RemoteResolver: Send + Sync {
    async fn resolve(
        &self,
        path: &RemotePath,
        connection: &ConnectionInfo,
    ) -> Result<Vec<RemoteEntry>, ResolveError>;
}
