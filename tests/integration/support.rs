//! Test resolvers shared by the integration tests.

use async_trait::async_trait;
use ftpview::error::ResolveError;
use ftpview::remote::{ConnectionInfo, RemoteResolver};
use ftpview::tree::RemoteEntry;
use ftpview::types::RemotePath;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::{Notify, Semaphore};

/// Serves whatever listing is currently set for a path. Resolutions of the
/// gated path wait for an explicit [`GatedResolver::release`].
pub struct GatedResolver {
    listings: Mutex<HashMap<RemotePath, Vec<RemoteEntry>>>,
    gated: Option<RemotePath>,
    entered: Notify,
    gate: Semaphore,
}

impl GatedResolver {
    pub fn new() -> Self {
        Self {
            listings: Mutex::new(HashMap::new()),
            gated: None,
            entered: Notify::new(),
            gate: Semaphore::new(0),
        }
    }

    pub fn gated(path: &str) -> Self {
        Self {
            gated: Some(RemotePath::new(path)),
            ..Self::new()
        }
    }

    pub fn set(&self, path: &str, entries: Vec<RemoteEntry>) {
        self.listings.lock().insert(RemotePath::new(path), entries);
    }

    /// Wait until a resolution of the gated path has started.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let one waiting resolution of the gated path complete.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl RemoteResolver for GatedResolver {
    async fn resolve(
        &self,
        path: &RemotePath,
        _connection: &ConnectionInfo,
    ) -> Result<Vec<RemoteEntry>, ResolveError> {
        if self.gated.as_ref() == Some(path) {
            self.entered.notify_one();
            self.gate
                .acquire()
                .await
                .map_err(|e| ResolveError::Connection(e.to_string()))?
                .forget();
        }
        let listing = self.listings.lock().get(path).cloned();
        listing.ok_or_else(|| ResolveError::Protocol(format!("550 {}: no such directory", path)))
    }
}
