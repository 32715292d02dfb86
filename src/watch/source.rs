//! Filesystem change source backed by `notify`.

use super::events::{convert_event, ChangeEvent};
use crate::error::WatchError;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use notify::{RecursiveMode, Watcher};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{error, info};

/// Stream of change events below a workspace root.
///
/// The underlying watcher lives as long as the stream; dropping the stream
/// stops watching.
pub struct NotifyEventSource {
    _watcher: Box<dyn Watcher + Send>,
    receiver: mpsc::UnboundedReceiver<Result<ChangeEvent, WatchError>>,
}

impl NotifyEventSource {
    /// Watch `root` recursively. The configuration folder may not exist yet,
    /// so the whole workspace is observed and filtering happens downstream.
    pub fn watch(root: &Path) -> Result<Self, WatchError> {
        let (tx, receiver) = mpsc::unbounded();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let items: Vec<Result<ChangeEvent, WatchError>> = match res {
                Ok(event) => convert_event(event).into_iter().map(Ok).collect(),
                Err(e) => vec![Err(WatchError::from(e))],
            };
            for item in items {
                if tx.unbounded_send(item).is_err() {
                    error!("Configuration event receiver dropped");
                    return;
                }
            }
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        info!(root = %root.display(), "Watching workspace for configuration changes");

        Ok(Self {
            _watcher: Box::new(watcher),
            receiver,
        })
    }
}

impl Stream for NotifyEventSource {
    type Item = Result<ChangeEvent, WatchError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}
