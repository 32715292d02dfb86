//! ConfigWatcher: keeps the consolidated configuration in sync with the
//! configuration folder.

use super::debouncer::ChangeDebouncer;
use super::events::{ChangeEvent, ChangeKind, ConfigFolderFilter, Relevance, WatchConfig};
use crate::config::{ConfigReader, ConfigStore, ConsolidatedConfig};
use crate::error::WatchError;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Changes recorded since the last reload started.
#[derive(Debug, Default)]
struct PendingChanges {
    dirty: BTreeMap<PathBuf, ChangeKind>,
    full_reload: bool,
    folder_deleted: bool,
}

impl PendingChanges {
    fn record(&mut self, relevance: Relevance) {
        match relevance {
            Relevance::Fragment { relative, kind } => {
                self.dirty.insert(relative, kind);
            }
            Relevance::Folder(kind) => {
                self.full_reload = true;
                if kind == ChangeKind::Deleted {
                    self.folder_deleted = true;
                }
            }
            Relevance::Ignored => {}
        }
    }

    fn take(&mut self) -> PendingChanges {
        std::mem::take(self)
    }
}

/// Orchestrates the store and the debouncer against a stream of change events.
///
/// Every reload publishes a new snapshot to subscribers. Failures while
/// reading or parsing fragments are absorbed by the store; stream errors are
/// logged and the watcher keeps going.
pub struct ConfigWatcher {
    store: ConfigStore,
    filter: ConfigFolderFilter,
    pending: PendingChanges,
    debouncer: ChangeDebouncer,
    updates: watch::Sender<Arc<ConsolidatedConfig>>,
}

impl ConfigWatcher {
    pub fn new(store: ConfigStore, config: WatchConfig) -> Self {
        let filter = ConfigFolderFilter::new(store.layout().clone());
        let (updates, _) = watch::channel(store.snapshot());
        Self {
            store,
            filter,
            pending: PendingChanges::default(),
            debouncer: ChangeDebouncer::new(config.debounce, config.coalesce),
            updates,
        }
    }

    /// Receiver notified after every published reload.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ConsolidatedConfig>> {
        self.updates.subscribe()
    }

    pub fn reader(&self) -> ConfigReader {
        self.store.reader()
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn debouncer(&self) -> &ChangeDebouncer {
        &self.debouncer
    }

    /// Section-scoped view of the current snapshot; `None` returns everything.
    pub fn get_configuration(&self, section: Option<&str>) -> Option<Value> {
        self.store.snapshot().section(section).cloned()
    }

    /// Bulk load and publish the first snapshot.
    pub async fn initialize(&mut self) -> Arc<ConsolidatedConfig> {
        self.store.load_all().await;
        publish(&mut self.store, &self.updates)
    }

    /// Drop every cached fragment and reload the folder from disk.
    pub async fn reload_configuration(&mut self) -> Arc<ConsolidatedConfig> {
        self.pending = PendingChanges::default();
        reload_store(
            &mut self.store,
            PendingChanges {
                folder_deleted: true,
                ..PendingChanges::default()
            },
        )
        .await;
        publish(&mut self.store, &self.updates)
    }

    /// Record one change event. Returns whether it was relevant.
    pub fn handle_event(&mut self, event: &ChangeEvent) -> bool {
        record_event(&self.filter, &mut self.pending, &mut self.debouncer, event)
    }

    /// Process events until the stream ends. A reload still pending at that
    /// point runs before returning.
    pub async fn run<S>(&mut self, mut events: S)
    where
        S: Stream<Item = Result<ChangeEvent, WatchError>> + Unpin,
    {
        let Self {
            store,
            filter,
            pending,
            debouncer,
            updates,
        } = self;
        let mut open = true;

        while open {
            let deadline = debouncer.deadline();
            tokio::select! {
                next = events.next() => match next {
                    Some(Ok(event)) => {
                        record_event(filter, pending, debouncer, &event);
                    }
                    Some(Err(e)) => warn!(error = %e, "Configuration watch error"),
                    None => open = false,
                },
                _ = sleep_until(deadline) => {}
            }

            let fire = if open {
                debouncer.try_fire(Instant::now())
            } else {
                debouncer.fire_now()
            };
            if !fire {
                continue;
            }

            // Keep recording events while the reload runs so that none are
            // lost; the debouncer re-arms for them once it finishes.
            {
                let reload = reload_store(store, pending.take());
                tokio::pin!(reload);
                loop {
                    tokio::select! {
                        _ = &mut reload => break,
                        next = events.next(), if open => match next {
                            Some(Ok(event)) => {
                                record_event(filter, pending, debouncer, &event);
                            }
                            Some(Err(e)) => warn!(error = %e, "Configuration watch error"),
                            None => open = false,
                        },
                    }
                }
            }
            publish(store, updates);
            debouncer.finish(Instant::now());

            if !open && debouncer.fire_now() {
                reload_store(store, pending.take()).await;
                publish(store, updates);
                debouncer.finish(Instant::now());
            }
        }
        debug!("Configuration event stream closed");
    }
}

fn record_event(
    filter: &ConfigFolderFilter,
    pending: &mut PendingChanges,
    debouncer: &mut ChangeDebouncer,
    event: &ChangeEvent,
) -> bool {
    let relevance = filter.classify(event);
    if !relevance.is_relevant() {
        return false;
    }
    debug!(path = %event.path.display(), kind = ?event.kind, "Configuration change");
    pending.record(relevance);
    debouncer.notify(Instant::now());
    true
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => futures::future::pending().await,
    }
}

/// Apply a batch of changes to the store. Fragment content is read now, so
/// the latest state on disk wins over the kind recorded in the event.
async fn reload_store(store: &mut ConfigStore, batch: PendingChanges) {
    if batch.folder_deleted {
        store.invalidate();
    }
    if batch.full_reload || batch.folder_deleted || !store.is_bulk_loaded() {
        store.load_all().await;
        return;
    }
    for relative in batch.dirty.keys() {
        store.refresh_fragment(relative).await;
    }
}

fn publish(
    store: &mut ConfigStore,
    updates: &watch::Sender<Arc<ConsolidatedConfig>>,
) -> Arc<ConsolidatedConfig> {
    let snapshot = store.consolidate();
    info!(
        revision = snapshot.revision(),
        fragments = snapshot.sources().len(),
        parse_errors = snapshot.parse_errors().len(),
        "Configuration reloaded"
    );
    updates.send_replace(Arc::clone(&snapshot));
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigLayout, ConfigSource, MemoryConfigSource};
    use crate::error::ConfigError;
    use async_trait::async_trait;
    use futures::channel::mpsc;
    use serde_json::json;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::{Notify, Semaphore};

    const FTP: &str = "/w/.vscode/ftp.json";

    /// Reads return the content present when the read started, but the
    /// first read after [`HeldSource::hold`] waits for [`HeldSource::release`].
    struct HeldSource {
        files: MemoryConfigSource,
        held: AtomicBool,
        entered: Notify,
        gate: Semaphore,
    }

    impl HeldSource {
        fn new() -> Self {
            Self {
                files: MemoryConfigSource::new(),
                held: AtomicBool::new(false),
                entered: Notify::new(),
                gate: Semaphore::new(0),
            }
        }

        fn hold(&self) {
            self.held.store(true, Ordering::SeqCst);
        }

        fn release(&self) {
            self.gate.add_permits(1);
        }
    }

    #[async_trait]
    impl ConfigSource for HeldSource {
        async fn list(&self, folder: &Path) -> Result<Vec<PathBuf>, ConfigError> {
            self.files.list(folder).await
        }

        async fn read(&self, path: &Path) -> Result<String, ConfigError> {
            let content = self.files.read(path).await;
            if self.held.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                let permit = self.gate.acquire().await.map_err(|e| ConfigError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::other(e.to_string()),
                })?;
                permit.forget();
            }
            content
        }
    }

    fn watcher(source: &Arc<MemoryConfigSource>) -> ConfigWatcher {
        let store = ConfigStore::new(ConfigLayout::new("/w"), source.clone());
        ConfigWatcher::new(store, WatchConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_events_coalesces_into_one_reload() {
        let source = Arc::new(MemoryConfigSource::new());
        source.write(FTP, r#"{"x": 0}"#);
        let mut watcher = watcher(&source);
        assert_eq!(watcher.initialize().await.revision(), 1);

        let (tx, rx) = mpsc::unbounded();
        for i in 1..=10 {
            source.write(FTP, format!(r#"{{"x": {}}}"#, i));
            tx.unbounded_send(Ok(ChangeEvent::updated(FTP))).unwrap();
        }

        let task = tokio::spawn(async move {
            watcher.run(rx).await;
            watcher
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(tx);
        let watcher = task.await.unwrap();

        let snapshot = watcher.store().snapshot();
        assert_eq!(snapshot.revision(), 2);
        assert_eq!(snapshot.lookup("x"), Some(&json!(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_separated_by_quiet_window_reload_twice() {
        let source = Arc::new(MemoryConfigSource::new());
        source.write(FTP, r#"{"x": 0}"#);
        let mut watcher = watcher(&source);
        watcher.initialize().await;
        let mut updates = watcher.subscribe();

        let (tx, rx) = mpsc::unbounded();
        let task = tokio::spawn(async move {
            watcher.run(rx).await;
            watcher
        });

        source.write(FTP, r#"{"x": 1}"#);
        tx.unbounded_send(Ok(ChangeEvent::updated(FTP))).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().lookup("x"), Some(&json!(1)));

        source.write(FTP, r#"{"x": 2}"#);
        tx.unbounded_send(Ok(ChangeEvent::updated(FTP))).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(tx);
        let watcher = task.await.unwrap();

        assert_eq!(watcher.store().snapshot().revision(), 3);
        assert_eq!(watcher.reader().lookup("x"), Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_irrelevant_events_and_errors_do_not_reload() {
        let source = Arc::new(MemoryConfigSource::new());
        let mut watcher = watcher(&source);
        watcher.initialize().await;

        let (tx, rx) = mpsc::unbounded();
        tx.unbounded_send(Ok(ChangeEvent::updated("/w/src/main.rs"))).unwrap();
        tx.unbounded_send(Ok(ChangeEvent::updated("/w/.vscode/nested/x.json")))
            .unwrap();
        tx.unbounded_send(Err(WatchError::ChannelClosed)).unwrap();
        drop(tx);

        watcher.run(rx).await;
        assert_eq!(watcher.store().snapshot().revision(), 1);
        assert!(!watcher.debouncer().is_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_reload_flushes_when_stream_ends() {
        let source = Arc::new(MemoryConfigSource::new());
        let mut watcher = watcher(&source);
        watcher.initialize().await;

        source.write("/w/.vscode/extra.json", r#"{"y": true}"#);
        let (tx, rx) = mpsc::unbounded();
        tx.unbounded_send(Ok(ChangeEvent::added("/w/.vscode/extra.json")))
            .unwrap();
        drop(tx);

        watcher.run(rx).await;
        assert_eq!(watcher.store().snapshot().revision(), 2);
        assert_eq!(watcher.get_configuration(Some("y")), Some(json!(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_folder_deletion_clears_everything() {
        let source = Arc::new(MemoryConfigSource::new());
        source.write(FTP, r#"{"sites": {"default": {"remote": {"hostname": "h"}}}}"#);
        source.write("/w/.vscode/b.json", r#"{"b": 1}"#);
        let mut watcher = watcher(&source);
        watcher.initialize().await;
        assert!(watcher.store().has_ftp_configuration());

        source.remove_folder(Path::new("/w/.vscode"));
        assert!(watcher.handle_event(&ChangeEvent::deleted("/w/.vscode")));
        assert!(!watcher.handle_event(&ChangeEvent::deleted("/w/unrelated")));

        let (tx, rx) = mpsc::unbounded::<Result<ChangeEvent, WatchError>>();
        drop(tx);
        watcher.run(rx).await;

        let snapshot = watcher.store().snapshot();
        assert!(snapshot.is_empty());
        assert!(!watcher.store().has_ftp_configuration());
    }

    #[tokio::test]
    async fn test_reload_configuration_hits_the_source() {
        let source = Arc::new(MemoryConfigSource::new());
        source.write(FTP, r#"{"x": 1}"#);
        let mut watcher = watcher(&source);
        watcher.initialize().await;

        // Written without an event; only a forced reload sees it.
        source.write("/w/.vscode/late.json", r#"{"x": 9}"#);
        assert_eq!(watcher.reader().lookup("x"), Some(json!(1)));

        let snapshot = watcher.reload_configuration().await;
        assert_eq!(snapshot.lookup("x"), Some(&json!(9)));
        assert_eq!(snapshot.revision(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_during_reload_triggers_second_reload() {
        let source = Arc::new(HeldSource::new());
        source.files.write(FTP, r#"{"x": 0}"#);
        let store = ConfigStore::new(ConfigLayout::new("/w"), source.clone());
        let mut watcher = ConfigWatcher::new(store, WatchConfig::default());
        assert_eq!(watcher.initialize().await.revision(), 1);
        let mut updates = watcher.subscribe();

        let (tx, rx) = mpsc::unbounded();
        let task = tokio::spawn(async move {
            watcher.run(rx).await;
            watcher
        });

        source.hold();
        source.files.write(FTP, r#"{"x": 1}"#);
        tx.unbounded_send(Ok(ChangeEvent::updated(FTP))).unwrap();
        source.entered.notified().await;

        // The reload is parked on its read; this change lands mid-reload.
        source.files.write(FTP, r#"{"x": 2}"#);
        tx.unbounded_send(Ok(ChangeEvent::updated(FTP))).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!updates.has_changed().unwrap());

        source.release();
        updates.changed().await.unwrap();
        {
            let first = updates.borrow_and_update();
            assert_eq!(first.revision(), 2);
            assert_eq!(first.lookup("x"), Some(&json!(1)));
        }

        updates.changed().await.unwrap();
        {
            let second = updates.borrow_and_update();
            assert_eq!(second.revision(), 3);
            assert_eq!(second.lookup("x"), Some(&json!(2)));
        }

        drop(tx);
        let watcher = task.await.unwrap();
        assert_eq!(watcher.store().snapshot().revision(), 3);
        assert!(!watcher.debouncer().is_scheduled());
    }
}
