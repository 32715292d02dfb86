use ftpview::config::{AppSettings, ConfigLayout, ConfigStore, FsConfigSource};
use ftpview::watch::{ConfigWatcher, NotifyEventSource, WatchConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_watcher_follows_real_folder() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::create_dir(temp.path().join(".vscode")).unwrap();
    let settings = AppSettings::load(temp.path()).unwrap();
    let root = settings.workspace_root.clone();

    let store = ConfigStore::new(ConfigLayout::from_settings(&settings), Arc::new(FsConfigSource));
    let mut watcher = ConfigWatcher::new(store, WatchConfig::from_settings(&settings));
    watcher.initialize().await;
    let mut updates = watcher.subscribe();
    let reader = watcher.reader();

    let events = NotifyEventSource::watch(&root).unwrap();
    let task = tokio::spawn(async move { watcher.run(events).await });

    std::fs::write(root.join(".vscode/ftp.json"), r#"{"x": 1}"#).unwrap();
    let seen = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if updates.changed().await.is_err() {
                return false;
            }
            if updates.borrow_and_update().lookup("x") == Some(&json!(1)) {
                return true;
            }
        }
    })
    .await;
    assert_eq!(seen.ok(), Some(true));
    assert_eq!(reader.lookup("x"), Some(json!(1)));

    std::fs::remove_dir_all(root.join(".vscode")).unwrap();
    let cleared = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if updates.changed().await.is_err() {
                return false;
            }
            if updates.borrow_and_update().is_empty() {
                return true;
            }
        }
    })
    .await;
    assert_eq!(cleared.ok(), Some(true));

    task.abort();
}
