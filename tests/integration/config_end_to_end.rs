use ftpview::config::{AppSettings, ConfigLayout, ConfigStore, FsConfigSource};
use ftpview::watch::{ChangeEvent, ConfigWatcher, WatchConfig};
use futures::stream;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

const FTP_JSON: &str = r#"{"sites":{"default":{"remote":{"hostname":"h","port":21}}}}"#;

fn workspace_with(files: &[(&str, &str)]) -> tempfile::TempDir {
    let temp = tempfile::tempdir().unwrap();
    std::fs::create_dir(temp.path().join(".vscode")).unwrap();
    for (name, content) in files {
        std::fs::write(temp.path().join(".vscode").join(name), content).unwrap();
    }
    temp
}

fn fs_store(root: &Path) -> ConfigStore {
    let settings = AppSettings::load(root).unwrap();
    ConfigStore::new(ConfigLayout::from_settings(&settings), Arc::new(FsConfigSource))
}

#[tokio::test]
async fn test_load_lookup_then_delete() {
    let temp = workspace_with(&[("ftp.json", FTP_JSON)]);
    let store = fs_store(temp.path());
    let root = store.layout().workspace_root.clone();
    let mut watcher = ConfigWatcher::new(store, WatchConfig::default());

    let snapshot = watcher.initialize().await;
    assert_eq!(
        snapshot.lookup("sites.default.remote.hostname"),
        Some(&json!("h"))
    );
    let connection = snapshot.connection("default").unwrap().unwrap();
    assert_eq!(connection.port, 21);
    assert_eq!(connection.root_uri(), "ftp://h/");
    assert!(watcher.store().has_ftp_configuration());

    let ftp = root.join(".vscode/ftp.json");
    std::fs::remove_file(&ftp).unwrap();
    assert!(watcher.handle_event(&ChangeEvent::deleted(&ftp)));
    watcher.run(stream::empty()).await;

    assert_eq!(watcher.reader().lookup("sites.default.remote.hostname"), None);
    assert!(!watcher.store().has_ftp_configuration());
    assert_eq!(watcher.store().snapshot().revision(), 2);
}

#[tokio::test]
async fn test_malformed_file_is_reported_not_silent() {
    let temp = workspace_with(&[("ftp.json", "{ \"sites\": ")]);
    let mut store = fs_store(temp.path());

    let report = store.load_all().await;
    assert_eq!(report.failed, 1);
    let snapshot = store.consolidate();

    assert!(snapshot.connection("default").unwrap().is_none());
    assert!(snapshot.has_parse_errors());
    assert_eq!(
        snapshot.parse_errors()[0].path,
        Path::new(".vscode/ftp.json")
    );
}

#[tokio::test]
async fn test_fragments_overlay_in_path_order() {
    let temp = workspace_with(&[
        ("ftp.json", FTP_JSON),
        ("ftp-local.json", r#"{"sites.default.remote.port": 2121}"#),
        ("zz-override.json", r#"{"sites": {"default": {"remote": {"hostname": "override"}}}}"#),
        ("notes.txt", "ignored"),
    ]);
    let mut store = fs_store(temp.path());
    store.load_all().await;
    let snapshot = store.consolidate();

    // ftp-local.json sorts before ftp.json, so the explicit port in ftp.json wins.
    assert_eq!(snapshot.lookup("sites.default.remote.port"), Some(&json!(21)));
    assert_eq!(
        snapshot.lookup("sites.default.remote.hostname"),
        Some(&json!("override"))
    );
    assert_eq!(snapshot.sources().len(), 3);
}

#[tokio::test]
async fn test_relative_workspace_root_finds_fragments() {
    let temp = tempfile::tempdir_in(".").unwrap();
    std::fs::create_dir(temp.path().join(".vscode")).unwrap();
    std::fs::write(temp.path().join(".vscode/ftp.json"), FTP_JSON).unwrap();
    let relative = Path::new(".").join(temp.path().file_name().unwrap());

    let settings = AppSettings::for_workspace(&relative);
    assert!(settings.workspace_root.is_absolute());
    let mut store = ConfigStore::new(ConfigLayout::new(&relative), Arc::new(FsConfigSource));

    let report = store.load_all().await;
    assert_eq!(report.loaded, 1);
    assert_eq!(report.failed, 0);
    store.consolidate();
    assert_eq!(
        store.lookup("sites.default.remote.hostname"),
        Some(json!("h"))
    );

    let ftp = store.layout().workspace_root.join(".vscode/ftp.json");
    let mut watcher = ConfigWatcher::new(store, WatchConfig::default());
    assert!(watcher.handle_event(&ChangeEvent::updated(&ftp)));
}
