use crate::support::GatedResolver;
use ftpview::error::TreeError;
use ftpview::remote::ConnectionInfo;
use ftpview::tree::{RemoteEntry, TreeModel, ViewState};
use ftpview::types::RemotePath;
use std::sync::Arc;

fn connection() -> ConnectionInfo {
    ConnectionInfo::new("ftp.example.com").with_credentials("deploy", "secret")
}

#[tokio::test]
async fn test_expand_then_refresh_root() {
    let resolver = Arc::new(GatedResolver::new());
    resolver.set(
        "/",
        vec![RemoteEntry::file("a.txt", 10), RemoteEntry::directory("sub")],
    );
    resolver.set("/sub", vec![RemoteEntry::file("inner.txt", 1)]);
    let tree = TreeModel::new(resolver.clone(), connection());
    assert!(!tree.root().children_resolved());

    let children = tree.get_children(tree.root_key()).await.unwrap();
    assert_eq!(children.len(), 2);
    let sub = tree.find_by_path(&RemotePath::new("/sub")).unwrap();
    assert!(sub.is_directory());
    assert!(!sub.children_resolved());
    tree.get_children(sub.key()).await.unwrap();
    let a_before = tree.find_by_path(&RemotePath::new("/a.txt")).unwrap();

    resolver.set("/", vec![RemoteEntry::file("a.txt", 20)]);
    let children = tree.refresh_root().await.unwrap();

    assert_eq!(children.len(), 1);
    let a_after = tree.find_by_path(&RemotePath::new("/a.txt")).unwrap();
    assert_eq!(a_after.size(), Some(20));
    assert_eq!(a_after.key(), a_before.key());
    assert!(matches!(
        tree.find_by_path(&RemotePath::new("/sub")),
        Err(TreeError::NotFound(_))
    ));
    assert!(tree.node(sub.key()).is_none());
    // root + a.txt
    assert_eq!(tree.len(), 2);
}

#[tokio::test]
async fn test_view_state_pruned_after_refresh() {
    let resolver = Arc::new(GatedResolver::new());
    resolver.set(
        "/",
        vec![RemoteEntry::file("a.txt", 10), RemoteEntry::directory("sub")],
    );
    let tree = TreeModel::new(resolver.clone(), connection());
    tree.get_children(tree.root_key()).await.unwrap();

    let mut view = ViewState::new();
    view.expand(RemotePath::new("/sub"));
    view.set_selection(vec![RemotePath::new("/a.txt"), RemotePath::new("/sub")]);

    resolver.set("/", vec![RemoteEntry::file("a.txt", 10)]);
    tree.refresh_root().await.unwrap();

    assert_eq!(view.prune(&tree), 2);
    assert!(!view.is_expanded(&RemotePath::new("/sub")));
    assert_eq!(view.selection(), &[RemotePath::new("/a.txt")]);
}

#[tokio::test]
async fn test_listing_for_removed_node_is_discarded() {
    let resolver = Arc::new(GatedResolver::gated("/sub"));
    resolver.set("/", vec![RemoteEntry::directory("sub")]);
    resolver.set("/sub", vec![RemoteEntry::file("late.txt", 1)]);
    let tree = Arc::new(TreeModel::new(resolver.clone(), connection()));
    tree.get_children(tree.root_key()).await.unwrap();
    let sub = tree.find_by_path(&RemotePath::new("/sub")).unwrap();

    let pending = {
        let tree = Arc::clone(&tree);
        tokio::spawn(async move { tree.get_children(sub.key()).await })
    };
    resolver.wait_entered().await;

    resolver.set("/", vec![]);
    tree.refresh_root().await.unwrap();
    resolver.release();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(TreeError::NodeRemoved(_))));
    assert_eq!(tree.len(), 1);
    assert!(tree.root().children().is_empty());
}

#[tokio::test]
async fn test_overtaken_listing_is_superseded() {
    let resolver = Arc::new(GatedResolver::gated("/sub"));
    resolver.set("/", vec![RemoteEntry::directory("sub")]);
    resolver.set("/sub", vec![RemoteEntry::file("one.txt", 1)]);
    let tree = Arc::new(TreeModel::new(resolver.clone(), connection()));
    tree.get_children(tree.root_key()).await.unwrap();
    let sub_key = tree.find_by_path(&RemotePath::new("/sub")).unwrap().key();

    let first = {
        let tree = Arc::clone(&tree);
        tokio::spawn(async move { tree.get_children(sub_key).await })
    };
    resolver.wait_entered().await;
    let second = {
        let tree = Arc::clone(&tree);
        tokio::spawn(async move { tree.get_children(sub_key).await })
    };
    resolver.wait_entered().await;

    // Permits are handed out in arrival order: the older request finishes first.
    resolver.release();
    assert!(matches!(
        first.await.unwrap(),
        Err(TreeError::Superseded(_))
    ));
    assert!(!tree.node(sub_key).unwrap().children_resolved());

    resolver.release();
    let children = second.await.unwrap().unwrap();
    assert_eq!(children.len(), 1);
    assert!(tree.node(sub_key).unwrap().children_resolved());
}

#[tokio::test]
async fn test_resolve_to_reveals_nested_path() {
    let resolver = Arc::new(GatedResolver::new());
    resolver.set("/www", vec![RemoteEntry::directory("assets")]);
    resolver.set("/www/assets", vec![RemoteEntry::file("logo.png", 512)]);
    let tree = TreeModel::new(resolver.clone(), connection().with_remote_dir("/www"));

    let logo = tree
        .resolve_to(&RemotePath::new("/www/assets/logo.png"))
        .await
        .unwrap();
    assert_eq!(logo.size(), Some(512));
    assert_eq!(logo.path().as_str(), "/www/assets/logo.png");

    let missing = tree.resolve_to(&RemotePath::new("/www/assets/gone.png")).await;
    assert!(matches!(missing, Err(TreeError::NotFound(_))));
}
