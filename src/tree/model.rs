//! TreeModel: lazily resolved remote tree with merge-on-refresh.
//!
//! The arena lock is only ever held for synchronous work. Each resolution
//! takes a ticket under the lock, awaits the resolver without it, and then
//! re-checks under the lock that the node still exists and that its ticket is
//! still the latest one before folding the listing in.

use super::merge::{fold_listing, sanitize_listing};
use super::node::Node;
use crate::error::TreeError;
use crate::remote::{ConnectionInfo, RemoteResolver};
use crate::types::{NodeKey, RemotePath};
use parking_lot::RwLock;
use slotmap::{SecondaryMap, SlotMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct TreeState {
    nodes: SlotMap<NodeKey, Node>,
    root: NodeKey,
    /// Latest outstanding resolution ticket per node.
    tickets: SecondaryMap<NodeKey, u64>,
    next_ticket: u64,
}

impl TreeState {
    fn new(root_path: RemotePath) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert_with_key(|key| Node::root(key, root_path));
        Self {
            nodes,
            root,
            tickets: SecondaryMap::new(),
            next_ticket: 0,
        }
    }

    fn reset(&mut self, root_path: RemotePath) {
        // Clearing the same arena bumps slot versions, so keys handed out
        // before the reset can never alias nodes created after it.
        self.nodes.clear();
        self.tickets.clear();
        self.root = self.nodes.insert_with_key(|key| Node::root(key, root_path));
    }

    fn children_of(&self, key: NodeKey) -> Vec<Node> {
        self.nodes
            .get(key)
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|child| self.nodes.get(*child).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn child_named(&self, key: NodeKey, name: &str) -> Option<NodeKey> {
        self.nodes[key]
            .children
            .iter()
            .copied()
            .find(|child| self.nodes.get(*child).is_some_and(|n| n.name == name))
    }
}

/// Remote directory tree owned by one view.
///
/// Collaborators are supplied at construction; the model never looks anything
/// up by name.
pub struct TreeModel {
    resolver: Arc<dyn RemoteResolver>,
    connection: RwLock<ConnectionInfo>,
    state: RwLock<TreeState>,
}

impl TreeModel {
    /// Create a model with an unresolved root at the connection's remote directory.
    pub fn new(resolver: Arc<dyn RemoteResolver>, connection: ConnectionInfo) -> Self {
        let state = TreeState::new(connection.root_path());
        Self {
            resolver,
            connection: RwLock::new(connection),
            state: RwLock::new(state),
        }
    }

    pub fn connection(&self) -> ConnectionInfo {
        self.connection.read().clone()
    }

    /// Point the model at another site. The tree restarts from an unresolved
    /// root; in-flight results for the old tree are discarded on arrival.
    pub fn set_connection(&self, connection: ConnectionInfo) {
        let root_path = connection.root_path();
        *self.connection.write() = connection;
        self.state.write().reset(root_path.clone());
        info!(root = %root_path, "Tree reset for new connection");
    }

    pub fn root_key(&self) -> NodeKey {
        self.state.read().root
    }

    pub fn root(&self) -> Node {
        let state = self.state.read();
        state.nodes[state.root].clone()
    }

    pub fn node(&self, key: NodeKey) -> Option<Node> {
        self.state.read().nodes.get(key).cloned()
    }

    /// Number of nodes currently materialized, root included.
    pub fn len(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Children of an already-resolved node, without touching the resolver.
    pub fn resolved_children(&self, key: NodeKey) -> Option<Vec<Node>> {
        let state = self.state.read();
        let node = state.nodes.get(key)?;
        if !node.children_resolved {
            return None;
        }
        Some(state.children_of(key))
    }

    /// Children of `key`, resolving them through the resolver on first use.
    ///
    /// A failed resolution leaves the node exactly as it was, so the call can
    /// simply be repeated.
    pub async fn get_children(&self, key: NodeKey) -> Result<Vec<Node>, TreeError> {
        {
            let state = self.state.read();
            let node = state.nodes.get(key).ok_or(TreeError::StaleKey)?;
            if !node.is_directory() {
                return Err(TreeError::NotADirectory(node.path.clone()));
            }
            if node.children_resolved {
                return Ok(state.children_of(key));
            }
        }
        self.resolve_and_fold(key).await
    }

    /// Re-list the root and merge the result onto the existing root, one level deep.
    pub async fn refresh_root(&self) -> Result<Vec<Node>, TreeError> {
        let root = self.root_key();
        info!(root = %self.root().path, "Refreshing root listing");
        self.resolve_and_fold(root).await
    }

    /// Look up an already-materialized node. Never triggers resolution.
    pub fn find_by_path(&self, path: &RemotePath) -> Result<Node, TreeError> {
        let state = self.state.read();
        let root = &state.nodes[state.root];
        let segments = path
            .relative_to(&root.path)
            .ok_or_else(|| TreeError::NotFound(path.clone()))?;

        let mut current = state.root;
        for segment in segments {
            let node = &state.nodes[current];
            if !node.is_directory() {
                return Err(TreeError::NotFound(path.clone()));
            }
            if !node.children_resolved {
                return Err(TreeError::UnresolvedAncestor {
                    path: path.clone(),
                    ancestor: node.path.clone(),
                });
            }
            current = state
                .child_named(current, segment)
                .ok_or_else(|| TreeError::NotFound(path.clone()))?;
        }
        Ok(state.nodes[current].clone())
    }

    /// Resolve every unresolved ancestor of `path` in turn, then look it up.
    pub async fn resolve_to(&self, path: &RemotePath) -> Result<Node, TreeError> {
        loop {
            match self.find_by_path(path) {
                Err(TreeError::UnresolvedAncestor { ancestor, .. }) => {
                    let key = self.find_by_path(&ancestor)?.key;
                    match self.resolve_and_fold(key).await {
                        Ok(_) | Err(TreeError::Superseded(_)) => continue,
                        Err(e) => return Err(e),
                    }
                }
                other => return other,
            }
        }
    }

    async fn resolve_and_fold(&self, key: NodeKey) -> Result<Vec<Node>, TreeError> {
        let (path, ticket) = {
            let mut state = self.state.write();
            let node = state.nodes.get(key).ok_or(TreeError::StaleKey)?;
            if !node.is_directory() {
                return Err(TreeError::NotADirectory(node.path.clone()));
            }
            let path = node.path.clone();
            state.next_ticket += 1;
            let ticket = state.next_ticket;
            state.tickets.insert(key, ticket);
            (path, ticket)
        };
        let connection = self.connection();

        debug!(path = %path, ticket, "Resolving directory");
        let listing = match self.resolver.resolve(&path, &connection).await {
            Ok(listing) => listing,
            Err(source) => {
                warn!(path = %path, error = %source, "Directory resolution failed");
                return Err(TreeError::ResolutionFailed { path, source });
            }
        };
        let entries = sanitize_listing(&path, listing);

        let mut state = self.state.write();
        if !state.nodes.contains_key(key) {
            warn!(path = %path, "Discarding listing for removed node");
            return Err(TreeError::NodeRemoved(path));
        }
        if state.tickets.get(key) != Some(&ticket) {
            debug!(path = %path, ticket, "Discarding superseded listing");
            return Err(TreeError::Superseded(path));
        }
        state.tickets.remove(key);

        let stats = fold_listing(&mut state.nodes, key, &entries);
        debug!(
            path = %path,
            added = stats.added,
            updated = stats.updated,
            unchanged = stats.unchanged,
            replaced = stats.replaced,
            removed = stats.removed,
            "Folded listing"
        );
        Ok(state.children_of(key))
    }
}
