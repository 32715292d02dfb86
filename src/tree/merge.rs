//! Fold a fresh directory listing onto the existing children of a node.
//!
//! Everything here is synchronous: a fold runs to completion against the arena
//! before the caller releases its lock, so no observer ever sees a half-merged
//! child list.

use super::node::{Node, RemoteEntry};
use crate::types::{NodeKey, RemotePath};
use slotmap::SlotMap;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Counters describing what a fold did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldStats {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub replaced: usize,
    pub removed: usize,
}

/// Drop listing rows that cannot name a child of `dir`: empty names, `.`/`..`,
/// names containing a separator, and repeated names (first occurrence wins).
pub(crate) fn sanitize_listing(dir: &RemotePath, entries: Vec<RemoteEntry>) -> Vec<RemoteEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            let name = entry.name.as_str();
            if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
                if name != "." && name != ".." {
                    warn!(dir = %dir, name = %name, "Skipping listing entry with invalid name");
                }
                return false;
            }
            if !seen.insert(name.to_string()) {
                warn!(dir = %dir, name = %name, "Skipping duplicate listing entry");
                return false;
            }
            true
        })
        .collect()
}

/// Merge `entries` onto the children of `parent` and mark it resolved.
///
/// Children whose path reappears with the same kind keep their key (and with
/// it their own children); new paths get fresh nodes; paths missing from the
/// listing are dropped with their subtree. The resulting order is the order of
/// `entries`.
pub(crate) fn fold_listing(
    nodes: &mut SlotMap<NodeKey, Node>,
    parent: NodeKey,
    entries: &[RemoteEntry],
) -> FoldStats {
    let mut stats = FoldStats::default();
    let Some(parent_node) = nodes.get(parent) else {
        return stats;
    };
    let parent_path = parent_node.path.clone();

    let mut existing: HashMap<RemotePath, NodeKey> = parent_node
        .children
        .iter()
        .filter_map(|key| nodes.get(*key).map(|child| (child.path.clone(), *key)))
        .collect();

    let mut merged = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = parent_path.join(&entry.name);
        match existing.remove(&path) {
            Some(key) if nodes[key].kind == entry.kind() => {
                if nodes[key].apply_entry(entry) {
                    stats.updated += 1;
                } else {
                    stats.unchanged += 1;
                }
                merged.push(key);
            }
            Some(stale) => {
                remove_subtree(nodes, stale);
                merged.push(insert_child(nodes, parent, &parent_path, entry));
                stats.replaced += 1;
            }
            None => {
                merged.push(insert_child(nodes, parent, &parent_path, entry));
                stats.added += 1;
            }
        }
    }

    for (_, key) in existing {
        remove_subtree(nodes, key);
        stats.removed += 1;
    }

    let parent_node = &mut nodes[parent];
    parent_node.children = merged;
    parent_node.children_resolved = true;
    stats
}

fn insert_child(
    nodes: &mut SlotMap<NodeKey, Node>,
    parent: NodeKey,
    parent_path: &RemotePath,
    entry: &RemoteEntry,
) -> NodeKey {
    nodes.insert_with_key(|key| Node::from_entry(key, parent, parent_path, entry))
}

/// Remove `key` and everything below it from the arena.
pub(crate) fn remove_subtree(nodes: &mut SlotMap<NodeKey, Node>, key: NodeKey) -> usize {
    let mut stack = vec![key];
    let mut removed = 0;
    while let Some(next) = stack.pop() {
        if let Some(node) = nodes.remove(next) {
            stack.extend(node.children);
            removed += 1;
        }
    }
    removed
}
