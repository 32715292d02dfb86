//! Path-keyed view state that survives merges.

use super::TreeModel;
use crate::error::TreeError;
use crate::types::RemotePath;
use std::collections::BTreeSet;

/// An in-progress rename or new-entry edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    pub path: RemotePath,
    pub draft_name: String,
}

/// Expansion, selection, focus and pending edit of a tree view.
///
/// Everything is keyed by path rather than by node, so entries stay attached
/// across merges as long as the path still exists.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    expanded: BTreeSet<RemotePath>,
    selection: Vec<RemotePath>,
    focus: Option<RemotePath>,
    pending_edit: Option<PendingEdit>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expand(&mut self, path: RemotePath) {
        self.expanded.insert(path);
    }

    pub fn collapse(&mut self, path: &RemotePath) {
        self.expanded.remove(path);
    }

    pub fn is_expanded(&self, path: &RemotePath) -> bool {
        self.expanded.contains(path)
    }

    pub fn expanded(&self) -> impl Iterator<Item = &RemotePath> {
        self.expanded.iter()
    }

    pub fn set_selection(&mut self, paths: Vec<RemotePath>) {
        self.selection = paths;
    }

    pub fn selection(&self) -> &[RemotePath] {
        &self.selection
    }

    pub fn set_focus(&mut self, path: Option<RemotePath>) {
        self.focus = path;
    }

    pub fn focus(&self) -> Option<&RemotePath> {
        self.focus.as_ref()
    }

    pub fn begin_edit(&mut self, path: RemotePath, draft_name: impl Into<String>) {
        self.pending_edit = Some(PendingEdit {
            path,
            draft_name: draft_name.into(),
        });
    }

    pub fn pending_edit(&self) -> Option<&PendingEdit> {
        self.pending_edit.as_ref()
    }

    pub fn take_edit(&mut self) -> Option<PendingEdit> {
        self.pending_edit.take()
    }

    /// Forget every path the tree no longer contains. Paths below an
    /// unresolved directory are kept: they may still exist remotely.
    /// Returns how many entries were dropped.
    pub fn prune(&mut self, tree: &TreeModel) -> usize {
        let gone =
            |path: &RemotePath| matches!(tree.find_by_path(path), Err(TreeError::NotFound(_)));
        let mut dropped = 0;

        let before = self.expanded.len();
        self.expanded.retain(|path| !gone(path));
        dropped += before - self.expanded.len();

        let before = self.selection.len();
        self.selection.retain(|path| !gone(path));
        dropped += before - self.selection.len();

        if self.focus.as_ref().is_some_and(|path| gone(path)) {
            self.focus = None;
            dropped += 1;
        }
        if self.pending_edit.as_ref().is_some_and(|edit| gone(&edit.path)) {
            self.pending_edit = None;
            dropped += 1;
        }
        dropped
    }
}
