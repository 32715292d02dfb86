//! Change events, relevance filtering, and watcher configuration.

use super::debouncer::{CoalescePolicy, DEFAULT_QUIET_WINDOW};
use crate::config::{AppSettings, ConfigLayout};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use std::path::PathBuf;
use std::time::Duration;

/// Watcher configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    /// Quiet window between the first relevant event and the reload
    pub debounce: Duration,
    pub coalesce: CoalescePolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_QUIET_WINDOW,
            coalesce: CoalescePolicy::default(),
        }
    }
}

impl WatchConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            debounce: Duration::from_millis(settings.debounce_ms),
            coalesce: settings.coalesce,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
}

/// One filesystem change, as delivered by a change source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn added(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Added)
    }

    pub fn updated(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Updated)
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Deleted)
    }
}

/// Translate a `notify` event into zero or more change events.
///
/// A rename becomes a deletion of the old path and an addition of the new one.
pub fn convert_event(event: Event) -> Vec<ChangeEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Added,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            return match (paths.next(), paths.next()) {
                (Some(from), Some(to)) => vec![ChangeEvent::deleted(from), ChangeEvent::added(to)],
                (Some(only), None) => vec![ChangeEvent::updated(only)],
                _ => Vec::new(),
            };
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Added,
        EventKind::Modify(_) => ChangeKind::Updated,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };
    event
        .paths
        .into_iter()
        .map(|path| ChangeEvent::new(path, kind))
        .collect()
}

/// What a change event means for the configuration store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relevance {
    /// A top-level fragment file changed.
    Fragment { relative: PathBuf, kind: ChangeKind },
    /// The configuration folder itself was created or deleted.
    Folder(ChangeKind),
    Ignored,
}

impl Relevance {
    pub fn is_relevant(&self) -> bool {
        !matches!(self, Relevance::Ignored)
    }
}

/// Decides which change events concern the configuration folder.
#[derive(Debug, Clone)]
pub struct ConfigFolderFilter {
    layout: ConfigLayout,
}

impl ConfigFolderFilter {
    pub fn new(layout: ConfigLayout) -> Self {
        Self { layout }
    }

    pub fn classify(&self, event: &ChangeEvent) -> Relevance {
        let Some(relative) = self.layout.relative(&event.path) else {
            return Relevance::Ignored;
        };
        if self.layout.is_folder(&relative) {
            match event.kind {
                ChangeKind::Updated => Relevance::Ignored,
                kind => Relevance::Folder(kind),
            }
        } else if self.layout.is_fragment(&relative) {
            Relevance::Fragment {
                relative,
                kind: event.kind,
            }
        } else {
            Relevance::Ignored
        }
    }
}
