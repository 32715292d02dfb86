//! Configuration folder watching: change events, debouncing, and the reload loop.

mod debouncer;
mod events;
mod runtime;
mod source;

pub use debouncer::{ChangeDebouncer, CoalescePolicy, DebounceState, DEFAULT_QUIET_WINDOW};
pub use events::{
    convert_event, ChangeEvent, ChangeKind, ConfigFolderFilter, Relevance, WatchConfig,
};
pub use runtime::ConfigWatcher;
pub use source::NotifyEventSource;
