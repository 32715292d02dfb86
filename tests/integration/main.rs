//! Integration tests for the ftpview tree model and configuration watcher

mod config_end_to_end;
mod support;
mod tree_end_to_end;
mod watcher_filesystem;
