//! ftpview: lazy remote FTP tree model and debounced workspace configuration.
//!
//! The tree model materializes a remote directory hierarchy on demand and
//! merges fresh listings onto it without losing node identity. The
//! configuration side consolidates every JSON fragment in the workspace
//! configuration folder into one immutable snapshot and keeps it current as
//! files change.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod tree;
pub mod types;
pub mod watch;
