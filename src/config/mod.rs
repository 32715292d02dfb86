//! Workspace configuration: fragments, consolidation, and application settings.

mod consolidated;
mod fragment;
mod layout;
mod settings;
mod source;
mod store;

pub use consolidated::{ConsolidatedConfig, ParseFailure, SiteConfig};
pub use fragment::ConfigFragment;
pub use layout::ConfigLayout;
pub use settings::{AppSettings, ENV_PREFIX, SETTINGS_FILE_NAME};
pub use source::{ConfigSource, FsConfigSource, MemoryConfigSource};
pub use store::{ConfigReader, ConfigStore, FragmentUpdate, LoadReport};
