//! Application settings: defaults, optional workspace file, then environment.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::watch::CoalescePolicy;
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings file looked up at the workspace root.
pub const SETTINGS_FILE_NAME: &str = "ftpview.toml";

/// Prefix of environment overrides, e.g. `FTPVIEW__DEBOUNCE_MS=100`.
pub const ENV_PREFIX: &str = "FTPVIEW";

fn default_config_folder() -> PathBuf {
    PathBuf::from(".vscode")
}

fn default_config_extension() -> String {
    "json".to_string()
}

fn default_ftp_file_name() -> String {
    "ftp".to_string()
}

fn default_site() -> String {
    "default".to_string()
}

fn default_debounce_ms() -> u64 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Canonical workspace root. Never read from a file or the environment.
    #[serde(skip)]
    pub workspace_root: PathBuf,

    /// Configuration folder relative to the workspace root
    #[serde(default = "default_config_folder")]
    pub config_folder: PathBuf,

    #[serde(default = "default_config_extension")]
    pub config_extension: String,

    /// Stem of the primary FTP fragment
    #[serde(default = "default_ftp_file_name")]
    pub ftp_file_name: String,

    /// Site used when no site name is given
    #[serde(default = "default_site")]
    pub default_site: String,

    /// Quiet window of the configuration watcher in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub coalesce: CoalescePolicy,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::new(),
            config_folder: default_config_folder(),
            config_extension: default_config_extension(),
            ftp_file_name: default_ftp_file_name(),
            default_site: default_site(),
            debounce_ms: default_debounce_ms(),
            coalesce: CoalescePolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppSettings {
    /// Defaults bound to `workspace_root`, without reading any source.
    pub fn for_workspace(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: super::layout::absolute_root(workspace_root.into()),
            ..Self::default()
        }
    }

    /// Load settings for a workspace.
    ///
    /// Precedence: defaults (lowest), `<workspace>/ftpview.toml`, then
    /// `FTPVIEW__*` environment variables (highest).
    pub fn load(workspace_root: &Path) -> Result<Self, ConfigError> {
        let root = dunce::canonicalize(workspace_root).map_err(|source| ConfigError::Io {
            path: workspace_root.to_path_buf(),
            source,
        })?;

        let settings = Config::builder()
            .add_source(File::from(root.join(SETTINGS_FILE_NAME)).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut loaded: AppSettings = settings.try_deserialize()?;
        loaded.workspace_root = root;
        loaded.validate()?;
        Ok(loaded)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.config_extension.is_empty() || self.config_extension.starts_with('.') {
            return Err(ConfigError::InvalidValue {
                key: "config_extension".to_string(),
                message: format!(
                    "expected an extension without a leading dot, got {:?}",
                    self.config_extension
                ),
            });
        }
        if self.config_folder.is_absolute() {
            return Err(ConfigError::InvalidValue {
                key: "config_folder".to_string(),
                message: "must be relative to the workspace root".to_string(),
            });
        }
        Ok(())
    }
}
