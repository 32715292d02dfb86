//! Command-line interface: inspect the consolidated configuration, browse a
//! tree, and follow configuration changes.

use crate::config::{AppSettings, ConfigLayout, ConfigStore, ConsolidatedConfig, FsConfigSource};
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::remote::{ConnectionInfo, LocalDirResolver};
use crate::tree::{Node, TreeModel};
use crate::types::RemotePath;
use crate::watch::{ConfigWatcher, NotifyEventSource, WatchConfig};
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "ftpview")]
#[command(about = "Browse FTP sites configured in a workspace and follow configuration changes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the consolidated configuration, or one dotted key of it
    Config {
        key: Option<String>,
        /// List contributing files and parse failures instead of values
        #[arg(long)]
        sources: bool,
    },
    /// Show configured sites, or the connection of one site
    Site { name: Option<String> },
    /// List a directory tree through a local mirror of the remote site
    Tree {
        /// Remote path to list (defaults to the site root)
        path: Option<String>,
        /// Local directory standing in for the remote root
        #[arg(long)]
        mirror: PathBuf,
        /// Site whose connection is used (defaults to the configured default site)
        #[arg(long)]
        site: Option<String>,
        /// Levels to expand below the listed directory
        #[arg(long, default_value = "1")]
        depth: usize,
    },
    /// Follow configuration changes until interrupted
    Watch {
        /// Quiet window in milliseconds (overrides settings)
        #[arg(long)]
        debounce_ms: Option<u64>,
    },
}

impl Cli {
    /// Logging configuration with command-line overrides applied.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

/// Settings and collaborators shared by every command.
pub struct CliContext {
    settings: AppSettings,
}

impl CliContext {
    pub fn new(workspace_root: &std::path::Path) -> Result<Self, ApiError> {
        let settings = AppSettings::load(workspace_root)?;
        Ok(Self { settings })
    }

    pub fn from_settings(settings: AppSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    fn layout(&self) -> ConfigLayout {
        ConfigLayout::from_settings(&self.settings)
    }

    async fn load_config(&self) -> Arc<ConsolidatedConfig> {
        let mut store = ConfigStore::new(self.layout(), Arc::new(FsConfigSource));
        store.load_all().await;
        store.consolidate()
    }

    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Config { key, sources } => {
                let snapshot = self.load_config().await;
                if *sources {
                    return Ok(format_sources(&snapshot));
                }
                match snapshot.section(key.as_deref()) {
                    Some(value) => serde_json::to_string_pretty(value).map_err(|e| {
                        ApiError::ConfigError(format!("Failed to render configuration: {}", e))
                    }),
                    None => Err(ApiError::ConfigError(format!(
                        "Key not set: {}",
                        key.as_deref().unwrap_or_default()
                    ))),
                }
            }
            Commands::Site { name } => {
                let snapshot = self.load_config().await;
                match name {
                    Some(name) => {
                        let connection = self.site_connection(&snapshot, name)?;
                        Ok(format_sites(&[(name.clone(), connection)]))
                    }
                    None => {
                        let mut rows = Vec::new();
                        for name in snapshot.site_names() {
                            let connection = self.site_connection(&snapshot, &name)?;
                            rows.push((name, connection));
                        }
                        Ok(format_sites(&rows))
                    }
                }
            }
            Commands::Tree {
                path,
                mirror,
                site,
                depth,
            } => {
                let snapshot = self.load_config().await;
                let site = site.as_deref().unwrap_or(self.settings.default_site.as_str());
                let connection = snapshot
                    .connection(site)?
                    .unwrap_or_else(|| ConnectionInfo::new("localhost"));
                let tree = TreeModel::new(Arc::new(LocalDirResolver::new(mirror)), connection);
                let start = match path {
                    Some(path) => tree.resolve_to(&RemotePath::new(path)).await?,
                    None => tree.root(),
                };
                render_tree(&tree, start, *depth).await
            }
            Commands::Watch { debounce_ms } => {
                let mut watch_config = WatchConfig::from_settings(&self.settings);
                if let Some(ms) = debounce_ms {
                    watch_config.debounce = Duration::from_millis(*ms);
                }
                self.watch(watch_config).await
            }
        }
    }

    fn site_connection(
        &self,
        snapshot: &ConsolidatedConfig,
        name: &str,
    ) -> Result<ConnectionInfo, ApiError> {
        snapshot.connection(name)?.ok_or_else(|| {
            let hint = if snapshot.has_parse_errors() {
                " (some configuration files failed to parse; see `config --sources`)"
            } else {
                ""
            };
            ApiError::ConfigError(format!("No site named {}{}", name, hint))
        })
    }

    async fn watch(&self, config: WatchConfig) -> Result<String, ApiError> {
        let events = NotifyEventSource::watch(&self.settings.workspace_root)?;
        let store = ConfigStore::new(self.layout(), Arc::new(FsConfigSource));
        let mut watcher = ConfigWatcher::new(store, config);
        let initial = watcher.initialize().await;
        println!("{}", format_revision(&initial));

        let mut updates = watcher.subscribe();
        let printer = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let snapshot = Arc::clone(&updates.borrow_and_update());
                println!("{}", format_revision(&snapshot));
            }
        });

        tokio::select! {
            _ = watcher.run(events) => {}
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        }
        let revision = watcher.store().snapshot().revision();
        drop(watcher);
        let _ = printer.await;
        Ok(format!("Stopped at revision {}", revision))
    }
}

fn format_revision(snapshot: &ConsolidatedConfig) -> String {
    let mut line = format!(
        "{} {} ({} files)",
        "revision".bold(),
        snapshot.revision(),
        snapshot.sources().len()
    );
    for failure in snapshot.parse_errors() {
        line.push_str(&format!(
            "\n  {} {}: {}",
            "parse error".red(),
            failure.path.display(),
            failure.message
        ));
    }
    line
}

fn format_sources(snapshot: &ConsolidatedConfig) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["File", "Status"]);
    for source in snapshot.sources() {
        table.add_row(vec![source.display().to_string(), "loaded".to_string()]);
    }
    for failure in snapshot.parse_errors() {
        table.add_row(vec![
            failure.path.display().to_string(),
            format!("failed: {}", failure.message),
        ]);
    }
    table.to_string()
}

fn format_sites(rows: &[(String, ConnectionInfo)]) -> String {
    if rows.is_empty() {
        return "No sites configured".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Site", "URI", "User"]);
    for (name, connection) in rows {
        table.add_row(vec![
            name.clone(),
            connection.root_uri(),
            connection.username.clone(),
        ]);
    }
    table.to_string()
}

/// Depth-first listing below `start`, expanding `depth` levels.
async fn render_tree(tree: &TreeModel, start: Node, depth: usize) -> Result<String, ApiError> {
    let mut out = String::new();
    let mut stack: Vec<(Node, usize)> = vec![(start, 0)];
    while let Some((node, level)) = stack.pop() {
        out.push_str(&format!("{}\n", format_node(&node, level)));
        if node.is_directory() && level < depth {
            let children = tree.get_children(node.key()).await?;
            stack.extend(children.into_iter().rev().map(|child| (child, level + 1)));
        }
    }
    Ok(out)
}

fn format_node(node: &Node, level: usize) -> String {
    let indent = "  ".repeat(level);
    let name = if node.path().is_root() {
        "/".to_string()
    } else {
        node.name().to_string()
    };
    if node.is_directory() {
        format!("{}{}/", indent, name.blue().bold())
    } else {
        let size = node
            .size()
            .map(|s| format!(" ({} bytes)", s))
            .unwrap_or_default();
        format!("{}{}{}", indent, name, size.dimmed())
    }
}
