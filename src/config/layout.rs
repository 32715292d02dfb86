//! Where configuration fragments live inside a workspace.

use super::settings::AppSettings;
use std::path::{Component, Path, PathBuf};

/// Location and naming rules of the configuration folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayout {
    /// Absolute workspace root.
    pub workspace_root: PathBuf,
    /// Folder name relative to the workspace root, e.g. `.vscode`.
    pub folder: PathBuf,
    /// Fragment extension without the dot.
    pub extension: String,
    /// Stem of the primary FTP fragment, e.g. `ftp`.
    pub ftp_file_name: String,
}

impl ConfigLayout {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: absolute_root(workspace_root.into()),
            folder: PathBuf::from(".vscode"),
            extension: "json".to_string(),
            ftp_file_name: "ftp".to_string(),
        }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            workspace_root: absolute_root(settings.workspace_root.clone()),
            folder: settings.config_folder.clone(),
            extension: settings.config_extension.clone(),
            ftp_file_name: settings.ftp_file_name.clone(),
        }
    }

    /// Absolute path of the configuration folder.
    pub fn folder_path(&self) -> PathBuf {
        self.workspace_root.join(&self.folder)
    }

    /// Workspace-relative path of the primary FTP fragment.
    pub fn ftp_fragment(&self) -> PathBuf {
        self.folder
            .join(format!("{}.{}", self.ftp_file_name, self.extension))
    }

    /// Workspace-relative form of `path`. Relative inputs are taken as
    /// already relative to the workspace, with `.` components dropped.
    pub fn relative(&self, path: &Path) -> Option<PathBuf> {
        if path.is_relative() {
            return Some(
                path.components()
                    .filter(|c| !matches!(c, Component::CurDir))
                    .collect(),
            );
        }
        path.strip_prefix(&self.workspace_root)
            .ok()
            .map(Path::to_path_buf)
    }

    /// Whether a workspace-relative path names a fragment: a file with the
    /// configuration extension directly inside the configuration folder.
    pub fn is_fragment(&self, relative: &Path) -> bool {
        relative.parent() == Some(self.folder.as_path())
            && relative
                .extension()
                .is_some_and(|ext| ext == self.extension.as_str())
    }

    /// Whether a workspace-relative path is the configuration folder itself.
    pub fn is_folder(&self, relative: &Path) -> bool {
        relative == self.folder
    }
}

/// Resolve a workspace root to an absolute path. Roots that exist are
/// canonicalized; others are joined onto the current directory.
pub(crate) fn absolute_root(root: PathBuf) -> PathBuf {
    if let Ok(canonical) = dunce::canonicalize(&root) {
        return canonical;
    }
    if root.is_absolute() {
        return root;
    }
    std::path::absolute(&root).unwrap_or(root)
}
