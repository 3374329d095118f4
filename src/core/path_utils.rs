/*
 * This module provides utility functions for path manipulation: locating the
 * application's local configuration directory, deriving a stable identity for
 * a workspace root, and rendering paths relative to that root for display.
 */
use directories::ProjectDirs;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/*
 * Retrieves the application's primary local configuration directory.
 * This function determines the platform-specific path for local (non-roaming)
 * application configuration data and ensures the directory exists, creating it
 * if necessary.
 *
 * Returns `None` if the directory could not be determined or created.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Attempting to get base app config local dir for '{app_name}'");
    ProjectDirs::from("", "", app_name).and_then(|proj_dirs| {
        let config_path = proj_dirs.config_local_dir();
        if !config_path.exists() {
            if let Err(e) = fs::create_dir_all(config_path) {
                log::error!(
                    "PathUtils: Failed to create base app config directory {config_path:?}: {e}"
                );
                return None;
            }
            log::debug!("PathUtils: Created base app config directory: {config_path:?}");
        }
        Some(config_path.to_path_buf())
    })
}

/*
 * A short hex identity for a workspace root, stable across runs and platforms
 * for the same path string. It scopes persisted keys so that two workspaces
 * never read each other's selection.
 */
pub fn workspace_identity(root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(root.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    let hex = format!("{digest:x}");
    hex[..16].to_string()
}

/// `path` relative to `root` with forward slashes; the full path if it lies outside.
pub fn display_path(root: &Path, path: &Path) -> String {
    let Ok(relative) = path.strip_prefix(root) else {
        return path.to_string_lossy().into_owned();
    };
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return path.to_string_lossy().into_owned();
    }
    parts.join("/")
}
