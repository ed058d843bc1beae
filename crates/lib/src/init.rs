//! Initialize the configuration directory: create ~/.ferry, default config, and auth storage.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Creates the `auth` subdirectory for session credentials.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let auth_dir = config::auth_dir(config_path);
    if !auth_dir.exists() {
        std::fs::create_dir_all(&auth_dir)
            .with_context(|| format!("creating auth directory {}", auth_dir.display()))?;
        log::info!("created auth directory at {}", auth_dir.display());
    }

    Ok(config_dir.to_path_buf())
}
