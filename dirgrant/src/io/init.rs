//! State directory layout and `dirgrant init` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use crate::io::config::{AppConfig, write_config};

/// Default state directory, relative to the working directory.
pub const DEFAULT_STATE_DIR: &str = ".dirgrant";

/// All canonical paths within the state directory.
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub state_dir: PathBuf,
    pub config_path: PathBuf,
    pub prefs_dir: PathBuf,
    pub grants_path: PathBuf,
}

impl StatePaths {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            config_path: state_dir.join("config.toml"),
            prefs_dir: state_dir.join("prefs"),
            grants_path: state_dir.join("grants.json"),
            state_dir,
        }
    }
}

/// Options for `init_state`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing config with defaults.
    pub force: bool,
}

/// Create the state directory and a default `config.toml`.
///
/// Saved preferences and grants are never touched, even with `force`.
pub fn init_state(state_dir: &Path, options: &InitOptions) -> Result<StatePaths> {
    let paths = StatePaths::new(state_dir);
    if paths.state_dir.exists() && !paths.state_dir.is_dir() {
        return Err(anyhow!(
            "init: {} exists but is not a directory",
            paths.state_dir.display()
        ));
    }
    if paths.config_path.exists() && !options.force {
        return Err(anyhow!(
            "init: {} already exists (use --force to overwrite)",
            paths.config_path.display()
        ));
    }

    fs::create_dir_all(&paths.prefs_dir)
        .with_context(|| format!("create directory {}", paths.prefs_dir.display()))?;
    write_config(&paths.config_path, &AppConfig::default())?;

    info!(state_dir = %paths.state_dir.display(), "state directory initialized");
    Ok(paths)
}
