//! Configuration stored under `<state>/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::OperabilitySet;
use crate::io::atomic::write_atomic;

/// Default preference namespace for the saved directory.
pub const DEFAULT_PREFS_NAMESPACE: &str = "SAMPLE_PREFS_ID";
/// Default preference key holding the saved directory handle.
pub const DEFAULT_TREE_URI_KEY: &str = "TREE_URI_KEY";

/// Application configuration (TOML).
///
/// Missing fields fall back to the defaults below, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Namespace of the key-value preference store.
    pub prefs_namespace: String,

    /// Key of the single slot holding the directory handle.
    pub tree_uri_key: String,

    /// Operabilities requested when taking a grant and checked on validation.
    pub operations: OperabilitySet,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prefs_namespace: DEFAULT_PREFS_NAMESPACE.to_string(),
            tree_uri_key: DEFAULT_TREE_URI_KEY.to_string(),
            operations: OperabilitySet::READ_WRITE,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        let namespace = self.prefs_namespace.trim();
        if namespace.is_empty() {
            return Err(anyhow!("prefs_namespace must be non-empty"));
        }
        if namespace.contains(['/', '\\']) || namespace == "." || namespace == ".." {
            return Err(anyhow!(
                "prefs_namespace must not contain path separators: {}",
                self.prefs_namespace
            ));
        }
        if self.tree_uri_key.trim().is_empty() {
            return Err(anyhow!("tree_uri_key must be non-empty"));
        }
        if self.operations.is_empty() {
            return Err(anyhow!("operations must request read and/or write"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AppConfig::default()`.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        let cfg = AppConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AppConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk.
pub fn write_config(path: &Path, cfg: &AppConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.prefs_namespace, "SAMPLE_PREFS_ID");
        assert_eq!(cfg.tree_uri_key, "TREE_URI_KEY");
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = AppConfig {
            prefs_namespace: "gallery".to_string(),
            tree_uri_key: "EXPORT_DIR".to_string(),
            operations: OperabilitySet {
                read: true,
                write: false,
            },
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[operations]\nwrite = false\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.prefs_namespace, DEFAULT_PREFS_NAMESPACE);
        assert!(cfg.operations.read);
        assert!(!cfg.operations.write);
    }

    #[test]
    fn rejects_namespace_with_separator() {
        let cfg = AppConfig {
            prefs_namespace: "../escape".to_string(),
            ..AppConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("path separators"));
    }

    #[test]
    fn rejects_empty_operations() {
        let cfg = AppConfig {
            operations: OperabilitySet::NONE,
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
