//! Namespaced key-value preference store.
//!
//! The [`PreferenceStore`] trait is the persistence port of the access manager.
//! [`FilePreferenceStore`] keeps one JSON object per namespace on disk; tests
//! use the in-memory store from `test_support`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::io::atomic::write_atomic;

/// String-valued key-value store scoped to one application namespace.
pub trait PreferenceStore {
    /// Value stored under `key`, or `default` when the key is absent.
    fn get_string(&self, key: &str, default: &str) -> Result<String>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// `Ok` means the write is committed: a subsequent `get_string` from any
    /// thread or process observes it.
    fn put_string(&self, key: &str, value: &str) -> Result<()>;
}

/// Preference namespace persisted as `<prefs_dir>/<namespace>.json`.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(prefs_dir: &Path, namespace: &str) -> Self {
        Self {
            path: prefs_dir.join(format!("{namespace}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read preferences {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parse preferences {}", self.path.display()))
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get_string(&self, key: &str, default: &str) -> Result<String> {
        let values = self.load()?;
        Ok(values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string()))
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        let mut buf = serde_json::to_string_pretty(&values)?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
            .with_context(|| format!("commit preference {key}"))?;
        debug!(path = %self.path.display(), key, "preference committed");
        Ok(())
    }
}
