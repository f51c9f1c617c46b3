//! Permission registry port and its file-backed adapter.
//!
//! The registry owns grant state; the access manager only asks it to make a
//! grant durable and to confirm a grant is still honored.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::core::types::{DirectoryHandle, Operability, OperabilitySet};
use crate::io::atomic::write_atomic;

/// Failure to confirm a grant.
#[derive(Debug, Error)]
pub enum GrantError {
    /// The registry no longer honors `operability` for the handle.
    #[error("no longer have {operability} access to {identifier}")]
    Denied {
        identifier: String,
        operability: Operability,
    },
    /// The registry itself could not be consulted.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GrantError {
    pub fn denied(handle: &DirectoryHandle, operability: Operability) -> Self {
        GrantError::Denied {
            identifier: handle.identifier().to_string(),
            operability,
        }
    }
}

/// A durable grant as recorded by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub identifier: DirectoryHandle,
    pub operations: OperabilitySet,
    /// RFC 3339 timestamp of the most recent grant.
    pub granted_at: String,
}

/// Capability-granting registry consulted by the access manager.
pub trait PermissionRegistry {
    /// Make the grant for `handle` survive process restarts.
    fn take_persistable(&self, handle: &DirectoryHandle, ops: OperabilitySet) -> Result<()>;

    /// Confirm `op` is still granted for `handle`.
    fn enforce(&self, handle: &DirectoryHandle, op: Operability) -> Result<(), GrantError>;

    /// All durable grants, ordered by identifier.
    fn persisted_grants(&self) -> Result<Vec<GrantRecord>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GrantTable {
    grants: Vec<GrantRecord>,
}

/// Grant table persisted as JSON.
///
/// Besides the recorded operabilities, `file://` handles are checked against
/// the filesystem: a directory that disappeared loses both operabilities and a
/// read-only directory loses write.
#[derive(Debug, Clone)]
pub struct FsGrantRegistry {
    path: PathBuf,
}

impl FsGrantRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<GrantTable> {
        if !self.path.exists() {
            return Ok(GrantTable::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read grants {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parse grants {}", self.path.display()))
    }

    fn write(&self, table: &GrantTable) -> Result<()> {
        let mut buf = serde_json::to_string_pretty(table)?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }
}

impl PermissionRegistry for FsGrantRegistry {
    #[instrument(skip_all, fields(handle = %handle, ops = %ops))]
    fn take_persistable(&self, handle: &DirectoryHandle, ops: OperabilitySet) -> Result<()> {
        let mut table = self.load()?;
        let granted_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        match table
            .grants
            .iter_mut()
            .find(|record| record.identifier == *handle)
        {
            Some(record) => {
                record.operations = record.operations.union(ops);
                record.granted_at = granted_at;
            }
            None => table.grants.push(GrantRecord {
                identifier: handle.clone(),
                operations: ops,
                granted_at,
            }),
        }
        table
            .grants
            .sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.write(&table)?;
        info!("persistable grant taken");
        Ok(())
    }

    fn enforce(&self, handle: &DirectoryHandle, op: Operability) -> Result<(), GrantError> {
        let table = self.load()?;
        let recorded = table
            .grants
            .iter()
            .any(|record| record.identifier == *handle && record.operations.contains(op));
        if !recorded {
            debug!(handle = %handle, op = %op, "no grant recorded");
            return Err(GrantError::denied(handle, op));
        }
        if handle
            .local_path()
            .is_some_and(|dir| !local_dir_allows(&dir, op))
        {
            debug!(handle = %handle, op = %op, "directory no longer allows access");
            return Err(GrantError::denied(handle, op));
        }
        Ok(())
    }

    fn persisted_grants(&self) -> Result<Vec<GrantRecord>> {
        Ok(self.load()?.grants)
    }
}

fn local_dir_allows(dir: &Path, op: Operability) -> bool {
    let Ok(metadata) = fs::metadata(dir) else {
        return false;
    };
    if !metadata.is_dir() {
        return false;
    }
    match op {
        Operability::Read => fs::read_dir(dir).is_ok(),
        Operability::Write => !metadata.permissions().readonly(),
    }
}
