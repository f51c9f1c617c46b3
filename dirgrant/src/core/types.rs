//! Shared deterministic types for the directory-access lifecycle.
//!
//! These types define stable contracts between the manager and its ports. They
//! do not touch the filesystem and must remain deterministic across runs.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

const FILE_SCHEME: &str = "file://";

/// Opaque identifier for a user-granted directory tree.
///
/// The identifier is URI-like. Handles for local directories use the `file://`
/// scheme followed by an absolute path; any other scheme is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryHandle(String);

impl DirectoryHandle {
    /// Wrap an identifier. Empty (or whitespace-only) identifiers are rejected.
    pub fn parse(identifier: impl Into<String>) -> Result<Self> {
        let identifier = identifier.into();
        if identifier.trim().is_empty() {
            return Err(anyhow!("directory handle must be non-empty"));
        }
        Ok(Self(identifier))
    }

    /// Build a `file://` handle for an absolute local directory path.
    ///
    /// The path must be valid UTF-8 so that [`local_path`](Self::local_path)
    /// maps back to the same directory.
    pub fn from_local_dir(path: &Path) -> Result<Self> {
        if !path.is_absolute() {
            return Err(anyhow!(
                "directory handle path must be absolute: {}",
                path.display()
            ));
        }
        let utf8 = path.to_str().with_context(|| {
            format!("directory path is not valid UTF-8: {}", path.display())
        })?;
        Self::parse(format!("{FILE_SCHEME}{utf8}"))
    }

    pub fn identifier(&self) -> &str {
        &self.0
    }

    /// Local path for `file://` handles, `None` for other schemes.
    pub fn local_path(&self) -> Option<PathBuf> {
        self.0
            .strip_prefix(FILE_SCHEME)
            .filter(|rest| !rest.is_empty())
            .map(PathBuf::from)
    }
}

impl fmt::Display for DirectoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single permission facet that can be granted, checked and revoked on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operability {
    Read,
    Write,
}

impl Operability {
    pub const ALL: [Operability; 2] = [Operability::Read, Operability::Write];

    pub fn as_str(self) -> &'static str {
        match self {
            Operability::Read => "read",
            Operability::Write => "write",
        }
    }
}

impl fmt::Display for Operability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of operabilities requested for, or held by, a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperabilitySet {
    pub read: bool,
    pub write: bool,
}

impl OperabilitySet {
    pub const NONE: OperabilitySet = OperabilitySet {
        read: false,
        write: false,
    };
    pub const READ_WRITE: OperabilitySet = OperabilitySet {
        read: true,
        write: true,
    };

    pub fn contains(&self, op: Operability) -> bool {
        match op {
            Operability::Read => self.read,
            Operability::Write => self.write,
        }
    }

    pub fn insert(&mut self, op: Operability) {
        match op {
            Operability::Read => self.read = true,
            Operability::Write => self.write = true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.read && !self.write
    }

    /// Operabilities in stable order (read before write).
    pub fn iter(&self) -> impl Iterator<Item = Operability> + use<> {
        let set = *self;
        Operability::ALL
            .into_iter()
            .filter(move |op| set.contains(*op))
    }

    /// Union of two sets.
    pub fn union(self, other: OperabilitySet) -> OperabilitySet {
        OperabilitySet {
            read: self.read || other.read,
            write: self.write || other.write,
        }
    }
}

impl Default for OperabilitySet {
    fn default() -> Self {
        Self::READ_WRITE
    }
}

impl fmt::Display for OperabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Operability::as_str).collect();
        if names.is_empty() {
            return f.write_str("none");
        }
        f.write_str(&names.join("+"))
    }
}

/// Result of a directory-selection prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    /// The user chose a directory and the picker granted access to it.
    Granted(DirectoryHandle),
    /// The user dismissed the prompt.
    Cancelled,
}

/// Per-operability outcome of validating a saved handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    pub read: bool,
    pub write: bool,
}

impl ValidationReport {
    /// A report with every checked facet still honored.
    pub fn granted() -> Self {
        Self {
            read: true,
            write: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.read && self.write
    }

    pub fn get(&self, op: Operability) -> bool {
        match op {
            Operability::Read => self.read,
            Operability::Write => self.write,
        }
    }

    pub fn set(&mut self, op: Operability, granted: bool) {
        match op {
            Operability::Read => self.read = granted,
            Operability::Write => self.write = granted,
        }
    }

    /// Operabilities the registry no longer honors, in stable order.
    pub fn lost(&self) -> Vec<Operability> {
        Operability::ALL
            .into_iter()
            .filter(|op| !self.get(*op))
            .collect()
    }
}

/// Lifecycle state of the tracked handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessState {
    /// Nothing selected, or the last prompt was cancelled.
    #[default]
    Unset,
    /// A picker prompt is in flight.
    Requesting,
    /// A handle was selected or last validated successfully.
    Granted,
    /// The saved handle lost at least one operability.
    Revoked,
}

/// Outcome of `ensure_accessible`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The saved handle is still fully honored.
    Accessible(DirectoryHandle),
    /// The saved handle was absent or lapsed and the user picked a new one.
    Reacquired(DirectoryHandle),
    /// The re-prompt was cancelled. `previous` is whatever remains persisted.
    Declined { previous: Option<DirectoryHandle> },
}

impl EnsureOutcome {
    /// The handle usable after this call, if any.
    pub fn handle(&self) -> Option<&DirectoryHandle> {
        match self {
            EnsureOutcome::Accessible(handle) | EnsureOutcome::Reacquired(handle) => Some(handle),
            EnsureOutcome::Declined { .. } => None,
        }
    }
}
