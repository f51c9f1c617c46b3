//! Test-only port doubles and state fixtures.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

use anyhow::{Result, anyhow};

use crate::core::types::{DirectoryHandle, Operability, OperabilitySet, PickOutcome};
use crate::io::config::AppConfig;
use crate::io::init::{InitOptions, StatePaths, init_state};
use crate::io::picker::DirectoryPicker;
use crate::io::prefs::{FilePreferenceStore, PreferenceStore};
use crate::io::registry::{FsGrantRegistry, GrantError, GrantRecord, PermissionRegistry};
use crate::manager::{AccessSettings, DirectoryAccessManager};

/// In-memory preference namespace.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: RefCell<BTreeMap<String, String>>,
    fail_writes: Cell<bool>,
    writes: Cell<usize>,
}

impl MemoryPreferenceStore {
    /// Seed a value without counting it as a write.
    pub fn insert(&self, key: &str, value: &str) {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    /// Make subsequent `put_string` calls fail without storing anything.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Number of committed `put_string` calls.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get_string(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.value(key).unwrap_or_else(|| default.to_string()))
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.get() {
            return Err(anyhow!("scripted commit failure"));
        }
        self.insert(key, value);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

/// Registry that grants everything except explicitly denied operabilities.
///
/// Taking a grant lifts earlier denials for the granted operabilities.
#[derive(Debug, Default)]
pub struct ScriptedRegistry {
    denied: RefCell<BTreeSet<(DirectoryHandle, Operability)>>,
    taken: RefCell<Vec<(DirectoryHandle, OperabilitySet)>>,
    enforced: RefCell<Vec<(DirectoryHandle, Operability)>>,
    fail_enforce: Cell<bool>,
}

impl ScriptedRegistry {
    /// Revoke `op` for `handle`, as the platform would after storage changes.
    pub fn deny(&self, handle: &DirectoryHandle, op: Operability) {
        self.denied.borrow_mut().insert((handle.clone(), op));
    }

    /// Make `enforce` fail with a non-denial error.
    pub fn fail_enforce(&self, fail: bool) {
        self.fail_enforce.set(fail);
    }

    /// Every `take_persistable` call, in order.
    pub fn taken(&self) -> Vec<(DirectoryHandle, OperabilitySet)> {
        self.taken.borrow().clone()
    }

    /// Every `enforce` call, in order.
    pub fn enforced(&self) -> Vec<(DirectoryHandle, Operability)> {
        self.enforced.borrow().clone()
    }
}

impl PermissionRegistry for ScriptedRegistry {
    fn take_persistable(&self, handle: &DirectoryHandle, ops: OperabilitySet) -> Result<()> {
        let mut denied = self.denied.borrow_mut();
        for op in ops.iter() {
            denied.remove(&(handle.clone(), op));
        }
        self.taken.borrow_mut().push((handle.clone(), ops));
        Ok(())
    }

    fn enforce(&self, handle: &DirectoryHandle, op: Operability) -> Result<(), GrantError> {
        self.enforced.borrow_mut().push((handle.clone(), op));
        if self.fail_enforce.get() {
            return Err(GrantError::Other(anyhow!("scripted registry failure")));
        }
        if self.denied.borrow().contains(&(handle.clone(), op)) {
            return Err(GrantError::denied(handle, op));
        }
        Ok(())
    }

    fn persisted_grants(&self) -> Result<Vec<GrantRecord>> {
        let mut merged: BTreeMap<DirectoryHandle, OperabilitySet> = BTreeMap::new();
        for (handle, ops) in self.taken.borrow().iter() {
            let entry = merged.entry(handle.clone()).or_insert(OperabilitySet::NONE);
            *entry = entry.union(*ops);
        }
        Ok(merged
            .into_iter()
            .map(|(identifier, operations)| GrantRecord {
                identifier,
                operations,
                granted_at: "1970-01-01T00:00:00Z".to_string(),
            })
            .collect())
    }
}

/// Picker that replays a queue of outcomes and counts prompts.
///
/// Prompting past the end of the queue is an error.
#[derive(Debug, Default)]
pub struct ScriptedPicker {
    outcomes: RefCell<VecDeque<PickOutcome>>,
    calls: Cell<usize>,
}

impl ScriptedPicker {
    pub fn new(outcomes: Vec<PickOutcome>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            calls: Cell::new(0),
        }
    }

    /// Number of prompts shown so far.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl DirectoryPicker for ScriptedPicker {
    async fn pick(&self) -> Result<PickOutcome> {
        self.calls.set(self.calls.get() + 1);
        self.outcomes
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted picker exhausted after {} prompts", self.calls.get()))
    }
}

/// Temporary, initialized state directory.
pub struct TestState {
    temp: tempfile::TempDir,
    pub paths: StatePaths,
}

impl TestState {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let paths = init_state(&temp.path().join(".dirgrant"), &InitOptions { force: false })?;
        Ok(Self { temp, paths })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Manager over the file-backed store and registry of this state directory.
    pub fn file_manager<P: DirectoryPicker>(
        &self,
        picker: P,
    ) -> DirectoryAccessManager<FilePreferenceStore, FsGrantRegistry, P> {
        let cfg = AppConfig::default();
        DirectoryAccessManager::new(
            FilePreferenceStore::new(&self.paths.prefs_dir, &cfg.prefs_namespace),
            FsGrantRegistry::new(self.paths.grants_path.clone()),
            picker,
            AccessSettings::from(&cfg),
        )
    }
}

/// Build a handle from a literal identifier.
pub fn handle(identifier: &str) -> DirectoryHandle {
    DirectoryHandle::parse(identifier).unwrap_or_else(|err| panic!("invalid handle: {err}"))
}
