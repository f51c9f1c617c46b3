//! Directory-access manager: acquire, persist, validate, re-acquire.
//!
//! The manager owns the lifecycle of a single persisted directory handle. It
//! mediates between user intent ([`DirectoryPicker`]), the grant registry
//! ([`PermissionRegistry`]) and local persistence ([`PreferenceStore`]), all
//! injected at construction.
//!
//! Only one picker prompt may be pending at a time. A second
//! [`request_directory`](DirectoryAccessManager::request_directory) issued while
//! the first is unresolved fails with [`AccessError::RequestInFlight`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, anyhow};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::lifecycle::{AccessEvent, transition};
use crate::core::types::{
    AccessState, DirectoryHandle, EnsureOutcome, Operability, OperabilitySet, PickOutcome,
    ValidationReport,
};
use crate::io::config::AppConfig;
use crate::io::picker::DirectoryPicker;
use crate::io::prefs::PreferenceStore;
use crate::io::registry::{GrantError, PermissionRegistry};

/// Errors callers may want to branch on.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    #[error("a directory request is already in flight")]
    RequestInFlight,
}

/// Which preference slot holds the handle and which operabilities matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSettings {
    pub tree_uri_key: String,
    pub operations: OperabilitySet,
}

impl From<&AppConfig> for AccessSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            tree_uri_key: cfg.tree_uri_key.clone(),
            operations: cfg.operations,
        }
    }
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

pub struct DirectoryAccessManager<S, R, P> {
    store: S,
    registry: R,
    picker: P,
    settings: AccessSettings,
    state: Mutex<AccessState>,
}

impl<S, R, P> DirectoryAccessManager<S, R, P>
where
    S: PreferenceStore,
    R: PermissionRegistry,
    P: DirectoryPicker,
{
    pub fn new(store: S, registry: R, picker: P, settings: AccessSettings) -> Self {
        Self {
            store,
            registry,
            picker,
            settings,
            state: Mutex::new(AccessState::Unset),
        }
    }

    pub fn state(&self) -> AccessState {
        *lock(&self.state)
    }

    pub fn settings(&self) -> &AccessSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn picker(&self) -> &P {
        &self.picker
    }

    /// Prompt for a directory and, on success, persist both grant and handle.
    ///
    /// A granted handle is made durable with the registry for the configured
    /// operabilities and then committed to the preference slot, replacing any
    /// previous handle. The previous grant is left in place. A cancelled
    /// prompt changes nothing.
    #[instrument(skip_all)]
    pub async fn request_directory(&self) -> Result<PickOutcome> {
        let mut request = self.begin_request()?;
        let outcome = self.picker.pick().await.context("directory picker")?;

        match &outcome {
            PickOutcome::Granted(handle) => {
                self.registry
                    .take_persistable(handle, self.settings.operations)
                    .with_context(|| format!("persist grant for {handle}"))?;
                self.store
                    .put_string(&self.settings.tree_uri_key, handle.identifier())
                    .with_context(|| format!("save {handle}"))?;
                request.finish(AccessEvent::Selected)?;
                info!(handle = %handle, "directory selected");
            }
            PickOutcome::Cancelled => {
                request.finish(AccessEvent::Cancelled)?;
                debug!("directory selection cancelled");
            }
        }
        Ok(outcome)
    }

    /// The persisted handle, or `None` when nothing has been selected.
    pub fn saved_directory(&self) -> Result<Option<DirectoryHandle>> {
        let raw = self.store.get_string(&self.settings.tree_uri_key, "")?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(DirectoryHandle::parse(raw)?))
    }

    /// Check whether the registry still honors each operability for `handle`.
    ///
    /// A denial marks that operability lost. Operabilities not configured are
    /// not checked and report as granted. Other registry failures are errors.
    pub fn validate(&self, handle: &DirectoryHandle) -> Result<ValidationReport> {
        let mut report = ValidationReport::granted();
        for op in self.settings.operations.iter() {
            report.set(op, self.check(handle, op)?);
        }

        let mut state = lock(&self.state);
        match transition(*state, AccessEvent::Validated(report)) {
            Ok(next) => *state = next,
            Err(reason) => debug!(%reason, "validation left state unchanged"),
        }
        Ok(report)
    }

    /// Return a usable handle, re-prompting once if none is saved or it lapsed.
    #[instrument(skip_all)]
    pub async fn ensure_accessible(&self) -> Result<EnsureOutcome> {
        let saved = self.saved_directory()?;
        match &saved {
            Some(handle) => {
                let report = self.validate(handle)?;
                if report.is_valid() {
                    debug!(handle = %handle, "saved directory still accessible");
                    return Ok(EnsureOutcome::Accessible(handle.clone()));
                }
                info!(
                    handle = %handle,
                    lost = ?report.lost(),
                    "access lapsed, requesting directory again"
                );
            }
            None => info!("no directory saved, requesting one"),
        }

        match self.request_directory().await? {
            PickOutcome::Granted(handle) => Ok(EnsureOutcome::Reacquired(handle)),
            PickOutcome::Cancelled => Ok(EnsureOutcome::Declined { previous: saved }),
        }
    }

    fn check(&self, handle: &DirectoryHandle, op: Operability) -> Result<bool> {
        match self.registry.enforce(handle, op) {
            Ok(()) => Ok(true),
            Err(GrantError::Denied { .. }) => {
                warn!(handle = %handle, op = %op, "permission no longer granted");
                Ok(false)
            }
            Err(GrantError::Other(err)) => {
                Err(err.context(format!("check {op} permission for {handle}")))
            }
        }
    }

    fn begin_request(&self) -> Result<PendingRequest<'_>> {
        let mut state = lock(&self.state);
        let prior = *state;
        if prior == AccessState::Requesting {
            return Err(AccessError::RequestInFlight.into());
        }
        *state =
            transition(prior, AccessEvent::RequestStarted).map_err(|reason| anyhow!(reason))?;
        Ok(PendingRequest {
            state: &self.state,
            prior,
            finished: false,
        })
    }
}

/// Marks a picker prompt as in flight.
///
/// Dropping it before `finish` (picker error, failed persist, or the request
/// future being dropped) restores the state from before the request.
struct PendingRequest<'a> {
    state: &'a Mutex<AccessState>,
    prior: AccessState,
    finished: bool,
}

impl PendingRequest<'_> {
    fn finish(&mut self, event: AccessEvent) -> Result<()> {
        let mut state = lock(self.state);
        *state = transition(*state, event).map_err(|reason| anyhow!(reason))?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *lock(self.state) = self.prior;
        }
    }
}

fn lock(state: &Mutex<AccessState>) -> MutexGuard<'_, AccessState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryPreferenceStore, ScriptedPicker, ScriptedRegistry, handle};

    fn manager(
        picks: Vec<PickOutcome>,
    ) -> DirectoryAccessManager<MemoryPreferenceStore, ScriptedRegistry, ScriptedPicker> {
        DirectoryAccessManager::new(
            MemoryPreferenceStore::default(),
            ScriptedRegistry::default(),
            ScriptedPicker::new(picks),
            AccessSettings::default(),
        )
    }

    #[tokio::test]
    async fn granted_request_takes_grant_then_saves() {
        let manager = manager(vec![PickOutcome::Granted(handle("content://tree/7"))]);

        manager.request_directory().await.expect("request");

        assert_eq!(
            manager.registry().taken(),
            vec![(handle("content://tree/7"), OperabilitySet::READ_WRITE)]
        );
        assert_eq!(
            manager.store().value("TREE_URI_KEY"),
            Some("content://tree/7".to_string())
        );
        assert_eq!(manager.state(), AccessState::Granted);
    }

    #[tokio::test]
    async fn cancelled_request_returns_to_unset() {
        let manager = manager(vec![PickOutcome::Cancelled]);
        let outcome = manager.request_directory().await.expect("request");
        assert_eq!(outcome, PickOutcome::Cancelled);
        assert_eq!(manager.state(), AccessState::Unset);
        assert!(manager.registry().taken().is_empty());
    }

    #[tokio::test]
    async fn failed_persist_restores_prior_state() {
        let manager = manager(vec![PickOutcome::Granted(handle("content://tree/7"))]);
        manager.store().fail_writes(true);

        let err = manager.request_directory().await.unwrap_err();

        assert!(format!("{err:#}").contains("save content://tree/7"));
        assert_eq!(manager.state(), AccessState::Unset);
        assert_eq!(manager.saved_directory().expect("saved"), None);
    }

    #[tokio::test]
    async fn exhausted_picker_is_an_error_and_not_stuck_requesting() {
        let manager = manager(Vec::new());
        assert!(manager.request_directory().await.is_err());
        assert_eq!(manager.state(), AccessState::Unset);
    }

    #[test]
    fn blank_slot_reads_as_none_saved() {
        let manager = manager(Vec::new());
        manager.store().insert("TREE_URI_KEY", "  ");
        assert_eq!(manager.saved_directory().expect("saved"), None);
    }

    #[test]
    fn validate_reports_each_operability() {
        let manager = manager(Vec::new());
        let h = handle("content://tree/123");
        manager.registry().deny(&h, Operability::Read);

        let report = manager.validate(&h).expect("validate");

        assert!(!report.read);
        assert!(report.write);
        assert_eq!(manager.state(), AccessState::Revoked);
    }

    #[test]
    fn validate_skips_unconfigured_operabilities() {
        let manager = DirectoryAccessManager::new(
            MemoryPreferenceStore::default(),
            ScriptedRegistry::default(),
            ScriptedPicker::new(Vec::new()),
            AccessSettings {
                tree_uri_key: "TREE_URI_KEY".to_string(),
                operations: OperabilitySet {
                    read: true,
                    write: false,
                },
            },
        );
        let h = handle("content://tree/123");
        manager.registry().deny(&h, Operability::Write);

        let report = manager.validate(&h).expect("validate");

        assert!(report.is_valid());
        assert_eq!(manager.registry().enforced(), vec![(h, Operability::Read)]);
    }

    #[test]
    fn registry_failure_is_an_error_not_a_denial() {
        let manager = manager(Vec::new());
        manager.registry().fail_enforce(true);
        let err = manager
            .validate(&handle("content://tree/123"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("check read permission"));
    }

    #[tokio::test]
    async fn ensure_declined_keeps_previous_handle() {
        let manager = manager(vec![PickOutcome::Cancelled]);
        let h = handle("content://tree/123");
        manager.store().insert("TREE_URI_KEY", h.identifier());
        manager.registry().deny(&h, Operability::Write);

        let outcome = manager.ensure_accessible().await.expect("ensure");

        assert_eq!(
            outcome,
            EnsureOutcome::Declined {
                previous: Some(h.clone())
            }
        );
        assert_eq!(outcome.handle(), None);
        assert_eq!(manager.saved_directory().expect("saved"), Some(h));
    }
}
