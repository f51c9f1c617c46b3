//! Access lifecycle state machine.
//!
//! `Unset → Requesting → Granted → (externally) Revoked → Requesting → …`.
//! There is no terminal state: every loss of validity can be followed by a new
//! request.

use crate::core::types::{AccessState, ValidationReport};

/// Inputs that drive the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessEvent {
    /// A picker prompt was opened.
    RequestStarted,
    /// The user chose a directory and the grant was persisted.
    Selected,
    /// The user dismissed the prompt.
    Cancelled,
    /// The saved handle was checked against the registry.
    Validated(ValidationReport),
}

/// Apply `event` to `state`.
///
/// Returns an error describing the illegal transition when the event is not
/// accepted in the current state. Only one request may be in flight, and
/// validation cannot overlap a pending request.
pub fn transition(state: AccessState, event: AccessEvent) -> Result<AccessState, String> {
    match (state, event) {
        (AccessState::Requesting, AccessEvent::RequestStarted) => {
            Err("a directory request is already in flight".to_string())
        }
        (_, AccessEvent::RequestStarted) => Ok(AccessState::Requesting),
        (AccessState::Requesting, AccessEvent::Selected) => Ok(AccessState::Granted),
        (AccessState::Requesting, AccessEvent::Cancelled) => Ok(AccessState::Unset),
        (other, AccessEvent::Selected | AccessEvent::Cancelled) => Err(format!(
            "picker outcome received while {:?}, expected Requesting",
            other
        )),
        (AccessState::Requesting, AccessEvent::Validated(_)) => {
            Err("cannot validate while a directory request is in flight".to_string())
        }
        (_, AccessEvent::Validated(report)) => Ok(if report.is_valid() {
            AccessState::Granted
        } else {
            AccessState::Revoked
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revoked_report() -> ValidationReport {
        ValidationReport {
            read: true,
            write: false,
        }
    }

    #[test]
    fn full_cycle_returns_to_granted() {
        let mut state = AccessState::default();
        assert_eq!(state, AccessState::Unset);

        for event in [
            AccessEvent::RequestStarted,
            AccessEvent::Selected,
            AccessEvent::Validated(revoked_report()),
            AccessEvent::RequestStarted,
            AccessEvent::Selected,
        ] {
            state = transition(state, event).expect("legal transition");
        }
        assert_eq!(state, AccessState::Granted);
    }

    #[test]
    fn cancel_returns_to_unset() {
        let state = transition(AccessState::Revoked, AccessEvent::RequestStarted).expect("start");
        let state = transition(state, AccessEvent::Cancelled).expect("cancel");
        assert_eq!(state, AccessState::Unset);
    }

    #[test]
    fn second_request_is_rejected_while_requesting() {
        let err = transition(AccessState::Requesting, AccessEvent::RequestStarted)
            .expect_err("must reject");
        assert!(err.contains("already in flight"));
    }

    #[test]
    fn outcome_without_request_is_rejected() {
        assert!(transition(AccessState::Granted, AccessEvent::Selected).is_err());
        assert!(transition(AccessState::Unset, AccessEvent::Cancelled).is_err());
    }

    #[test]
    fn validation_moves_between_granted_and_revoked() {
        let state = transition(AccessState::Unset, AccessEvent::Validated(revoked_report()))
            .expect("validate");
        assert_eq!(state, AccessState::Revoked);
        let state = transition(state, AccessEvent::Validated(ValidationReport::granted()))
            .expect("validate");
        assert_eq!(state, AccessState::Granted);
    }

    #[test]
    fn validation_during_request_is_rejected() {
        assert!(
            transition(
                AccessState::Requesting,
                AccessEvent::Validated(ValidationReport::granted())
            )
            .is_err()
        );
    }
}
