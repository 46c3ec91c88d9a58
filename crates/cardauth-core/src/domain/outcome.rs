//! Typed results of the handshake and of the authorize-then-act flow.
//!
//! Two layers of result exist because the remedies differ:
//!
//! - [`AuthorizationOutcome`] is what one handshake attempt ends with.  Every
//!   non-success variant means *the card must be scanned again*.
//! - [`AuthorizeError`] is what `authorize_and_run` returns.  It adds
//!   [`ActionError`] (authorization succeeded, only the business action
//!   failed, so retrying the action alone is enough) and `AlreadyActive`.

use thiserror::Error;

use super::errors::{BindingError, VerificationError};
use super::session::{SessionState, VerifiedMember};

/// Terminal result of one authorization attempt.
///
/// Exactly one outcome is delivered per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    Succeeded(VerifiedMember),
    TimedOut,
    Cancelled,
    BindingFailed(BindingError),
    VerificationFailed(VerificationError),
}

impl AuthorizationOutcome {
    /// The session state this outcome corresponds to.
    pub fn terminal_state(&self) -> SessionState {
        match self {
            AuthorizationOutcome::Succeeded(_) => SessionState::Succeeded,
            AuthorizationOutcome::TimedOut => SessionState::TimedOut,
            AuthorizationOutcome::Cancelled => SessionState::Cancelled,
            AuthorizationOutcome::BindingFailed(_)
            | AuthorizationOutcome::VerificationFailed(_) => SessionState::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AuthorizationOutcome::Succeeded(_))
    }

    /// Converts into the caller-facing result of `authorize_and_run`.
    pub fn into_result(self) -> Result<VerifiedMember, AuthorizeError> {
        match self {
            AuthorizationOutcome::Succeeded(member) => Ok(member),
            AuthorizationOutcome::TimedOut => Err(AuthorizeError::TimedOut),
            AuthorizationOutcome::Cancelled => Err(AuthorizeError::Cancelled),
            AuthorizationOutcome::BindingFailed(e) => Err(AuthorizeError::Binding(e)),
            AuthorizationOutcome::VerificationFailed(e) => Err(AuthorizeError::Verification(e)),
        }
    }
}

/// The authorized business action itself failed.
///
/// Carries the member that authorized it so the action can be retried without
/// another card scan.
#[derive(Debug, Error)]
#[error("authorized action failed for member {}: {source}", .member.member_id)]
pub struct ActionError {
    pub member: VerifiedMember,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

/// Discriminated failure of `authorize_and_run`.
#[derive(Debug, Error)]
pub enum AuthorizeError {
    /// Another authorization is still in progress on the same controller.
    #[error("an authorization is already in progress")]
    AlreadyActive,
    #[error("authorization cancelled")]
    Cancelled,
    #[error("no card was scanned before the deadline")]
    TimedOut,
    #[error(transparent)]
    Binding(BindingError),
    #[error(transparent)]
    Verification(VerificationError),
    #[error(transparent)]
    Action(ActionError),
}

impl AuthorizeError {
    /// A short message suitable for the dialog, distinct per failure kind.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthorizeError::AlreadyActive => {
                "A card scan is already in progress. Finish or cancel it first."
            }
            AuthorizeError::Cancelled => "Authorization was cancelled.",
            AuthorizeError::TimedOut => {
                "No card was scanned in time. Please try again and scan your card."
            }
            AuthorizeError::Binding(_) => {
                "The card scanner could not be reached. Please try again."
            }
            AuthorizeError::Verification(_) => {
                "The scanned card could not be verified. Please rescan a valid member card."
            }
            AuthorizeError::Action(_) => {
                "Authorization succeeded, but the action failed. You can retry the action without rescanning."
            }
        }
    }

    /// `true` when recovering requires scanning a card again.
    pub fn requires_rescan(&self) -> bool {
        matches!(
            self,
            AuthorizeError::TimedOut
                | AuthorizeError::Binding(_)
                | AuthorizeError::Verification(_)
        )
    }

    /// The verified member, when authorization succeeded and only the action
    /// failed.
    pub fn authorized_member(&self) -> Option<&VerifiedMember> {
        match self {
            AuthorizeError::Action(e) => Some(&e.member),
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
