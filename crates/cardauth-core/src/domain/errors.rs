//! Failures of the individual handshake steps.
//!
//! `BindingError` and `VerificationError` both carry a distinguished
//! `Aborted` variant.  An aborted call is *not* a failure of the attempt: it
//! means the controller already resolved the session (timeout or cancel) and
//! asked the in-flight call to stop.  The controller ignores `Aborted` results
//! instead of turning them into a second outcome.

use thiserror::Error;

use super::session::SessionState;

/// The backend could not arm a scanning session or reported an unusable scan.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BindingError {
    /// The call was abandoned because the attempt already ended.
    #[error("bind aborted")]
    Aborted,
    /// The bind response was missing one of token, hardware user id, or
    /// hardware name.  A partial identity is never accepted.
    #[error("scanner reported an incomplete identity (missing {field})")]
    IncompleteIdentity { field: &'static str },
    /// The backend answered with a non-success status.
    #[error("backend refused to arm a scanning session (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    /// The request never produced a response.
    #[error("bind request failed: {0}")]
    Transport(String),
    /// The response body was not the expected JSON shape.
    #[error("bind response could not be decoded: {0}")]
    Malformed(String),
}

impl BindingError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, BindingError::Aborted)
    }
}

/// The backend rejected the claimed identity, or the verify call failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    /// The call was abandoned because the attempt already ended.
    #[error("verification aborted")]
    Aborted,
    /// Unknown card, revoked member, or mismatched name.
    #[error("member verification rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    /// The backend no longer knows the session token.  The backend session is
    /// already disarmed, so no cancel call is needed.
    #[error("session token expired on the backend")]
    TokenExpired,
    #[error("verify request failed: {0}")]
    Transport(String),
    #[error("verify response could not be decoded: {0}")]
    Malformed(String),
}

impl VerificationError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, VerificationError::Aborted)
    }

    /// Whether the backend reported the token as already gone.
    pub fn token_expired(&self) -> bool {
        matches!(self, VerificationError::TokenExpired)
    }
}

/// Backend cleanup of a session token failed.
///
/// Only ever logged; the attempt is already terminal from the caller's view.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CancelSessionError {
    /// The caller's cancellation signal fired before the request finished.
    #[error("cancel request aborted")]
    Aborted,
    #[error("backend refused to cancel the session (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("cancel request failed: {0}")]
    Transport(String),
}

/// An [`AuthorizationSession`](super::session::AuthorizationSession)
/// transition was not legal from the current state.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("illegal session transition from {from} to {to}")]
    Illegal { from: SessionState, to: SessionState },
    #[error("cancellation was requested; result discarded")]
    CancellationRequested,
}
