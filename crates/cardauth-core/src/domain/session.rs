//! AuthorizationSession: the unit of work for one card-scan handshake attempt.
//!
//! # State machine (for beginners)
//!
//! ```text
//! Idle ──begin──► AwaitingScan ──bound──► Verifying ──succeed──► Succeeded
//!                      │                      │
//!                      ├──── time_out ────────┼──► TimedOut
//!                      ├──── cancel ──────────┼──► Cancelled
//!                      └──── fail ────────────┴──► Failed
//! ```
//!
//! The four right-hand states are *terminal*: once reached, every further
//! transition method returns [`TransitionError`] and leaves the session
//! untouched.  This is what stops a slow `verify` response from overwriting a
//! timeout or a cancellation that the user already saw.
//!
//! The verified member is stored *inside* the `Succeeded` transition, so it is
//! impossible to observe a member on a session in any other state.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use super::errors::TransitionError;

/// Opaque handle correlating the bind, verify, and cancel calls of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend identifier of a verified member.
///
/// This is the value handed to the business action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity reported by the scanning hardware during the bind step.
///
/// Not trusted until the verify step confirms it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareClaim {
    pub token: SessionToken,
    pub hardware_user_id: String,
    pub hardware_display_name: String,
}

/// Backend-verified identity produced by a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedMember {
    pub member_id: MemberId,
    pub member_name: String,
}

/// Lifecycle state of an [`AuthorizationSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No attempt has been started yet.
    Idle,
    /// The backend session is being armed; waiting for a card scan.
    AwaitingScan,
    /// A scan was bound; the claimed identity is being verified.
    Verifying,
    Succeeded,
    TimedOut,
    Cancelled,
    Failed,
}

impl SessionState {
    /// Returns `true` for states no transition may leave.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Succeeded
                | SessionState::TimedOut
                | SessionState::Cancelled
                | SessionState::Failed
        )
    }

    /// Returns `true` while the handshake is in flight.
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::AwaitingScan | SessionState::Verifying)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingScan => "awaiting_scan",
            SessionState::Verifying => "verifying",
            SessionState::Succeeded => "succeeded",
            SessionState::TimedOut => "timed_out",
            SessionState::Cancelled => "cancelled",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One authorization attempt.
///
/// Owned exclusively by the controller that created it; every mutation goes
/// through a transition method that checks the current state first.
#[derive(Debug, Clone)]
pub struct AuthorizationSession {
    attempt_id: Uuid,
    token: Option<SessionToken>,
    hardware_user_id: Option<String>,
    hardware_display_name: Option<String>,
    member: Option<VerifiedMember>,
    state: SessionState,
    deadline: Instant,
    cancellation_requested: bool,
}

impl AuthorizationSession {
    /// Creates an `Idle` session that must terminate by `deadline`.
    pub fn new(deadline: Instant) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            token: None,
            hardware_user_id: None,
            hardware_display_name: None,
            member: None,
            state: SessionState::Idle,
            deadline,
            cancellation_requested: false,
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    pub fn hardware_user_id(&self) -> Option<&str> {
        self.hardware_user_id.as_deref()
    }

    pub fn hardware_display_name(&self) -> Option<&str> {
        self.hardware_display_name.as_deref()
    }

    /// The verified member; `Some` if and only if the state is `Succeeded`.
    pub fn member(&self) -> Option<&VerifiedMember> {
        self.member.as_ref()
    }

    /// Time left before `deadline`, saturating at zero.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    /// Moves the deadline, for when the countdown starts later than the
    /// session was created.  Ignored once the session is terminal.
    pub fn reset_deadline(&mut self, deadline: Instant) {
        if !self.state.is_terminal() {
            self.deadline = deadline;
        }
    }

    pub fn cancellation_requested(&self) -> bool {
        self.cancellation_requested
    }

    /// `Idle -> AwaitingScan`.
    pub fn begin(&mut self) -> Result<(), TransitionError> {
        self.require(SessionState::Idle, SessionState::AwaitingScan)?;
        self.set_state(SessionState::AwaitingScan);
        Ok(())
    }

    /// `AwaitingScan -> Verifying`, recording the claimed hardware identity.
    pub fn bound(&mut self, claim: &HardwareClaim) -> Result<(), TransitionError> {
        self.require(SessionState::AwaitingScan, SessionState::Verifying)?;
        if self.cancellation_requested {
            return Err(TransitionError::CancellationRequested);
        }
        self.token = Some(claim.token.clone());
        self.hardware_user_id = Some(claim.hardware_user_id.clone());
        self.hardware_display_name = Some(claim.hardware_display_name.clone());
        self.set_state(SessionState::Verifying);
        Ok(())
    }

    /// `Verifying -> Succeeded`, storing the verified member.
    ///
    /// Refused once cancellation has been requested, even if the state has not
    /// yet been moved to `Cancelled`.
    pub fn succeed(&mut self, member: VerifiedMember) -> Result<(), TransitionError> {
        self.require(SessionState::Verifying, SessionState::Succeeded)?;
        if self.cancellation_requested {
            return Err(TransitionError::CancellationRequested);
        }
        self.member = Some(member);
        self.set_state(SessionState::Succeeded);
        Ok(())
    }

    /// Sets the cancellation flag without changing state.
    ///
    /// Has no effect on a terminal session.
    pub fn request_cancellation(&mut self) {
        if !self.state.is_terminal() {
            self.cancellation_requested = true;
        }
    }

    /// Any active state `-> TimedOut`.
    pub fn time_out(&mut self) -> Result<(), TransitionError> {
        self.terminate(SessionState::TimedOut)
    }

    /// Any active state `-> Cancelled`.  Also sets the cancellation flag.
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        self.request_cancellation();
        self.terminate(SessionState::Cancelled)
    }

    /// Any active state `-> Failed`.
    pub fn fail(&mut self) -> Result<(), TransitionError> {
        self.terminate(SessionState::Failed)
    }

    /// Records a token issued by a bind that completed after the session was
    /// already terminal, so cleanup can still disarm it.
    ///
    /// Returns `false` if a token is already recorded.
    pub fn adopt_late_token(&mut self, token: SessionToken) -> bool {
        if self.token.is_some() {
            return false;
        }
        self.token = Some(token);
        true
    }

    fn terminate(&mut self, to: SessionState) -> Result<(), TransitionError> {
        if !self.state.is_active() {
            return Err(TransitionError::Illegal {
                from: self.state,
                to,
            });
        }
        self.set_state(to);
        Ok(())
    }

    fn require(&self, from: SessionState, to: SessionState) -> Result<(), TransitionError> {
        if self.state != from {
            return Err(TransitionError::Illegal {
                from: self.state,
                to,
            });
        }
        Ok(())
    }

    fn set_state(&mut self, to: SessionState) {
        trace!(attempt = %self.attempt_id, from = %self.state, %to, "session transition");
        self.state = to;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session() -> AuthorizationSession {
        AuthorizationSession::new(Instant::now() + Duration::from_secs(30))
    }

    fn make_claim() -> HardwareClaim {
        HardwareClaim {
            token: SessionToken::new("t1"),
            hardware_user_id: "u1".to_string(),
            hardware_display_name: "Alice".to_string(),
        }
    }

    fn make_member() -> VerifiedMember {
        VerifiedMember {
            member_id: MemberId::new("m1"),
            member_name: "Alice".to_string(),
        }
    }

    fn verifying_session() -> AuthorizationSession {
        let mut session = make_session();
        session.begin().unwrap();
        session.bound(&make_claim()).unwrap();
        session
    }

    #[test]
    fn test_new_session_is_idle_without_token_or_member() {
        let session = make_session();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.token().is_none());
        assert!(session.member().is_none());
        assert!(!session.cancellation_requested());
    }

    #[test]
    fn test_happy_path_reaches_succeeded_with_member() {
        // Arrange
        let mut session = verifying_session();

        // Act
        session.succeed(make_member()).unwrap();

        // Assert
        assert_eq!(session.state(), SessionState::Succeeded);
        assert_eq!(session.member().unwrap().member_id.as_str(), "m1");
        assert_eq!(session.token().unwrap().as_str(), "t1");
        assert_eq!(session.hardware_display_name(), Some("Alice"));
        assert_eq!(session.hardware_user_id(), Some("u1"));
    }

    #[test]
    fn test_bound_from_idle_is_rejected() {
        let mut session = make_session();
        let err = session.bound(&make_claim()).unwrap_err();
        assert_eq!(
            err,
            TransitionError::Illegal {
                from: SessionState::Idle,
                to: SessionState::Verifying
            }
        );
        assert!(session.token().is_none());
    }

    #[test]
    fn test_succeed_is_refused_after_cancellation_requested() {
        // Arrange
        let mut session = verifying_session();
        session.request_cancellation();

        // Act
        let result = session.succeed(make_member());

        // Assert – no member may appear on a session the user tried to abort
        assert_eq!(result, Err(TransitionError::CancellationRequested));
        assert_eq!(session.state(), SessionState::Verifying);
        assert!(session.member().is_none());
    }

    #[test]
    fn test_terminal_states_reject_every_transition() {
        let terminals: [fn(&mut AuthorizationSession) -> Result<(), TransitionError>; 3] = [
            AuthorizationSession::time_out,
            AuthorizationSession::cancel,
            AuthorizationSession::fail,
        ];

        for terminate in terminals {
            let mut session = verifying_session();
            terminate(&mut session).unwrap();
            let reached = session.state();
            assert!(reached.is_terminal());

            assert!(session.succeed(make_member()).is_err());
            assert!(session.time_out().is_err());
            assert!(session.cancel().is_err());
            assert!(session.fail().is_err());
            assert_eq!(session.state(), reached, "terminal state must never change");
            assert!(session.member().is_none());
        }
    }

    #[test]
    fn test_succeeded_is_terminal() {
        let mut session = verifying_session();
        session.succeed(make_member()).unwrap();

        assert!(session.cancel().is_err());
        assert!(session.time_out().is_err());
        assert_eq!(session.state(), SessionState::Succeeded);
        assert!(
            !session.cancellation_requested(),
            "cancel after success must not flag the session"
        );
    }

    #[test]
    fn test_time_out_from_awaiting_scan_keeps_token_empty() {
        let mut session = make_session();
        session.begin().unwrap();
        session.time_out().unwrap();
        assert_eq!(session.state(), SessionState::TimedOut);
        assert!(session.token().is_none());
    }

    #[test]
    fn test_idle_session_cannot_be_cancelled() {
        let mut session = make_session();
        assert!(session.cancel().is_err());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_adopt_late_token_only_fills_an_empty_slot() {
        let mut session = make_session();
        session.begin().unwrap();
        session.cancel().unwrap();

        assert!(session.adopt_late_token(SessionToken::new("late")));
        assert!(!session.adopt_late_token(SessionToken::new("later")));
        assert_eq!(session.token().unwrap().as_str(), "late");
    }

    #[test]
    fn test_remaining_saturates_at_zero() {
        let now = Instant::now();
        let session = AuthorizationSession::new(now + Duration::from_secs(1));
        assert_eq!(session.remaining(now + Duration::from_secs(5)), Duration::ZERO);
        assert_eq!(session.remaining(now), Duration::from_secs(1));
    }

    #[test]
    fn test_reset_deadline_applies_until_terminal() {
        let now = Instant::now();
        let mut session = AuthorizationSession::new(now + Duration::from_secs(1));
        session.begin().unwrap();

        session.reset_deadline(now + Duration::from_secs(30));
        assert_eq!(session.remaining(now), Duration::from_secs(30));

        session.time_out().unwrap();
        session.reset_deadline(now + Duration::from_secs(90));
        assert_eq!(session.remaining(now), Duration::from_secs(30));
    }

    #[test]
    fn test_state_terminal_and_active_classification() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Idle.is_active());
        assert!(SessionState::AwaitingScan.is_active());
        assert!(SessionState::Verifying.is_active());
        assert!(SessionState::Failed.is_terminal());
        assert_eq!(SessionState::TimedOut.to_string(), "timed_out");
    }
}
