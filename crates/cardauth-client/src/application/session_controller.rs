//! SessionController: drives one card-scan authorization at a time.
//!
//! The controller owns the [`AuthorizationSession`] state machine and is the
//! only component callers interact with (`start()` / `cancel()`).  It pipes
//! the attempt through `BindingClient::bind` and `BindingClient::verify` while
//! racing two other writers:
//!
//! - the [`TimeoutGuard`], which forces `TimedOut` when the deadline elapses;
//! - [`SessionController::cancel`], which forces `Cancelled`.
//!
//! # First writer wins (for beginners)
//!
//! All three writers funnel into one function, `Shared::resolve`, which runs
//! under the session mutex.  The first writer that finds the session still
//! active moves it to a terminal state and takes the attempt's `oneshot`
//! sender to deliver the outcome.  Every later writer finds a terminal state,
//! gets a [`TransitionError`] back from the session, and is discarded.  That
//! is how a slow `verify` success arriving after a timeout is prevented from
//! authorizing an action the user believes they abandoned.
//!
//! # Backend cleanup
//!
//! When an attempt ends in anything but `Succeeded` and a session token was
//! already issued, exactly one `cancel_session` call is spawned for it.  The
//! spawned task is remembered so [`SessionController::wait_for_cleanup`] (and
//! the next `start()`) can wait for the backend to be disarmed.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use cardauth_core::{
    AuthorizationOutcome, AuthorizationSession, BindingError, HardwareClaim, SessionState,
    SessionToken, TransitionError, VerificationError, VerifiedMember,
};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::binding_client::BindingClient;
use super::timeout_guard::TimeoutGuard;

/// Deadline applied to every attempt unless configured otherwise.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Error type for the session controller itself (not for the handshake).
#[derive(Debug, Error)]
pub enum ControllerError {
    /// `start()` was called while an attempt is still in flight.
    #[error("an authorization session is already active")]
    AlreadyActive,
    #[error("session state error: {0}")]
    Transition(#[from] TransitionError),
    /// The attempt ended without delivering an outcome.
    #[error("authorization outcome was dropped before delivery")]
    OutcomeDropped,
}

/// A writer racing to end the current attempt.
#[derive(Debug)]
enum Resolution {
    Verified(VerifiedMember),
    TimedOut,
    Cancelled,
    BindingFailed(BindingError),
    VerificationFailed(VerificationError),
}

struct Attempt {
    session: AuthorizationSession,
    cancel: CancellationToken,
    outcome_tx: Option<oneshot::Sender<AuthorizationOutcome>>,
    runtime: Handle,
}

#[derive(Default)]
struct Inner {
    attempt: Option<Attempt>,
    cleanups: Vec<JoinHandle<()>>,
}

struct Shared {
    client: Arc<dyn BindingClient>,
    inner: Mutex<Inner>,
    guard: TimeoutGuard,
    state_tx: watch::Sender<SessionState>,
}

/// Drives the bind → verify handshake for one attempt at a time.
///
/// Share it as `Arc<SessionController>` between the task awaiting `start()`
/// and whatever UI element calls `cancel()`.
pub struct SessionController {
    shared: Arc<Shared>,
    deadline: Duration,
}

impl SessionController {
    /// Creates a controller using the default 30-second deadline.
    pub fn new(client: Arc<dyn BindingClient>) -> Self {
        Self::with_deadline(client, DEFAULT_DEADLINE)
    }

    pub fn with_deadline(client: Arc<dyn BindingClient>, deadline: Duration) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            shared: Arc::new(Shared {
                client,
                inner: Mutex::new(Inner::default()),
                guard: TimeoutGuard::new(),
                state_tx,
            }),
            deadline,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Runs one authorization attempt to its terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::AlreadyActive`] without touching the active
    /// attempt if one is still in flight.  Handshake failures are *not*
    /// errors here; they are reported as [`AuthorizationOutcome`] variants.
    pub async fn start(&self) -> Result<AuthorizationOutcome, ControllerError> {
        let (attempt_id, cancel, outcome_rx, previous_cleanups) = {
            let mut inner = self.shared.lock();
            if let Some(active) = inner.attempt.as_ref() {
                if !active.session.state().is_terminal() {
                    return Err(ControllerError::AlreadyActive);
                }
            }

            let deadline = tokio::time::Instant::now().into_std() + self.deadline;
            let mut session = AuthorizationSession::new(deadline);
            session.begin()?;

            let attempt_id = session.attempt_id();
            let cancel = CancellationToken::new();
            let (outcome_tx, outcome_rx) = oneshot::channel();
            inner.attempt = Some(Attempt {
                session,
                cancel: cancel.clone(),
                outcome_tx: Some(outcome_tx),
                runtime: Handle::current(),
            });
            self.shared.publish(SessionState::AwaitingScan);

            let previous = std::mem::take(&mut inner.cleanups);
            (attempt_id, cancel, outcome_rx, previous)
        };

        // Armed right away so an abandoned start() still times out.
        self.shared.arm_deadline(attempt_id, self.deadline);

        // The previous attempt's backend session must be disarmed before a
        // new one is armed.  The countdown restarts afterwards so the wait
        // never shortens it.
        if !previous_cleanups.is_empty() {
            debug!(attempt = %attempt_id, pending = previous_cleanups.len(), "waiting for previous cleanup");
            for cleanup in previous_cleanups {
                let _ = cleanup.await;
            }
            self.shared.arm_deadline(attempt_id, self.deadline);
        }
        info!(attempt = %attempt_id, deadline = ?self.deadline, "authorization started; waiting for card scan");

        if !cancel.is_cancelled() {
            self.run_handshake(attempt_id, &cancel).await;
        }

        outcome_rx.await.map_err(|_| ControllerError::OutcomeDropped)
    }

    /// Requests cancellation of the active attempt.
    ///
    /// A no-op when no attempt is active, including after `Succeeded`.  The
    /// backend cancel call is spawned; use [`wait_for_cleanup`] to await it.
    ///
    /// [`wait_for_cleanup`]: Self::wait_for_cleanup
    pub fn cancel(&self) {
        // The cancellation flag is set by `resolve` together with the
        // transition, under one lock.
        let active = self
            .shared
            .lock()
            .attempt
            .as_ref()
            .filter(|attempt| attempt.session.state().is_active())
            .map(|attempt| attempt.session.attempt_id());
        match active {
            Some(attempt_id) => {
                info!(attempt = %attempt_id, "cancellation requested");
                self.shared.resolve(attempt_id, Resolution::Cancelled);
            }
            None => debug!("cancel ignored; no active authorization"),
        }
    }

    /// Waits until every spawned backend cleanup call has finished.
    pub async fn wait_for_cleanup(&self) {
        let pending = std::mem::take(&mut self.shared.lock().cleanups);
        for cleanup in pending {
            let _ = cleanup.await;
        }
    }

    /// Current state; `Idle` before the first `start()`.
    pub fn state(&self) -> SessionState {
        self.shared
            .lock()
            .attempt
            .as_ref()
            .map_or(SessionState::Idle, |attempt| attempt.session.state())
    }

    /// Whether an attempt is in flight.
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// A snapshot of the current (or most recent) session.
    pub fn session(&self) -> Option<AuthorizationSession> {
        self.shared
            .lock()
            .attempt
            .as_ref()
            .map(|attempt| attempt.session.clone())
    }

    /// Time left before the active attempt times out, for countdown display.
    pub fn remaining(&self) -> Option<Duration> {
        self.shared.guard.remaining()
    }

    /// Subscribes to state transitions so a dialog can render them.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    async fn run_handshake(&self, attempt_id: Uuid, cancel: &CancellationToken) {
        let client = Arc::clone(&self.shared.client);

        let bind = abortable(cancel, client.bind(cancel), BindingError::Aborted).await;
        let claim = match bind {
            Ok(claim) => claim,
            Err(e) if e.is_aborted() => {
                debug!(attempt = %attempt_id, "bind aborted");
                return;
            }
            Err(e) => {
                self.shared
                    .resolve(attempt_id, Resolution::BindingFailed(e));
                return;
            }
        };

        if !self.shared.record_bind(attempt_id, &claim) {
            return;
        }

        let verify = abortable(
            cancel,
            client.verify(&claim.token, &claim.hardware_display_name, cancel),
            VerificationError::Aborted,
        )
        .await;
        let resolution = match verify {
            Ok(member) => Resolution::Verified(member),
            Err(e) if e.is_aborted() => {
                debug!(attempt = %attempt_id, "verify aborted");
                return;
            }
            Err(e) => Resolution::VerificationFailed(e),
        };
        self.shared.resolve(attempt_id, resolution);
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, state: SessionState) {
        self.state_tx.send_replace(state);
    }

    /// Starts (or restarts) the deadline for `attempt_id` unless it already
    /// ended.
    fn arm_deadline(self: &Arc<Self>, attempt_id: Uuid, after: Duration) {
        let mut inner = self.lock();
        let Some(attempt) = inner
            .attempt
            .as_mut()
            .filter(|a| a.session.attempt_id() == attempt_id && a.session.state().is_active())
        else {
            return;
        };

        let now = tokio::time::Instant::now().into_std();
        attempt.session.reset_deadline(now + after);

        // Armed under the session lock so a racing cancel() always finds the
        // guard armed and disarms it.
        let weak: Weak<Shared> = Arc::downgrade(self);
        self.guard.arm(attempt.session.remaining(now), move || {
            if let Some(shared) = weak.upgrade() {
                shared.resolve(attempt_id, Resolution::TimedOut);
            }
        });
    }

    /// Applies a successful bind.  Returns `false` when the attempt already
    /// ended; the issued token is then scheduled for cleanup instead.
    fn record_bind(&self, attempt_id: Uuid, claim: &HardwareClaim) -> bool {
        let mut inner = self.lock();
        let Inner { attempt, cleanups } = &mut *inner;
        let Some(attempt) = attempt
            .as_mut()
            .filter(|a| a.session.attempt_id() == attempt_id)
        else {
            // A newer attempt replaced this one while bind was in flight.
            debug!(attempt = %attempt_id, "bind completed for a superseded attempt");
            cleanups.push(self.spawn_cleanup(&Handle::current(), attempt_id, claim.token.clone()));
            return false;
        };

        match attempt.session.bound(claim) {
            Ok(()) => {
                info!(
                    attempt = %attempt_id,
                    hardware_user = %claim.hardware_user_id,
                    hardware_name = %claim.hardware_display_name,
                    "card scan bound; verifying member"
                );
                self.publish(SessionState::Verifying);
                true
            }
            Err(e) => {
                debug!(attempt = %attempt_id, error = %e, "bind completed after the attempt ended");
                if attempt.session.adopt_late_token(claim.token.clone()) {
                    cleanups.push(self.spawn_cleanup(
                        &attempt.runtime,
                        attempt_id,
                        claim.token.clone(),
                    ));
                }
                false
            }
        }
    }

    /// The single funnel every writer goes through.  Returns `true` if this
    /// call ended the attempt.
    fn resolve(&self, attempt_id: Uuid, resolution: Resolution) -> bool {
        let mut inner = self.lock();
        let Inner { attempt, cleanups } = &mut *inner;
        let Some(attempt) = attempt
            .as_mut()
            .filter(|a| a.session.attempt_id() == attempt_id)
        else {
            debug!(attempt = %attempt_id, ?resolution, "discarding result for a superseded attempt");
            return false;
        };

        let session = &mut attempt.session;
        let applied = match resolution {
            Resolution::Verified(member) => session
                .succeed(member.clone())
                .map(|()| AuthorizationOutcome::Succeeded(member)),
            Resolution::TimedOut => session.time_out().map(|()| AuthorizationOutcome::TimedOut),
            Resolution::Cancelled => session.cancel().map(|()| AuthorizationOutcome::Cancelled),
            Resolution::BindingFailed(e) => session
                .fail()
                .map(|()| AuthorizationOutcome::BindingFailed(e)),
            Resolution::VerificationFailed(e) => session
                .fail()
                .map(|()| AuthorizationOutcome::VerificationFailed(e)),
        };
        let outcome = match applied {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(attempt = %attempt_id, error = %e, "late result discarded");
                return false;
            }
        };

        self.guard.disarm();
        let state = outcome.terminal_state();

        if !outcome.is_success() {
            attempt.cancel.cancel();
            let token_expired = matches!(
                &outcome,
                AuthorizationOutcome::VerificationFailed(e) if e.token_expired()
            );
            match attempt.session.token() {
                Some(token) if !token_expired => {
                    cleanups.push(self.spawn_cleanup(&attempt.runtime, attempt_id, token.clone()));
                }
                Some(_) => debug!(attempt = %attempt_id, "token already expired on backend; no cleanup"),
                None => {}
            }
        }

        match &outcome {
            AuthorizationOutcome::Succeeded(member) => info!(
                attempt = %attempt_id,
                member_id = %member.member_id,
                member_name = %member.member_name,
                "authorization succeeded"
            ),
            AuthorizationOutcome::BindingFailed(e) => {
                warn!(attempt = %attempt_id, error = %e, "authorization failed during bind")
            }
            AuthorizationOutcome::VerificationFailed(e) => {
                warn!(attempt = %attempt_id, error = %e, "authorization failed during verify")
            }
            other => info!(attempt = %attempt_id, state = %other.terminal_state(), "authorization ended"),
        }

        self.publish(state);
        if let Some(tx) = attempt.outcome_tx.take() {
            let _ = tx.send(outcome);
        }
        true
    }

    fn spawn_cleanup(&self, runtime: &Handle, attempt_id: Uuid, token: SessionToken) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        runtime.spawn(async move {
            // Cleanup is never cut short; the client's request timeout bounds it.
            let never = CancellationToken::new();
            match client.cancel_session(&token, &never).await {
                Ok(()) => debug!(attempt = %attempt_id, %token, "backend session cancelled"),
                Err(e) => {
                    warn!(attempt = %attempt_id, %token, error = %e, "failed to cancel backend session")
                }
            }
        })
    }
}

/// Races `call` against `cancel`.  A call that is already complete wins, so a
/// token issued by a finished bind is never lost.
async fn abortable<T, E, F>(cancel: &CancellationToken, call: F, aborted: E) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    tokio::select! {
        biased;
        result = call => result,
        _ = cancel.cancelled() => Err(aborted),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
