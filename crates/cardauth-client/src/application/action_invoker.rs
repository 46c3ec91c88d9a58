//! ActionInvoker: hands a verified member to the caller's business action.
//!
//! The business action (convert a batch, destroy stock, finalize lab results)
//! is a plain async function supplied by the caller.  The invoker:
//!
//! 1. waits a short *settle delay* so the dialog can show "Verified: Alice";
//! 2. runs the action exactly once with the verified member id;
//! 3. waits a second settle delay before reporting completion, so the success
//!    confirmation stays readable before the dialog closes.
//!
//! The delays are cosmetic.  [`SettleDelays::none`] skips them entirely and the
//! action still runs exactly once, because it is taken as `FnOnce`.
//!
//! The invoker only accepts a [`VerifiedMember`], which can only be obtained
//! from a `Succeeded` outcome, so an action cannot be run without a successful
//! authorization.

use std::future::Future;
use std::time::Duration;

use cardauth_core::{ActionError, MemberId, VerifiedMember};
use tracing::{info, warn};

/// Pauses around the business action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleDelays {
    /// Pause after verification, before the action runs.
    pub before_action: Duration,
    /// Pause after the action succeeded, before the dialog may close.
    pub after_action: Duration,
}

impl SettleDelays {
    pub const fn none() -> Self {
        Self {
            before_action: Duration::ZERO,
            after_action: Duration::ZERO,
        }
    }
}

impl Default for SettleDelays {
    /// 500 ms before the action, 2 s after it.
    fn default() -> Self {
        Self {
            before_action: Duration::from_millis(500),
            after_action: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActionInvoker {
    delays: SettleDelays,
}

impl ActionInvoker {
    pub fn new(delays: SettleDelays) -> Self {
        Self { delays }
    }

    pub fn delays(&self) -> SettleDelays {
        self.delays
    }

    /// Runs `action(member_id)` once, between the settle delays.
    ///
    /// Also the entry point for retrying a failed action without rescanning:
    /// pass the member carried by the previous [`ActionError`].
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] wrapping whatever the action returned.  The
    /// action is never retried here.
    pub async fn invoke<F, Fut>(&self, member: &VerifiedMember, action: F) -> Result<(), ActionError>
    where
        F: FnOnce(MemberId) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        settle(self.delays.before_action).await;

        info!(member_id = %member.member_id, "running authorized action");
        if let Err(e) = action(member.member_id.clone()).await {
            warn!(member_id = %member.member_id, error = %e, "authorized action failed");
            return Err(ActionError {
                member: member.clone(),
                source: e.into(),
            });
        }

        settle(self.delays.after_action).await;
        Ok(())
    }
}

async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
