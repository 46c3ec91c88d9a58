//! Authorizer: the single caller-facing `authorize_and_run(action)` surface.
//!
//! Every dialog that needs a card-scan authorization reduces to:
//!
//! ```no_run
//! # use cardauth_client::application::authorizer::Authorizer;
//! # async fn example(authorizer: &Authorizer) {
//! let result = authorizer
//!     .authorize_and_run(|member_id| async move {
//!         // convert / destroy / update using `member_id`
//!         Ok(())
//!     })
//!     .await;
//! match result {
//!     Ok(member) => println!("done by {}", member.member_name),
//!     Err(e) => println!("{}", e.user_message()),
//! }
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use cardauth_core::{AuthorizeError, MemberId, VerifiedMember};
use tracing::warn;

use super::action_invoker::ActionInvoker;
use super::session_controller::{ControllerError, SessionController};

/// Pairs a [`SessionController`] with an [`ActionInvoker`].
pub struct Authorizer {
    controller: Arc<SessionController>,
    invoker: ActionInvoker,
}

impl Authorizer {
    pub fn new(controller: Arc<SessionController>, invoker: ActionInvoker) -> Self {
        Self {
            controller,
            invoker,
        }
    }

    /// The controller, for `cancel()`, state subscription, and the countdown.
    pub fn controller(&self) -> &Arc<SessionController> {
        &self.controller
    }

    /// Cancels the in-flight authorization, if any.
    pub fn cancel(&self) {
        self.controller.cancel();
    }

    /// Scans, verifies, then runs `action` with the verified member id.
    ///
    /// # Errors
    ///
    /// Returns the discriminated [`AuthorizeError`].  `AuthorizeError::Action`
    /// means authorization succeeded and only the action failed; use
    /// [`retry_action`](Self::retry_action) with the member it carries.
    pub async fn authorize_and_run<F, Fut>(&self, action: F) -> Result<VerifiedMember, AuthorizeError>
    where
        F: FnOnce(MemberId) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let outcome = match self.controller.start().await {
            Ok(outcome) => outcome,
            Err(ControllerError::AlreadyActive) => return Err(AuthorizeError::AlreadyActive),
            Err(e) => {
                warn!(error = %e, "authorization abandoned without an outcome");
                return Err(AuthorizeError::Cancelled);
            }
        };

        let member = outcome.into_result()?;
        self.invoker
            .invoke(&member, action)
            .await
            .map_err(AuthorizeError::Action)?;
        Ok(member)
    }

    /// Re-runs a business action for an already verified member.
    ///
    /// # Errors
    ///
    /// Returns `AuthorizeError::Action` if the action fails again.
    pub async fn retry_action<F, Fut>(&self, member: &VerifiedMember, action: F) -> Result<(), AuthorizeError>
    where
        F: FnOnce(MemberId) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.invoker
            .invoke(member, action)
            .await
            .map_err(AuthorizeError::Action)
    }
}
