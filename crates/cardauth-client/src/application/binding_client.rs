//! BindingClient: the three backend operations the handshake depends on.
//!
//! The session controller only ever talks to this trait.  The production
//! implementation is `HttpBindingClient` in the infrastructure layer; tests
//! inject scripted fakes or `mockall` mocks.
//!
//! # Cancellation contract
//!
//! `bind` and `verify` receive the attempt's [`CancellationToken`].  When the
//! token fires, an in-flight call should stop waiting and return the
//! distinguished `Aborted` error.  The controller also races every call
//! against the token itself, so an implementation that ignores it still
//! cannot mutate session state after cancellation.
//!
//! `cancel_session` takes a token of its own.  The controller hands it one
//! that never fires: cleanup runs to completion even after the attempt was
//! cancelled or the controller dropped, bounded by the request timeout.

use async_trait::async_trait;
use cardauth_core::{
    BindingError, CancelSessionError, HardwareClaim, SessionToken, VerificationError,
    VerifiedMember,
};
use tokio_util::sync::CancellationToken;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BindingClient: Send + Sync {
    /// Arms a backend scanning session and waits for a card scan.
    ///
    /// # Errors
    ///
    /// [`BindingError::IncompleteIdentity`] when the response lacks the token,
    /// hardware user id, or hardware name; [`BindingError::Aborted`] when
    /// `cancel` fires first.
    async fn bind(&self, cancel: &CancellationToken) -> Result<HardwareClaim, BindingError>;

    /// Checks the claimed identity against the member registry.
    ///
    /// # Errors
    ///
    /// [`VerificationError::Rejected`] for an unknown card, revoked member, or
    /// name mismatch; [`VerificationError::Aborted`] when `cancel` fires first.
    async fn verify(
        &self,
        token: &SessionToken,
        hardware_name: &str,
        cancel: &CancellationToken,
    ) -> Result<VerifiedMember, VerificationError>;

    /// Disarms the backend session.  Best-effort: the caller only logs errors.
    ///
    /// # Errors
    ///
    /// [`CancelSessionError::Aborted`] when `cancel` fires first.
    async fn cancel_session(
        &self,
        token: &SessionToken,
        cancel: &CancellationToken,
    ) -> Result<(), CancelSessionError>;
}
