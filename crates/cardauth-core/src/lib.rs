//! # cardauth-core
//!
//! Shared library for the card-scan authorization handshake containing the
//! session state machine types, the error taxonomy, and the JSON wire messages
//! exchanged with the authorization-session backend.
//!
//! This crate has zero dependencies on async runtimes, HTTP clients, or the
//! file system.  Everything here can be unit-tested synchronously.
//!
//! # What is the authorization handshake? (for beginners)
//!
//! Some actions in the facility front end change physical stock: converting a
//! batch, destroying plants, finalizing lab results.  Before any of those may
//! run, a staff member must tap a contactless card on a separate scanner.  The
//! handshake pairs that scan with the dialog that asked for it:
//!
//! 1. **Bind** – the backend arms a scanning session and reports which card
//!    (hardware user id + display name) was presented, along with an opaque
//!    session token.  This identity is *claimed*, not yet trusted.
//! 2. **Verify** – the claimed identity is checked against the member
//!    registry.  Only a verified member may authorize the action.
//! 3. **Cancel** – if the attempt ends any other way (timeout, user cancel,
//!    network error) the backend session is disarmed so it cannot be reused.
//!
//! This crate defines:
//!
//! - **`domain`** – the `AuthorizationSession` state machine, the verified
//!   identity it produces, and the typed outcomes and errors.
//!
//! - **`protocol`** – the request/response DTOs for the three backend
//!   operations and the endpoint paths they live under.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `cardauth_core::VerifiedMember` instead of the full module path.
pub use domain::errors::{
    BindingError, CancelSessionError, TransitionError, VerificationError,
};
pub use domain::outcome::{ActionError, AuthorizationOutcome, AuthorizeError};
pub use domain::session::{
    AuthorizationSession, HardwareClaim, MemberId, SessionState, SessionToken, VerifiedMember,
};
