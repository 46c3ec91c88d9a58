//! Domain layer: pure types describing one authorization attempt.
//!
//! # Sub-modules
//!
//! - **`session`** – `AuthorizationSession` and its monotonic state machine.
//! - **`outcome`** – the typed result of a handshake and of the combined
//!   authorize-then-act flow.
//! - **`errors`** – failures of the individual backend operations.

pub mod errors;
pub mod outcome;
pub mod session;
