//! cardauth-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does cardauth-client do? (for beginners)
//!
//! State-changing screens (batch conversion, destruction, lab-result updates)
//! must be authorized by a physical card scan performed on separate hardware.
//! This crate runs that handshake and then the action:
//!
//! 1. `SessionController::start()` asks the backend to arm a scanning session
//!    (**bind**) and waits for the scan.
//! 2. The claimed identity is checked against the member registry
//!    (**verify**).
//! 3. Meanwhile a `TimeoutGuard` enforces the deadline and the user may call
//!    `cancel()`; whichever of success, timeout, or cancel arrives first
//!    decides the outcome.
//! 4. Any non-success ending disarms the backend session (**cancel**).
//! 5. On success, `ActionInvoker` runs the caller's business action once with
//!    the verified member id.
//!
//! `Authorizer::authorize_and_run` wraps all five steps in one call.

/// Application layer: controller, timeout guard, action invoker.
pub mod application;

/// Infrastructure layer: HTTP binding client and configuration storage.
pub mod infrastructure;

pub use application::{Authorizer, SessionController};
