//! Application layer: the authorization handshake use cases.
//!
//! # Sub-modules
//!
//! - **`binding_client`** – the `BindingClient` trait: bind, verify, and
//!   cancel-session.  Implemented by the infrastructure layer.
//!
//! - **`timeout_guard`** – a disarmable deadline timer.
//!
//! - **`session_controller`** – the state machine that races the network
//!   calls against the deadline and user cancellation.
//!
//! - **`action_invoker`** – runs the caller's business action once with the
//!   verified member, between cosmetic settle delays.
//!
//! - **`authorizer`** – `authorize_and_run(action)`, the one entry point
//!   dialogs use.
//!
//! This layer makes no HTTP calls and reads no files.

pub mod action_invoker;
pub mod authorizer;
pub mod binding_client;
pub mod session_controller;
pub mod timeout_guard;

pub use action_invoker::{ActionInvoker, SettleDelays};
pub use authorizer::Authorizer;
pub use binding_client::BindingClient;
pub use session_controller::{ControllerError, SessionController, DEFAULT_DEADLINE};
pub use timeout_guard::TimeoutGuard;
