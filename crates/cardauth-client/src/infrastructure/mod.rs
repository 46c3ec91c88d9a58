//! Infrastructure layer: HTTP and file-system adapters.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `cardauth_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`http_binding`** – `HttpBindingClient`, the reqwest implementation of
//!   `BindingClient` for the authorization-session endpoints.
//!
//! - **`storage`** – TOML configuration persistence.

pub mod http_binding;
pub mod storage;

pub use http_binding::{HttpBindingClient, HttpClientError};
