//! Paths of the three authorization-session operations.
//!
//! All three live under one namespace so a reverse proxy can route (and rate
//! limit) them together.
//!
//! | Operation      | Method | Path                                 |
//! |----------------|--------|--------------------------------------|
//! | bind-session   | GET    | `/api/authorization-session/bind`    |
//! | verify-member  | POST   | `/api/authorization-session/verify`  |
//! | cancel-session | POST   | `/api/authorization-session/cancel`  |

pub const NAMESPACE: &str = "/api/authorization-session";

pub const BIND: &str = "/api/authorization-session/bind";

pub const VERIFY: &str = "/api/authorization-session/verify";

pub const CANCEL: &str = "/api/authorization-session/cancel";

/// Joins a base URL and an endpoint path without doubling or dropping the `/`.
pub fn join(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}
