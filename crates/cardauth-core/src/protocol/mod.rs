//! Protocol module: JSON wire messages and endpoint paths of the
//! authorization-session backend.

pub mod endpoints;
pub mod messages;

pub use messages::*;
