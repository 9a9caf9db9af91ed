//! Middleware wrapped around the delegate's handler.

pub mod error;
pub mod logging;
pub mod rate_limit;
pub mod user_gate;
