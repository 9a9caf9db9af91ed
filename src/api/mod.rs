//! HTTP layer of the front proxy.
//!
//! - [`user`]: the authenticated identity carried in request extensions
//! - [`middleware`]: rate limiting, user gating, request logging and error
//!   responses
//! - [`server`]: assembles the handler chain and drives the server lifecycle

pub mod middleware;
pub mod server;
pub mod user;
