//! Core domain — ports and use-case services for the Access & Identity
//! Management subsystem. No module here depends on `adapters` or `tokio`'s
//! networking/IO primitives directly; everything reaches the outside world
//! through a trait defined in this module.

pub mod audit;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod crypto;
pub mod error;
pub mod logout;
pub mod mfa;
pub mod password_reset;
pub mod permission;
pub mod queue;
pub mod rate_limit;
pub mod rbac;
pub mod security_events;
pub mod session;
pub mod token;
pub mod totp;
pub mod user;
