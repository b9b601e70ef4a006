//! HTTP data-transfer objects — one module per bounded context, each a thin
//! request/response projection over the matching `core` types.

pub mod auth;
pub mod mfa;
pub mod password_reset;
pub mod permissions;
pub mod rbac;
pub mod security_events;
pub mod sessions;
