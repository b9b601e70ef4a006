//! HTTP adapter — Axum-based REST API layer for authentication, sessions,
//! MFA, RBAC, permissions, and security events.
//!
//! This module implements the HTTP transport layer only. It is responsible
//! for:
//!  - Accepting HTTP requests and mapping them to `core` operations
//!  - Validating request structure and format
//!  - Delegating business logic to `core` services
//!  - Mapping `CoreError` to HTTP status codes
//!  - Returning structured JSON responses
//!
//! It is NOT responsible for business logic, persistence, cryptography, or
//! token generation — those are delegated to `core` and the other adapters.
//!
//! # Route structure
//!
//! - `/health/*` — liveness and readiness probes, no authentication
//! - `/auth/*` — login, refresh, MFA login completion, password reset: the
//!   means of obtaining a bearer token, so unauthenticated by necessity
//! - `/public/*` — bearer-gated self-service (sessions, MFA, RBAC self-check,
//!   alert subscriptions), scoped to the caller's own identity
//! - `/internal/*` — trusted-network admin/service surface; actor identity
//!   travels in the request body rather than a bearer token
//!
//! # Architecture layers
//!
//! - `dto`: HTTP request/response contracts
//! - `handlers`: request handlers (deserialization, validation, response)
//! - `middleware`: cross-cutting concerns (bearer extraction)
//! - `error`: `CoreError` → HTTP response projection
//! - `state`: shared application state
//! - `router`: route configuration and assembly

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::HttpError;
pub use router::create_router;
pub use state::AppState;
