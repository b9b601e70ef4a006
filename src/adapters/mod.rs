//! Adapters — concrete implementations of the `core` ports. Nothing in
//! `core` imports from here; everything in here imports from `core`.

pub mod cache;
pub mod crypto;
pub mod http;
pub mod persistence;
pub mod queue;
