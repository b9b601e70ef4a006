//! Queue adapter — Postgres transactional outbox.

pub mod postgres_outbox;

pub use postgres_outbox::PostgresOutboxQueue;
