//! Postgres-backed persistence adapters — one module per bounded context,
//! each implementing the matching `core` repository port traits via `sqlx`.

pub mod auth_repository;
pub mod audit_sink;
pub mod database;
pub mod error;
pub mod mfa_repository;
pub mod password_reset_repository;
pub mod permission_repository;
pub mod rbac_repository;
pub mod security_events_repository;
pub mod session_repository;
pub mod user_repository;

pub use audit_sink::SqlAuditLogSink;
pub use auth_repository::{SqlDeviceRepository, SqlLoginAttemptRepository};
pub use database::{connect, PoolConfig};
pub use mfa_repository::{SqlBackupCodeRepository, SqlMfaChallengeRepository, SqlMfaConfigRepository};
pub use password_reset_repository::{SqlPasswordHistoryRepository, SqlPasswordResetTokenRepository};
pub use permission_repository::{SqlPermissionRepository, SqlUserPermissionRepository};
pub use rbac_repository::{SqlRoleHierarchyRepository, SqlRolePermissionRepository, SqlRoleRepository, SqlUserRoleRepository};
pub use security_events_repository::{SqlNotificationSubscriptionRepository, SqlSecurityAlertRepository};
pub use session_repository::{SqlBlacklistRepository, SqlSessionRepository};
pub use user_repository::SqlUserRepository;
