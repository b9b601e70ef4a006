//! HTTP server shared state.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::audit::ResilientAuditSink;
use crate::core::auth::{DeviceRepository, LoginAttemptRepository};
use crate::core::cache::FastCache;
use crate::core::clock::Clock;
use crate::core::crypto::CryptoService;
use crate::core::mfa::{BackupCodeRepository, MfaChallengeRepository, MfaConfigRepository};
use crate::core::password_reset::{PasswordHistoryRepository, PasswordResetTokenRepository};
use crate::core::permission::{PermissionRepository, UserPermissionRepository};
use crate::core::queue::NotificationQueue;
use crate::core::rate_limit::RateLimiter;
use crate::core::rbac::{RoleHierarchyRepository, RolePermissionRepository, RoleRepository, UserRoleRepository};
use crate::core::security_events::{NotificationSubscriptionRepository, SecurityAlertRepository};
use crate::core::session::{BlacklistRepository, SessionRepository};
use crate::core::token::TokenService;
use crate::core::totp::TotpService;
use crate::core::user::UserRepository;

/// Application state shared across all HTTP handlers.
///
/// Holds only repository/service ports and configuration. Handlers borrow
/// from the `Arc`s to build a short-lived `core` service struct per request —
/// the same `&'a dyn Trait` wiring the core services' own tests use.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub blacklist: Arc<dyn BlacklistRepository>,
    pub login_attempts: Arc<dyn LoginAttemptRepository>,
    pub devices: Arc<dyn DeviceRepository>,
    pub mfa_configs: Arc<dyn MfaConfigRepository>,
    pub mfa_challenges: Arc<dyn MfaChallengeRepository>,
    pub backup_codes: Arc<dyn BackupCodeRepository>,
    pub reset_tokens: Arc<dyn PasswordResetTokenRepository>,
    pub password_history: Arc<dyn PasswordHistoryRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub role_hierarchy: Arc<dyn RoleHierarchyRepository>,
    pub role_permissions: Arc<dyn RolePermissionRepository>,
    pub user_roles: Arc<dyn UserRoleRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub user_permissions: Arc<dyn UserPermissionRepository>,
    pub alerts: Arc<dyn SecurityAlertRepository>,
    pub subscriptions: Arc<dyn NotificationSubscriptionRepository>,
    pub cache: Arc<dyn FastCache>,
    pub crypto: Arc<dyn CryptoService>,
    pub tokens: Arc<dyn TokenService>,
    pub totp: Arc<dyn TotpService>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub queue: Arc<dyn NotificationQueue>,
    pub clock: Arc<dyn Clock>,
    pub audit: Arc<ResilientAuditSink>,
    pub config: Arc<AppConfig>,
}
