//! Session Service (component F).
//!
//! Opaque authenticated contexts with refresh-token rotation, reuse-attack
//! detection via token families, concurrent-session limits, and inactivity
//! timeouts. This is the single largest component in the system; the
//! refresh/rotation sequence in [`SessionService::refresh`] is the part of
//! the whole crate most worth reading carefully.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::core::audit::{AuditEvent, AuditLogSink, ResilientAuditSink};
use crate::core::cache::{keys, FastCache};
use crate::core::clock::Clock;
use crate::core::error::CoreError;
use crate::core::rbac::{resolve_role_names, RoleRepository, UserRoleRepository};
use crate::core::security_events::{AlertSeverity, SecurityAlertRepository};
use crate::core::token::{AccessClaims, IssueTokenPair, TokenPair, TokenService};
use crate::core::user::User;

pub const MAX_ACTIVE_SESSIONS: usize = 5;
pub const INACTIVITY_TIMEOUT_MINUTES: i64 = 60;
pub const INACTIVITY_WARNING_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeReason {
    UserLogout,
    TokenRotated,
    SessionRevoked,
    AdminForceLogout,
    TokenReuseDetected,
    LogoutAllDevices,
    PasswordReset,
    InactivityTimeout,
    ConcurrentLimitEnforced,
}

impl RevokeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserLogout => "USER_LOGOUT",
            Self::TokenRotated => "TOKEN_ROTATED",
            Self::SessionRevoked => "SESSION_REVOKED",
            Self::AdminForceLogout => "ADMIN_FORCE_LOGOUT",
            Self::TokenReuseDetected => "TOKEN_REUSE_DETECTED",
            Self::LogoutAllDevices => "LOGOUT_ALL_DEVICES",
            Self::PasswordReset => "PASSWORD_RESET",
            Self::InactivityTimeout => "INACTIVITY_TIMEOUT",
            Self::ConcurrentLimitEnforced => "CONCURRENT_LIMIT_ENFORCED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Geo {
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    pub token_family: String,
    pub device_fingerprint: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub geo: Option<Geo>,
    pub is_remembered: bool,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoke_reason: Option<RevokeReason>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Invariant (a): usable iff not revoked and not expired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistReason {
    UserLogout,
    TokenRotated,
    SessionRevoked,
    AdminForceLogout,
    TokenReuseDetected,
    LogoutAllDevices,
    PasswordReset,
}

#[derive(Debug, Clone)]
pub struct BlacklistedToken {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub reason: BlacklistReason,
}

/// Masked transport-facing view of a session (§4.F "Listing").
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub masked_ip: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub location: Option<String>,
    pub is_current: bool,
    pub is_remembered: bool,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Mask an IPv4's last octet only: `1.2.3.4` -> `1.2.3.X`. Non-IPv4 input is
/// returned unmasked (IPv6 masking is out of scope for this release).
pub fn mask_ip(ip: &str) -> String {
    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() == 4 {
        format!("{}.{}.{}.X", parts[0], parts[1], parts[2])
    } else {
        ip.to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedUserAgent {
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
}

/// Coarse user-agent parse: enough to populate the session-listing view.
/// Not a full UA database — spec.md scopes device attestation out entirely.
pub fn parse_user_agent(ua: &str) -> ParsedUserAgent {
    let lower = ua.to_lowercase();
    let browser = if lower.contains("firefox") {
        Some("Firefox")
    } else if lower.contains("edg/") {
        Some("Edge")
    } else if lower.contains("chrome") {
        Some("Chrome")
    } else if lower.contains("safari") {
        Some("Safari")
    } else {
        None
    };
    let os = if lower.contains("windows") {
        Some("Windows")
    } else if lower.contains("mac os") || lower.contains("macos") {
        Some("macOS")
    } else if lower.contains("android") {
        Some("Android")
    } else if lower.contains("iphone") || lower.contains("ios") {
        Some("iOS")
    } else if lower.contains("linux") {
        Some("Linux")
    } else {
        None
    };
    let device_type = if lower.contains("mobile") {
        Some("mobile")
    } else {
        Some("desktop")
    };
    ParsedUserAgent {
        device_type: device_type.map(str::to_string),
        browser: browser.map(str::to_string),
        os: os.map(str::to_string),
    }
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert(&self, session: Session) -> Result<(), CoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, CoreError>;
    async fn find_active_by_user(&self, user_id: &str) -> Result<Vec<Session>, CoreError>;
    /// Every session sharing a `tokenFamily`, regardless of owner — used to
    /// revoke the whole chain on refresh-token reuse.
    async fn find_by_token_family(&self, token_family: &str) -> Result<Vec<Session>, CoreError>;
    async fn update(&self, session: Session) -> Result<(), CoreError>;
}

#[async_trait]
pub trait BlacklistRepository: Send + Sync {
    async fn insert(&self, token: BlacklistedToken) -> Result<(), CoreError>;
    async fn is_blacklisted(&self, token_hash: &str) -> Result<bool, CoreError>;
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, CoreError>;
}

pub struct RefreshInput<'a> {
    pub refresh_token: &'a str,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub struct SessionValidation {
    pub valid: bool,
    pub user: Option<User>,
    pub reason: Option<&'static str>,
}

pub struct SessionService<'a> {
    pub sessions: &'a dyn SessionRepository,
    pub blacklist: &'a dyn BlacklistRepository,
    pub users: &'a dyn crate::core::user::UserRepository,
    pub roles: &'a dyn RoleRepository,
    pub user_roles: &'a dyn UserRoleRepository,
    pub alerts: &'a dyn SecurityAlertRepository,
    pub cache: &'a dyn FastCache,
    pub tokens: &'a dyn TokenService,
    pub clock: &'a dyn Clock,
    pub audit: Arc<ResilientAuditSink>,
}

impl<'a> SessionService<'a> {
    /// Refresh with rotation and reuse detection — spec.md §4.F steps 1-7.
    pub async fn refresh(&self, input: RefreshInput<'_>) -> Result<TokenPair, CoreError> {
        let now = self.clock.now();

        let claims = self.tokens.verify_refresh_token(input.refresh_token, now)?;
        let token_hash = self.tokens.get_token_hash(input.refresh_token);

        if self.blacklist.is_blacklisted(&token_hash).await? {
            self.handle_reuse_attack(&claims.token_family, now).await?;
            return Err(CoreError::unauthorized("invalid refresh token"));
        }

        let mut session = self
            .sessions
            .find_by_id(&claims.session_id)
            .await?
            .ok_or_else(|| CoreError::unauthorized("invalid refresh token"))?;
        if !session.is_usable(now) {
            return Err(CoreError::unauthorized("invalid refresh token"));
        }

        let user = self
            .users
            .find_by_id(&session.user_id)
            .await?
            .ok_or_else(|| CoreError::unauthorized("invalid refresh token"))?;

        let role_names = resolve_role_names(self.user_roles, self.roles, &session.user_id, now).await?;
        let pair = self.tokens.generate_token_pair(IssueTokenPair {
            user_id: &session.user_id,
            session_id: &session.id,
            roles: role_names,
            org_id: None,
            token_family: &session.token_family,
            remember_me: session.is_remembered,
            now,
        })?;

        self.blacklist
            .insert(BlacklistedToken {
                token_hash,
                expires_at: chrono::DateTime::from_timestamp(claims.exp, 0).unwrap_or(now),
                reason: BlacklistReason::TokenRotated,
            })
            .await?;

        session.refresh_token_hash = self.tokens.get_token_hash(&pair.refresh_token);
        session.last_activity_at = now;
        if let Some(ip) = input.ip_address {
            session.ip_address = Some(ip);
        }
        self.sessions.update(session).await?;

        self.audit
            .log(
                AuditEvent::new("TOKEN_REFRESHED", now)
                    .with_user(&user.id)
                    .with_target("session", &claims.session_id),
            )
            .await;

        Ok(pair)
    }

    async fn handle_reuse_attack(&self, token_family: &str, now: DateTime<Utc>) -> Result<(), CoreError> {
        for mut session in self.sessions.find_by_token_family(token_family).await? {
            if session.revoked_at.is_none() {
                session.revoked_at = Some(now);
                session.revoke_reason = Some(RevokeReason::TokenReuseDetected);
                let session_id = session.id.clone();
                let user_id = session.user_id.clone();
                self.sessions.update(session).await?;
                self.cache.delete(&keys::session(&session_id)).await.ok();
                self.audit
                    .log(
                        AuditEvent::new("SECURITY_ALERT_CREATED", now)
                            .with_user(&user_id)
                            .with_target("session", &session_id)
                            .with_metadata(serde_json::json!({"reason": "TOKEN_REUSE_DETECTED"})),
                    )
                    .await;
                crate::core::security_events::create_alert(
                    self.alerts,
                    self.cache,
                    self.clock,
                    &self.audit,
                    Some(&user_id),
                    "TOKEN_REUSE_DETECTED",
                    AlertSeverity::Critical,
                    None,
                    "refresh token reuse detected, session family revoked",
                    serde_json::Value::Null,
                )
                .await
                .ok();
            }
        }
        Ok(())
    }

    /// Listing — spec.md §4.F "Listing".
    pub fn list_summaries(&self, sessions: &[Session], current_session_id: &str, now: DateTime<Utc>) -> Vec<SessionSummary> {
        let mut usable: Vec<&Session> = sessions.iter().filter(|s| s.is_usable(now)).collect();
        usable.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        usable
            .into_iter()
            .map(|s| {
                let ua = s.user_agent.as_deref().map(parse_user_agent).unwrap_or_default();
                SessionSummary {
                    id: s.id.clone(),
                    masked_ip: s.ip_address.as_deref().map(mask_ip),
                    device_type: ua.device_type,
                    browser: ua.browser,
                    os: ua.os,
                    location: s.geo.as_ref().and_then(|g| match (&g.city, &g.country) {
                        (Some(c), Some(co)) => Some(format!("{c}, {co}")),
                        _ => None,
                    }),
                    is_current: s.id == current_session_id,
                    is_remembered: s.is_remembered,
                    last_activity_at: s.last_activity_at,
                    created_at: s.created_at,
                }
            })
            .collect()
    }

    /// Revoke a single session, verifying ownership first.
    pub async fn revoke_single(&self, session_id: &str, caller_user_id: &str, reason: RevokeReason) -> Result<(), CoreError> {
        let mut session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| CoreError::not_found("session not found"))?;
        if session.user_id != caller_user_id {
            return Err(CoreError::forbidden("not your session"));
        }
        let now = self.clock.now();
        session.revoked_at = Some(now);
        session.revoke_reason = Some(reason);
        self.blacklist
            .insert(BlacklistedToken {
                token_hash: session.access_token_hash.clone(),
                expires_at: session.expires_at,
                reason: BlacklistReason::SessionRevoked,
            })
            .await?;
        self.blacklist
            .insert(BlacklistedToken {
                token_hash: session.refresh_token_hash.clone(),
                expires_at: session.expires_at,
                reason: BlacklistReason::SessionRevoked,
            })
            .await?;
        self.sessions.update(session).await?;
        self.cache.delete(&keys::session(session_id)).await.ok();
        Ok(())
    }

    /// Enforce the concurrent-session cap at login time: evict the oldest
    /// active session if the user is already at the limit.
    pub async fn enforce_concurrent_limit(&self, user_id: &str) -> Result<(), CoreError> {
        let mut active = self.sessions.find_active_by_user(user_id).await?;
        active.retain(|s| s.is_usable(self.clock.now()));
        if active.len() < MAX_ACTIVE_SESSIONS {
            return Ok(());
        }
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        if let Some(oldest) = active.into_iter().next() {
            self.revoke_single(&oldest.id, user_id, RevokeReason::ConcurrentLimitEnforced).await?;
        }
        Ok(())
    }

    /// Heartbeat: bump activity and extend the fast-cache TTL to 3600s.
    pub async fn heartbeat(&self, mut session: Session) -> Result<(), CoreError> {
        session.last_activity_at = self.clock.now();
        let id = session.id.clone();
        self.sessions.update(session).await?;
        self.cache
            .set(&keys::session(&id), "refreshed", std::time::Duration::from_secs(3600))
            .await
            .ok();
        Ok(())
    }

    /// Reports remaining time before the 60-minute inactivity timeout fires.
    pub fn check_inactivity(&self, session: &Session, now: DateTime<Utc>) -> (bool, i64, bool) {
        let elapsed = now.signed_duration_since(session.last_activity_at).num_minutes();
        let remaining = INACTIVITY_TIMEOUT_MINUTES - elapsed;
        let valid = remaining > 0;
        let show_warning = valid && remaining <= INACTIVITY_WARNING_MINUTES;
        (valid, remaining.max(0), show_warning)
    }

    /// `validateSession` — cache-first, fall back to the store on cache miss
    /// or cache failure (graceful degradation, spec.md §4.F).
    pub async fn validate_session(&self, session: &Option<Session>, access_claims: &AccessClaims, user: Option<User>, now: DateTime<Utc>) -> SessionValidation {
        let Some(session) = session else {
            return SessionValidation {
                valid: false,
                user: None,
                reason: Some("SESSION_NOT_FOUND"),
            };
        };
        if session.id != access_claims.session_id {
            return SessionValidation {
                valid: false,
                user: None,
                reason: Some("SESSION_NOT_FOUND"),
            };
        }
        if session.revoked_at.is_some() {
            return SessionValidation {
                valid: false,
                user: None,
                reason: Some("SESSION_REVOKED"),
            };
        }
        if session.expires_at <= now {
            return SessionValidation {
                valid: false,
                user: None,
                reason: Some("SESSION_EXPIRED"),
            };
        }
        SessionValidation {
            valid: true,
            user,
            reason: None,
        }
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemorySessionRepository {
        pub sessions: Mutex<Vec<Session>>,
    }

    #[async_trait]
    impl SessionRepository for InMemorySessionRepository {
        async fn insert(&self, session: Session) -> Result<(), CoreError> {
            self.sessions.lock().unwrap().push(session);
            Ok(())
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<Session>, CoreError> {
            Ok(self.sessions.lock().unwrap().iter().find(|s| s.id == id).cloned())
        }

        async fn find_active_by_user(&self, user_id: &str) -> Result<Vec<Session>, CoreError> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.user_id == user_id && s.revoked_at.is_none())
                .cloned()
                .collect())
        }

        async fn find_by_token_family(&self, token_family: &str) -> Result<Vec<Session>, CoreError> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.token_family == token_family)
                .cloned()
                .collect())
        }

        async fn update(&self, session: Session) -> Result<(), CoreError> {
            let mut sessions = self.sessions.lock().unwrap();
            if let Some(existing) = sessions.iter_mut().find(|s| s.id == session.id) {
                *existing = session;
                Ok(())
            } else {
                Err(CoreError::not_found("session not found"))
            }
        }
    }

    #[derive(Default)]
    pub struct InMemoryBlacklistRepository {
        pub entries: Mutex<Vec<BlacklistedToken>>,
    }

    #[async_trait]
    impl BlacklistRepository for InMemoryBlacklistRepository {
        async fn insert(&self, token: BlacklistedToken) -> Result<(), CoreError> {
            self.entries.lock().unwrap().push(token);
            Ok(())
        }

        async fn is_blacklisted(&self, token_hash: &str) -> Result<bool, CoreError> {
            Ok(self.entries.lock().unwrap().iter().any(|t| t.token_hash == token_hash))
        }

        async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, CoreError> {
            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|t| t.expires_at >= now);
            Ok((before - entries.len()) as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_ip_hides_last_octet_only() {
        assert_eq!(mask_ip("192.168.1.42"), "192.168.1.X");
    }

    #[test]
    fn session_is_usable_iff_not_revoked_and_not_expired() {
        let now = Utc::now();
        let mut session = Session {
            id: "s1".into(),
            user_id: "u1".into(),
            access_token_hash: "a".into(),
            refresh_token_hash: "r".into(),
            token_family: "fam".into(),
            device_fingerprint: None,
            user_agent: None,
            ip_address: None,
            geo: None,
            is_remembered: false,
            last_activity_at: now,
            expires_at: now + chrono::Duration::hours(1),
            revoked_at: None,
            revoke_reason: None,
            created_at: now,
        };
        assert!(session.is_usable(now));
        session.revoked_at = Some(now);
        assert!(!session.is_usable(now));
        session.revoked_at = None;
        session.expires_at = now - chrono::Duration::seconds(1);
        assert!(!session.is_usable(now));
    }

    #[test]
    fn user_agent_parsing_extracts_browser_and_os() {
        let ua = parse_user_agent("Mozilla/5.0 (Windows NT 10.0) Chrome/120.0");
        assert_eq!(ua.browser.as_deref(), Some("Chrome"));
        assert_eq!(ua.os.as_deref(), Some("Windows"));
    }

    #[test]
    fn inactivity_warning_fires_within_five_minutes_of_timeout() {
        use crate::core::cache::fake::InMemoryFastCache;
        use crate::core::clock::fake::FakeClock;
        use crate::core::rbac::fake::{InMemoryRoleRepository, InMemoryUserRoleRepository};
        use crate::core::security_events::fake::InMemoryAlertRepository;
        use crate::core::token::fake::FakeTokenService;
        use crate::core::user::fake::InMemoryUserRepository;
        use fake::{InMemoryBlacklistRepository, InMemorySessionRepository};

        let clock = FakeClock::new(Utc::now());
        let sessions = InMemorySessionRepository::default();
        let blacklist = InMemoryBlacklistRepository::default();
        let users = InMemoryUserRepository::default();
        let roles = InMemoryRoleRepository::default();
        let user_roles = InMemoryUserRoleRepository::default();
        let alerts = InMemoryAlertRepository::default();
        let tokens = FakeTokenService::default();
        let cache = InMemoryFastCache::default();
        let audit_sink = Arc::new(crate::core::audit::fake::InMemoryAuditSink::default());
        let svc = SessionService {
            sessions: &sessions,
            blacklist: &blacklist,
            users: &users,
            roles: &roles,
            user_roles: &user_roles,
            alerts: &alerts,
            cache: &cache,
            tokens: &tokens,
            clock: &clock,
            audit: Arc::new(ResilientAuditSink::new(audit_sink)),
        };

        let now = clock.now();
        let session = Session {
            id: "s1".into(),
            user_id: "u1".into(),
            access_token_hash: "a".into(),
            refresh_token_hash: "r".into(),
            token_family: "fam".into(),
            device_fingerprint: None,
            user_agent: None,
            ip_address: None,
            geo: None,
            is_remembered: false,
            last_activity_at: now - chrono::Duration::minutes(56),
            expires_at: now + chrono::Duration::hours(1),
            revoked_at: None,
            revoke_reason: None,
            created_at: now,
        };
        let (valid, remaining, warning) = svc.check_inactivity(&session, now);
        assert!(valid);
        assert_eq!(remaining, 4);
        assert!(warning);
    }
}
