//! Logout Service (component J).

use chrono::Utc;
use std::sync::Arc;

use crate::core::audit::{AuditEvent, ResilientAuditSink};
use crate::core::cache::{keys, FastCache};
use crate::core::clock::Clock;
use crate::core::error::CoreError;
use crate::core::session::{BlacklistReason, BlacklistRepository, BlacklistedToken, RevokeReason, SessionRepository};

pub struct LogoutResult {
    pub success: bool,
    pub server_logout_failed: bool,
}

pub struct LogoutService<'a> {
    pub sessions: &'a dyn SessionRepository,
    pub blacklist: &'a dyn BlacklistRepository,
    pub cache: &'a dyn FastCache,
    pub clock: &'a dyn Clock,
    pub audit: Arc<ResilientAuditSink>,
}

impl<'a> LogoutService<'a> {
    /// Idempotent single-session logout: missing or already-revoked sessions
    /// still report `success: true` so the client proceeds with local
    /// teardown regardless (spec.md §4.J).
    pub async fn logout(&self, session_id: &str, user_id: &str, access_token_hash: &str) -> LogoutResult {
        let now = self.clock.now();
        let Ok(Some(mut session)) = self.sessions.find_by_id(session_id).await else {
            return LogoutResult { success: true, server_logout_failed: false };
        };
        if session.user_id != user_id || session.revoked_at.is_some() {
            return LogoutResult { success: true, server_logout_failed: false };
        }

        session.revoked_at = Some(now);
        session.revoke_reason = Some(RevokeReason::UserLogout);
        let refresh_hash = session.refresh_token_hash.clone();
        let expires_at = session.expires_at;

        let mut server_logout_failed = false;
        for hash in [access_token_hash.to_string(), refresh_hash] {
            if self
                .blacklist
                .insert(BlacklistedToken { token_hash: hash, expires_at, reason: BlacklistReason::UserLogout })
                .await
                .is_err()
            {
                server_logout_failed = true;
            }
        }
        if self.sessions.update(session).await.is_err() {
            server_logout_failed = true;
        }
        self.cache.delete(&keys::session(session_id)).await.ok();

        self.audit.log(AuditEvent::new("USER_LOGOUT", now).with_user(user_id).with_target("session", session_id)).await;

        LogoutResult { success: true, server_logout_failed }
    }

    /// Revoke every session but the caller's current one. Returns the count
    /// revoked. Password re-verification is the caller's responsibility.
    pub async fn logout_all_devices(&self, user_id: &str, current_session_id: &str) -> Result<u64, CoreError> {
        let now = self.clock.now();
        let sessions = self.sessions.find_active_by_user(user_id).await?;
        let mut revoked = 0u64;
        for mut session in sessions {
            if session.id == current_session_id || session.revoked_at.is_some() {
                continue;
            }
            session.revoked_at = Some(now);
            session.revoke_reason = Some(RevokeReason::LogoutAllDevices);
            let access_hash = session.access_token_hash.clone();
            let refresh_hash = session.refresh_token_hash.clone();
            let expires_at = session.expires_at;
            let session_id = session.id.clone();
            self.blacklist
                .insert(BlacklistedToken { token_hash: access_hash, expires_at, reason: BlacklistReason::LogoutAllDevices })
                .await?;
            self.blacklist
                .insert(BlacklistedToken { token_hash: refresh_hash, expires_at, reason: BlacklistReason::LogoutAllDevices })
                .await?;
            self.sessions.update(session).await?;
            self.cache.delete(&keys::session(&session_id)).await.ok();
            revoked += 1;
        }
        self.audit
            .log(
                AuditEvent::new("LOGOUT_ALL_DEVICES", now)
                    .with_user(user_id)
                    .with_metadata(serde_json::json!({"revokedSessionCount": revoked})),
            )
            .await;
        Ok(revoked)
    }

    /// Admin-initiated force logout: no password check, always audited with
    /// the acting admin and a reason.
    pub async fn force_logout(&self, session_id: &str, admin_user_id: &str, reason: &str) -> Result<(), CoreError> {
        let now = self.clock.now();
        let mut session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| CoreError::not_found("session not found"))?;
        session.revoked_at = Some(now);
        session.revoke_reason = Some(RevokeReason::AdminForceLogout);
        let user_id = session.user_id.clone();
        let access_hash = session.access_token_hash.clone();
        let refresh_hash = session.refresh_token_hash.clone();
        let expires_at = session.expires_at;
        self.blacklist
            .insert(BlacklistedToken { token_hash: access_hash, expires_at, reason: BlacklistReason::AdminForceLogout })
            .await?;
        self.blacklist
            .insert(BlacklistedToken { token_hash: refresh_hash, expires_at, reason: BlacklistReason::AdminForceLogout })
            .await?;
        self.sessions.update(session).await?;
        self.cache.delete(&keys::session(session_id)).await.ok();
        self.audit
            .log(
                AuditEvent::new("ADMIN_FORCE_LOGOUT", now)
                    .with_user(&user_id)
                    .with_actor(admin_user_id)
                    .with_metadata(serde_json::json!({"reason": reason})),
            )
            .await;
        Ok(())
    }

    pub async fn cleanup_expired_tokens(&self) -> Result<u64, CoreError> {
        self.blacklist.cleanup_expired(self.clock.now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::fake::InMemoryFastCache;
    use crate::core::clock::fake::FakeClock;
    use crate::core::session::fake::{InMemoryBlacklistRepository, InMemorySessionRepository};
    use crate::core::session::Session;

    fn seeded_session(id: &str, user_id: &str, now: chrono::DateTime<Utc>) -> Session {
        Session {
            id: id.into(),
            user_id: user_id.into(),
            access_token_hash: format!("access-{id}"),
            refresh_token_hash: format!("refresh-{id}"),
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
        }
    }

    #[tokio::test]
    async fn logout_is_idempotent_for_missing_sessions() {
        let sessions = InMemorySessionRepository::default();
        let blacklist = InMemoryBlacklistRepository::default();
        let cache = InMemoryFastCache::default();
        let clock = FakeClock::new(Utc::now());
        let svc = LogoutService {
            sessions: &sessions,
            blacklist: &blacklist,
            cache: &cache,
            clock: &clock,
            audit: Arc::new(ResilientAuditSink::new(Arc::new(crate::core::audit::fake::InMemoryAuditSink::default()))),
        };
        let result = svc.logout("missing", "u1", "hash").await;
        assert!(result.success);
        assert!(!result.server_logout_failed);
    }

    #[tokio::test]
    async fn logout_all_devices_skips_the_current_session() {
        let sessions = InMemorySessionRepository::default();
        let blacklist = InMemoryBlacklistRepository::default();
        let cache = InMemoryFastCache::default();
        let clock = FakeClock::new(Utc::now());
        let now = clock.now();
        sessions.insert(seeded_session("s1", "u1", now)).await.unwrap();
        sessions.insert(seeded_session("s2", "u1", now)).await.unwrap();

        let svc = LogoutService {
            sessions: &sessions,
            blacklist: &blacklist,
            cache: &cache,
            clock: &clock,
            audit: Arc::new(ResilientAuditSink::new(Arc::new(crate::core::audit::fake::InMemoryAuditSink::default()))),
        };
        let revoked = svc.logout_all_devices("u1", "s1").await.unwrap();
        assert_eq!(revoked, 1);
        let s1 = sessions.find_by_id("s1").await.unwrap().unwrap();
        assert!(s1.revoked_at.is_none());
        let s2 = sessions.find_by_id("s2").await.unwrap().unwrap();
        assert!(matches!(s2.revoke_reason, Some(RevokeReason::LogoutAllDevices)));
    }
}
