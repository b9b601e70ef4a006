//! Password Reset Service (component K).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::core::audit::{AuditEvent, ResilientAuditSink};
use crate::core::clock::Clock;
use crate::core::crypto::CryptoService;
use crate::core::error::CoreError;
use crate::core::queue::{NotificationMessage, NotificationQueue};
use crate::core::session::{RevokeReason, SessionRepository};
use crate::core::user::{canonicalize_email, UserRepository, UserStatus};

pub const RESET_TOKEN_TTL_HOURS: i64 = 1;
pub const RESET_MIN_DURATION_MS: u64 = 200;
pub const PASSWORD_HISTORY_DEPTH: usize = 5;
/// `requestPasswordReset` always reports this message, whether or not the
/// account exists (spec.md §4.K enumeration defence).
pub const RESET_REQUESTED_MESSAGE: &str = "if an account exists for that email, a reset link has been sent";

#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub ip_address: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl PasswordResetToken {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

#[async_trait]
pub trait PasswordResetTokenRepository: Send + Sync {
    async fn invalidate_active_for_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<(), CoreError>;
    async fn insert(&self, token: PasswordResetToken) -> Result<(), CoreError>;
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<PasswordResetToken>, CoreError>;
    async fn mark_used(&self, id: &str, now: DateTime<Utc>) -> Result<(), CoreError>;
}

#[async_trait]
pub trait PasswordHistoryRepository: Send + Sync {
    async fn recent_hashes(&self, user_id: &str) -> Result<Vec<String>, CoreError>;
    /// Push `new_hash`, then trim to [`PASSWORD_HISTORY_DEPTH`] newest, in
    /// one atomic step.
    async fn push_and_trim(&self, user_id: &str, new_hash: String, keep: usize) -> Result<(), CoreError>;
}

pub struct PasswordResetService<'a> {
    pub users: &'a dyn UserRepository,
    pub tokens: &'a dyn PasswordResetTokenRepository,
    pub history: &'a dyn PasswordHistoryRepository,
    pub sessions: &'a dyn SessionRepository,
    pub queue: &'a dyn NotificationQueue,
    pub crypto: &'a dyn CryptoService,
    pub clock: &'a dyn Clock,
    pub audit: Arc<ResilientAuditSink>,
}

impl<'a> PasswordResetService<'a> {
    async fn with_min_duration<T, F: Future<Output = T>>(&self, body: F) -> T {
        let started = std::time::Instant::now();
        let result = body.await;
        let floor = Duration::from_millis(RESET_MIN_DURATION_MS);
        let elapsed = started.elapsed();
        if elapsed < floor {
            tokio::time::sleep(floor - elapsed).await;
        }
        result
    }

    pub async fn request_password_reset(&self, email: &str, ip_address: Option<String>) -> &'static str {
        self.with_min_duration(self.request_inner(email, ip_address)).await
    }

    async fn request_inner(&self, email: &str, ip_address: Option<String>) -> &'static str {
        let email_lower = canonicalize_email(email);
        let now = self.clock.now();
        if let Ok(Some(user)) = self.users.find_by_email(&email_lower).await {
            if user.status == UserStatus::Active {
                let _ = self.tokens.invalidate_active_for_user(&user.id, now).await;
                let raw_token = self.crypto.random_hex(32);
                let token_hash = sha256_hex(&raw_token);
                let _ = self
                    .tokens
                    .insert(PasswordResetToken {
                        id: self.crypto.random_hex(8),
                        user_id: user.id.clone(),
                        token_hash,
                        ip_address,
                        expires_at: now + chrono::Duration::hours(RESET_TOKEN_TTL_HOURS),
                        used_at: None,
                    })
                    .await;
                self.queue
                    .enqueue(NotificationMessage::new(
                        "PASSWORD_RESET_REQUESTED",
                        user.email.clone(),
                        serde_json::json!({"token": raw_token}),
                    ))
                    .await
                    .ok();
                self.audit.log(AuditEvent::new("PASSWORD_RESET_REQUESTED", now).with_user(&user.id)).await;
            }
        }
        RESET_REQUESTED_MESSAGE
    }

    pub async fn validate_reset_token(&self, token: &str) -> Result<bool, CoreError> {
        if token.len() != 64 {
            return Ok(false);
        }
        let hash = sha256_hex(token);
        let now = self.clock.now();
        Ok(self.tokens.find_by_hash(&hash).await?.is_some_and(|t| t.is_usable(now)))
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), CoreError> {
        if token.len() != 64 {
            return Err(CoreError::bad_request("malformed reset token"));
        }
        let hash = sha256_hex(token);
        let reset_token = self
            .tokens
            .find_by_hash(&hash)
            .await?
            .ok_or_else(|| CoreError::not_found("reset token not found"))?;
        let now = self.clock.now();
        if !reset_token.is_usable(now) {
            return Err(CoreError::bad_request("reset token is used or expired"));
        }

        let user = self
            .users
            .find_by_id(&reset_token.user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user not found"))?;

        let mut historical = self.history.recent_hashes(&user.id).await?;
        historical.push(user.password_hash.clone());
        if historical.iter().any(|h| self.crypto.verify_password(h, new_password)) {
            return Err(CoreError::bad_request("password was used recently"));
        }

        let new_hash = self.crypto.hash_password(new_password)?;
        self.history.push_and_trim(&user.id, user.password_hash.clone(), PASSWORD_HISTORY_DEPTH).await?;
        self.users.update_password_hash(&user.id, &new_hash, now).await?;
        self.tokens.mark_used(&reset_token.id, now).await?;

        for mut session in self.sessions.find_active_by_user(&user.id).await? {
            session.revoked_at = Some(now);
            session.revoke_reason = Some(RevokeReason::PasswordReset);
            self.sessions.update(session).await?;
        }

        self.audit.log(AuditEvent::new("PASSWORD_RESET_COMPLETED", now).with_user(&user.id)).await;
        Ok(())
    }
}

fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}


#[cfg(test)]
mod tests {
    use super::fake::*;
    use super::*;
    use crate::core::cache::fake::InMemoryFastCache;
    use crate::core::clock::fake::FakeClock;
    use crate::core::crypto::fake::InsecureTestCrypto;
    use crate::core::queue::fake::InMemoryQueue;
    use crate::core::session::fake::InMemorySessionRepository;
    use crate::core::user::{fake::InMemoryUserRepository, User};

    fn service<'a>(
        users: &'a InMemoryUserRepository,
        tokens: &'a InMemoryResetTokenRepository,
        history: &'a InMemoryPasswordHistoryRepository,
        sessions: &'a InMemorySessionRepository,
        queue: &'a InMemoryQueue,
        crypto: &'a InsecureTestCrypto,
        clock: &'a FakeClock,
    ) -> PasswordResetService<'a> {
        PasswordResetService {
            users,
            tokens,
            history,
            sessions,
            queue,
            crypto,
            clock,
            audit: Arc::new(ResilientAuditSink::new(Arc::new(crate::core::audit::fake::InMemoryAuditSink::default()))),
        }
    }

    #[tokio::test]
    async fn request_reset_queues_an_email_and_always_returns_the_same_message() {
        let users = InMemoryUserRepository::default();
        let tokens = InMemoryResetTokenRepository::default();
        let history = InMemoryPasswordHistoryRepository::default();
        let sessions = InMemorySessionRepository::default();
        let queue = InMemoryQueue::default();
        let crypto = InsecureTestCrypto;
        let clock = FakeClock::new(Utc::now());
        let now = clock.now();
        users.seed(User {
            id: "u1".into(),
            email: "alice@example.com".into(),
            password_hash: crypto.hash_password("old-pw").unwrap(),
            status: crate::core::user::UserStatus::Active,
            email_verified_at: Some(now),
            created_at: now,
            updated_at: now,
        });
        let svc = service(&users, &tokens, &history, &sessions, &queue, &crypto, &clock);

        let known = svc.request_password_reset("alice@example.com", None).await;
        let unknown = svc.request_password_reset("nobody@example.com", None).await;
        assert_eq!(known, unknown);
        assert!(queue.contains_type("PASSWORD_RESET_REQUESTED"));
    }

    #[tokio::test]
    async fn reset_rejects_recently_used_password() {
        let users = InMemoryUserRepository::default();
        let tokens = InMemoryResetTokenRepository::default();
        let history = InMemoryPasswordHistoryRepository::default();
        let sessions = InMemorySessionRepository::default();
        let queue = InMemoryQueue::default();
        let crypto = InsecureTestCrypto;
        let clock = FakeClock::new(Utc::now());
        let now = clock.now();
        users.seed(User {
            id: "u1".into(),
            email: "alice@example.com".into(),
            password_hash: crypto.hash_password("old-pw").unwrap(),
            status: crate::core::user::UserStatus::Active,
            email_verified_at: Some(now),
            created_at: now,
            updated_at: now,
        });
        let svc = service(&users, &tokens, &history, &sessions, &queue, &crypto, &clock);
        svc.request_password_reset("alice@example.com", None).await;
        let raw_token = queue.messages.lock().unwrap()[0].payload["token"].as_str().unwrap().to_string();

        let rejected = svc.reset_password(&raw_token, "old-pw").await;
        assert!(rejected.is_err());
    }
}
