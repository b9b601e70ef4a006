//! Auth Service (component I) — the login pipeline.
//!
//! Every branch of [`AuthService::login`] must still hit the 200ms deadline
//! (spec.md §4.I, §9 "Timing-attack protection... is a hard invariant").
//! `login` wraps the pipeline body in [`AuthService::with_min_duration`]
//! rather than threading a deadline through every early return.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::core::audit::{AuditEvent, ResilientAuditSink};
use crate::core::cache::{keys, FastCache};
use crate::core::clock::Clock;
use crate::core::crypto::CryptoService;
use crate::core::error::CoreError;
use crate::core::mfa::MfaConfigRepository;
use crate::core::rate_limit::RateLimiter;
use crate::core::rbac::{resolve_role_names, RoleRepository, UserRoleRepository};
use crate::core::security_events::{AlertSeverity, SecurityAlertRepository};
use crate::core::session::{RevokeReason, Session, SessionRepository};
use crate::core::token::{IssueTokenPair, TokenService};
use crate::core::user::{canonicalize_email, UserRepository, UserStatus};

pub const LOGIN_MIN_DURATION_MS: u64 = 200;
pub const LOGIN_RATE_LIMIT_PER_EMAIL: u64 = 5;
pub const LOGIN_RATE_LIMIT_PER_EMAIL_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const LOGIN_RATE_LIMIT_PER_IP: u64 = 20;
pub const LOGIN_RATE_LIMIT_PER_IP_WINDOW: Duration = Duration::from_secs(60 * 60);
pub const LOGIN_MAX_FAILURES: i64 = 10;
pub const LOGIN_LOCKOUT_MINUTES: i64 = 30;

/// Stable, enumeration-resistant wording for both "no such user" and "wrong
/// password" — spec.md §4.I "Error messages... must be byte-identical".
pub const INVALID_CREDENTIALS_MESSAGE: &str = "invalid email or password";

/// Argon2-encoded hash of a password nobody will ever type, verified against
/// on a missing-user lookup so the two branches cost the same CPU time.
const DECOY_PASSWORD_HASH: &str = "$argon2id$v=19$m=65536,t=3,p=4$ZGVjb3lzYWx0$ZGVjb3lkZWNveWRlY295ZGVjb3k";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginAttemptStatus {
    Success,
    FailedInvalidCredentials,
    FailedAccountLocked,
    FailedMfa,
    FailedRateLimited,
}

#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub user_id: Option<String>,
    pub email: String,
    pub status: LoginAttemptStatus,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait LoginAttemptRepository: Send + Sync {
    async fn insert(&self, attempt: LoginAttempt) -> Result<(), CoreError>;
}

#[derive(Debug, Clone)]
pub struct UserDevice {
    pub id: String,
    pub user_id: String,
    pub fingerprint: String,
    pub last_ip_address: Option<String>,
    pub last_used_at: DateTime<Utc>,
    pub is_trusted: bool,
}

#[async_trait]
pub trait DeviceRepository: Send + Sync {
    async fn find(&self, user_id: &str, fingerprint: &str) -> Result<Option<UserDevice>, CoreError>;
    async fn upsert(&self, device: UserDevice) -> Result<(), CoreError>;
}

pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub device_fingerprint: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub correlation_id: Option<String>,
    pub remember_me: bool,
}

pub enum LoginOutcome {
    MfaRequired { challenge_id: String },
    Success { token_pair: crate::core::token::TokenPair, user_id: String },
}

pub struct AuthService<'a> {
    pub users: &'a dyn UserRepository,
    pub sessions: &'a dyn SessionRepository,
    pub devices: &'a dyn DeviceRepository,
    pub attempts: &'a dyn LoginAttemptRepository,
    pub mfa_configs: &'a dyn MfaConfigRepository,
    pub roles: &'a dyn RoleRepository,
    pub user_roles: &'a dyn UserRoleRepository,
    pub alerts: &'a dyn SecurityAlertRepository,
    pub cache: &'a dyn FastCache,
    pub rate_limiter: &'a dyn RateLimiter,
    pub crypto: &'a dyn CryptoService,
    pub tokens: &'a dyn TokenService,
    pub clock: &'a dyn Clock,
    pub audit: Arc<ResilientAuditSink>,
}

impl<'a> AuthService<'a> {
    /// Runs `body`, then waits out whatever remains of the 200ms floor
    /// before returning — so the wall-clock cost is the same whether the
    /// pipeline fails at step 1 or step 10.
    async fn with_min_duration<T, F>(&self, body: F) -> T
    where
        F: Future<Output = T>,
    {
        let started = std::time::Instant::now();
        let result = body.await;
        let elapsed = started.elapsed();
        let floor = Duration::from_millis(LOGIN_MIN_DURATION_MS);
        if elapsed < floor {
            tokio::time::sleep(floor - elapsed).await;
        }
        result
    }

    pub async fn login(&self, input: LoginInput) -> Result<LoginOutcome, CoreError> {
        self.with_min_duration(self.login_inner(input)).await
    }

    async fn login_inner(&self, input: LoginInput) -> Result<LoginOutcome, CoreError> {
        let email_lower = canonicalize_email(&input.email);
        let now = self.clock.now();

        // Step 1: rate limits, both scopes must pass.
        let email_decision = self
            .rate_limiter
            .check("login:email", &email_lower, LOGIN_RATE_LIMIT_PER_EMAIL, LOGIN_RATE_LIMIT_PER_EMAIL_WINDOW, now)
            .await
            .map_err(|e| CoreError::internal(e.to_string()))?;
        let ip_decision = match &input.ip_address {
            Some(ip) => Some(
                self.rate_limiter
                    .check("login:ip", ip, LOGIN_RATE_LIMIT_PER_IP, LOGIN_RATE_LIMIT_PER_IP_WINDOW, now)
                    .await
                    .map_err(|e| CoreError::internal(e.to_string()))?,
            ),
            None => None,
        };
        if !email_decision.allowed || ip_decision.as_ref().is_some_and(|d| !d.allowed) {
            self.audit
                .log(AuditEvent::new("RATE_LIMIT_EXCEEDED", now).with_actor(&email_lower))
                .await;
            return Err(CoreError::too_many_requests("too many login attempts"));
        }

        // Step 2: user lookup, with decoy hashing on miss.
        let Some(user) = self.users.find_by_email(&email_lower).await? else {
            self.crypto.verify_password(DECOY_PASSWORD_HASH, &input.password);
            self.record_attempt(None, &email_lower, LoginAttemptStatus::FailedInvalidCredentials, &input, now).await;
            return Err(CoreError::unauthorized(INVALID_CREDENTIALS_MESSAGE));
        };

        // Step 3: account status.
        match user.status {
            UserStatus::Deleted => {
                self.crypto.verify_password(DECOY_PASSWORD_HASH, &input.password);
                self.record_attempt(None, &email_lower, LoginAttemptStatus::FailedInvalidCredentials, &input, now).await;
                return Err(CoreError::unauthorized(INVALID_CREDENTIALS_MESSAGE));
            }
            UserStatus::Suspended => {
                self.record_attempt(Some(&user.id), &email_lower, LoginAttemptStatus::FailedAccountLocked, &input, now).await;
                return Err(CoreError::forbidden("account is suspended"));
            }
            UserStatus::PendingVerification => {
                self.record_attempt(Some(&user.id), &email_lower, LoginAttemptStatus::FailedAccountLocked, &input, now).await;
                return Err(CoreError::forbidden("account is not verified"));
            }
            UserStatus::Active => {}
        }

        // Step 4: account lockout.
        let locked = self
            .cache
            .get(&keys::account_locked(&user.id))
            .await
            .map(|l| l.is_hit())
            .unwrap_or(false);
        if locked {
            self.record_attempt(Some(&user.id), &email_lower, LoginAttemptStatus::FailedAccountLocked, &input, now).await;
            return Err(CoreError::forbidden("account is locked"));
        }

        // Step 5: password verify.
        if !self.crypto.verify_password(&user.password_hash, &input.password) {
            self.handle_failed_password(&user.id, &email_lower, &input, now).await?;
            return Err(CoreError::unauthorized(INVALID_CREDENTIALS_MESSAGE));
        }

        // Step 6: clear failure counter.
        self.cache.delete(&keys::login_failures(&user.id)).await.ok();

        // Step 7: MFA branch — do not issue tokens yet, stash a challenge.
        if self.mfa_configs.find_by_user(&user.id).await?.is_some_and(|c| c.is_enabled) {
            let challenge_id = self.crypto.random_hex(16);
            let payload = serde_json::json!({
                "userId": user.id,
                "email": email_lower,
                "deviceFingerprint": input.device_fingerprint,
                "ipAddress": input.ip_address,
                "userAgent": input.user_agent,
                "rememberMe": input.remember_me,
            })
            .to_string();
            self.cache
                .set(&keys::mfa_challenge(&challenge_id), &payload, Duration::from_secs(300))
                .await
                .map_err(|e| CoreError::internal(e.to_string()))?;
            self.audit.log(AuditEvent::new("MFA_CHALLENGE_SUCCESS", now).with_user(&user.id)).await;
            return Ok(LoginOutcome::MfaRequired { challenge_id });
        }

        // Step 9: concurrent session cap enforced by caller's SessionService
        // before invoking token issuance — kept out of this struct to avoid
        // a circular dependency between Auth and Session.

        // Step 10: issue tokens.
        let role_names = resolve_role_names(self.user_roles, self.roles, &user.id, now).await?;
        let token_family = self.crypto.random_hex(16);
        let session_id = self.crypto.random_hex(16);
        let pair = self.tokens.generate_token_pair(IssueTokenPair {
            user_id: &user.id,
            session_id: &session_id,
            roles: role_names,
            org_id: None,
            token_family: &token_family,
            remember_me: input.remember_me,
            now,
        })?;

        let session = Session {
            id: session_id,
            user_id: user.id.clone(),
            access_token_hash: self.tokens.get_token_hash(&pair.access_token),
            refresh_token_hash: self.tokens.get_token_hash(&pair.refresh_token),
            token_family,
            device_fingerprint: input.device_fingerprint.clone(),
            user_agent: input.user_agent.clone(),
            ip_address: input.ip_address.clone(),
            geo: None,
            is_remembered: input.remember_me,
            last_activity_at: now,
            expires_at: pair.refresh_expires_at,
            revoked_at: None,
            revoke_reason: None,
            created_at: now,
        };
        self.sessions.insert(session).await?;

        if let Some(fingerprint) = &input.device_fingerprint {
            self.record_device(&user.id, fingerprint, &input, now).await?;
        }

        self.record_attempt(Some(&user.id), &email_lower, LoginAttemptStatus::Success, &input, now).await;
        self.audit.log(AuditEvent::new("LOGIN_SUCCESS", now).with_user(&user.id)).await;

        Ok(LoginOutcome::Success { token_pair: pair, user_id: user.id })
    }

    async fn handle_failed_password(&self, user_id: &str, email_lower: &str, input: &LoginInput, now: DateTime<Utc>) -> Result<(), CoreError> {
        let count = self
            .cache
            .increment(&keys::login_failures(user_id), Duration::from_secs(30 * 60))
            .await
            .map_err(|e| CoreError::internal(e.to_string()))?;
        if count >= LOGIN_MAX_FAILURES {
            self.cache
                .set(&keys::account_locked(user_id), "1", Duration::from_secs((LOGIN_LOCKOUT_MINUTES * 60) as u64))
                .await
                .ok();
            self.audit.log(AuditEvent::new("ACCOUNT_LOCKED", now).with_user(user_id)).await;
            crate::core::security_events::create_alert(
                self.alerts,
                self.cache,
                self.clock,
                &self.audit,
                Some(user_id),
                "ACCOUNT_LOCKED",
                AlertSeverity::High,
                input.ip_address.clone(),
                "account locked after repeated failed login attempts",
                serde_json::Value::Null,
            )
            .await
            .ok();
        }
        self.audit.log(AuditEvent::new("LOGIN_FAILED", now).with_user(user_id)).await;
        self.record_attempt(Some(user_id), email_lower, LoginAttemptStatus::FailedInvalidCredentials, input, now).await;
        Ok(())
    }

    async fn record_device(&self, user_id: &str, fingerprint: &str, input: &LoginInput, now: DateTime<Utc>) -> Result<(), CoreError> {
        match self.devices.find(user_id, fingerprint).await? {
            None => {
                self.devices
                    .upsert(UserDevice {
                        id: self.crypto.random_hex(8),
                        user_id: user_id.to_string(),
                        fingerprint: fingerprint.to_string(),
                        last_ip_address: input.ip_address.clone(),
                        last_used_at: now,
                        is_trusted: false,
                    })
                    .await?;
                self.audit.log(AuditEvent::new("NEW_DEVICE_LOGIN", now).with_user(user_id)).await;
                crate::core::security_events::create_alert(
                    self.alerts,
                    self.cache,
                    self.clock,
                    &self.audit,
                    Some(user_id),
                    "NEW_DEVICE_LOGIN",
                    AlertSeverity::Medium,
                    input.ip_address.clone(),
                    "login from a previously unseen device",
                    serde_json::Value::Null,
                )
                .await
                .ok();
            }
            Some(mut device) => {
                if !device.is_trusted {
                    device.last_used_at = now;
                    device.last_ip_address = input.ip_address.clone();
                    self.devices.upsert(device).await?;
                }
            }
        }
        Ok(())
    }

    async fn record_attempt(&self, user_id: Option<&str>, email_lower: &str, status: LoginAttemptStatus, input: &LoginInput, now: DateTime<Utc>) {
        self.attempts
            .insert(LoginAttempt {
                user_id: user_id.map(str::to_string),
                email: email_lower.to_string(),
                status,
                ip_address: input.ip_address.clone(),
                user_agent: input.user_agent.clone(),
                created_at: now,
            })
            .await
            .ok();
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryLoginAttemptRepository {
        pub attempts: Mutex<Vec<LoginAttempt>>,
    }

    #[async_trait]
    impl LoginAttemptRepository for InMemoryLoginAttemptRepository {
        async fn insert(&self, attempt: LoginAttempt) -> Result<(), CoreError> {
            self.attempts.lock().unwrap().push(attempt);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct InMemoryDeviceRepository {
        pub devices: Mutex<Vec<UserDevice>>,
    }

    #[async_trait]
    impl DeviceRepository for InMemoryDeviceRepository {
        async fn find(&self, user_id: &str, fingerprint: &str) -> Result<Option<UserDevice>, CoreError> {
            Ok(self
                .devices
                .lock()
                .unwrap()
                .iter()
                .find(|d| d.user_id == user_id && d.fingerprint == fingerprint)
                .cloned())
        }

        async fn upsert(&self, device: UserDevice) -> Result<(), CoreError> {
            let mut devices = self.devices.lock().unwrap();
            if let Some(existing) = devices.iter_mut().find(|d| d.id == device.id) {
                *existing = device;
            } else {
                devices.push(device);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::*;
    use super::*;
    use crate::core::cache::fake::InMemoryFastCache;
    use crate::core::clock::fake::FakeClock;
    use crate::core::crypto::fake::InsecureTestCrypto;
    use crate::core::mfa::fake::InMemoryMfaConfigRepository;
    use crate::core::rate_limit::fake::InMemoryRateLimiter;
    use crate::core::rbac::fake::{InMemoryRoleRepository, InMemoryUserRoleRepository};
    use crate::core::security_events::fake::InMemoryAlertRepository;
    use crate::core::session::fake::InMemorySessionRepository;
    use crate::core::token::fake::FakeTokenService;
    use crate::core::user::{fake::InMemoryUserRepository, User, UserStatus};

    fn seeded_user(crypto: &InsecureTestCrypto, now: DateTime<Utc>) -> User {
        User {
            id: "u1".into(),
            email: "alice@example.com".into(),
            password_hash: crypto.hash_password("correct-horse").unwrap(),
            status: UserStatus::Active,
            email_verified_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    fn base_input(email: &str, password: &str) -> LoginInput {
        LoginInput {
            email: email.into(),
            password: password.into(),
            device_fingerprint: Some("fp1".into()),
            ip_address: Some("1.2.3.4".into()),
            user_agent: Some("test-agent".into()),
            correlation_id: None,
            remember_me: false,
        }
    }

    #[tokio::test]
    async fn wrong_password_and_missing_user_return_identical_errors() {
        let users = InMemoryUserRepository::default();
        let sessions = InMemorySessionRepository::default();
        let devices = InMemoryDeviceRepository::default();
        let attempts = InMemoryLoginAttemptRepository::default();
        let mfa_configs = InMemoryMfaConfigRepository::default();
        let cache = InMemoryFastCache::default();
        let rate_limiter = InMemoryRateLimiter::default();
        let crypto = InsecureTestCrypto;
        let tokens = FakeTokenService::default();
        let clock = FakeClock::new(Utc::now());
        let roles = InMemoryRoleRepository::default();
        let user_roles = InMemoryUserRoleRepository::default();
        let alerts = InMemoryAlertRepository::default();
        users.seed(seeded_user(&crypto, clock.now()));

        let svc = AuthService {
            users: &users,
            sessions: &sessions,
            devices: &devices,
            attempts: &attempts,
            mfa_configs: &mfa_configs,
            roles: &roles,
            user_roles: &user_roles,
            alerts: &alerts,
            cache: &cache,
            rate_limiter: &rate_limiter,
            crypto: &crypto,
            tokens: &tokens,
            clock: &clock,
            audit: Arc::new(ResilientAuditSink::new(Arc::new(crate::core::audit::fake::InMemoryAuditSink::default()))),
        };

        let wrong_password = svc.login(base_input("alice@example.com", "bad")).await.unwrap_err();
        let missing_user = svc.login(base_input("nobody@example.com", "bad")).await.unwrap_err();
        assert_eq!(wrong_password.message(), missing_user.message());
        assert_eq!(wrong_password.code(), missing_user.code());
    }

    #[tokio::test]
    async fn successful_login_issues_tokens_and_creates_session() {
        let users = InMemoryUserRepository::default();
        let sessions = InMemorySessionRepository::default();
        let devices = InMemoryDeviceRepository::default();
        let attempts = InMemoryLoginAttemptRepository::default();
        let mfa_configs = InMemoryMfaConfigRepository::default();
        let cache = InMemoryFastCache::default();
        let rate_limiter = InMemoryRateLimiter::default();
        let crypto = InsecureTestCrypto;
        let tokens = FakeTokenService::default();
        let clock = FakeClock::new(Utc::now());
        let roles = InMemoryRoleRepository::default();
        let user_roles = InMemoryUserRoleRepository::default();
        let alerts = InMemoryAlertRepository::default();
        users.seed(seeded_user(&crypto, clock.now()));

        let svc = AuthService {
            users: &users,
            sessions: &sessions,
            devices: &devices,
            attempts: &attempts,
            mfa_configs: &mfa_configs,
            roles: &roles,
            user_roles: &user_roles,
            alerts: &alerts,
            cache: &cache,
            rate_limiter: &rate_limiter,
            crypto: &crypto,
            tokens: &tokens,
            clock: &clock,
            audit: Arc::new(ResilientAuditSink::new(Arc::new(crate::core::audit::fake::InMemoryAuditSink::default()))),
        };

        let outcome = svc.login(base_input("ALICE@example.com", "correct-horse")).await.unwrap();
        match outcome {
            LoginOutcome::Success { user_id, .. } => assert_eq!(user_id, "u1"),
            LoginOutcome::MfaRequired { .. } => panic!("expected direct success"),
        }
        assert_eq!(sessions.sessions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tenth_failure_locks_the_account() {
        let users = InMemoryUserRepository::default();
        let sessions = InMemorySessionRepository::default();
        let devices = InMemoryDeviceRepository::default();
        let attempts = InMemoryLoginAttemptRepository::default();
        let mfa_configs = InMemoryMfaConfigRepository::default();
        let cache = InMemoryFastCache::default();
        let rate_limiter = InMemoryRateLimiter::default();
        let crypto = InsecureTestCrypto;
        let tokens = FakeTokenService::default();
        let clock = FakeClock::new(Utc::now());
        let roles = InMemoryRoleRepository::default();
        let user_roles = InMemoryUserRoleRepository::default();
        let alerts = InMemoryAlertRepository::default();
        users.seed(seeded_user(&crypto, clock.now()));

        let svc = AuthService {
            users: &users,
            sessions: &sessions,
            devices: &devices,
            attempts: &attempts,
            mfa_configs: &mfa_configs,
            roles: &roles,
            user_roles: &user_roles,
            alerts: &alerts,
            cache: &cache,
            rate_limiter: &rate_limiter,
            crypto: &crypto,
            tokens: &tokens,
            clock: &clock,
            audit: Arc::new(ResilientAuditSink::new(Arc::new(crate::core::audit::fake::InMemoryAuditSink::default()))),
        };

        // Pre-seed 9 prior failures directly on the cache counter (as if they
        // happened across earlier rate-limit windows) so this single login
        // call is the 10th failure without itself tripping the per-email
        // rate limit (5 per 15 min).
        for _ in 0..9 {
            cache.increment(&keys::login_failures("u1"), Duration::from_secs(1800)).await.unwrap();
        }
        let tenth = svc.login(base_input("alice@example.com", "bad")).await;
        assert!(tenth.is_err());
        assert!(cache.get(&keys::account_locked("u1")).await.unwrap().is_hit());
    }
}
