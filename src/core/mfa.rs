//! MFA Service and Backup Codes Service (components G, H).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::core::audit::{AuditEvent, ResilientAuditSink};
use crate::core::cache::{keys, CacheLookup, FastCache};
use crate::core::clock::Clock;
use crate::core::crypto::CryptoService;
use crate::core::error::CoreError;
use crate::core::security_events::{AlertSeverity, SecurityAlertRepository};
use crate::core::totp::TotpService;

pub const MFA_MAX_FAILED_ATTEMPTS: u32 = 5;
pub const MFA_LOCKOUT_MINUTES: i64 = 30;
pub const MFA_CHALLENGE_MAX_ATTEMPTS: u32 = 3;
pub const MFA_CHALLENGE_TTL_SECONDS: i64 = 300;
pub const MFA_SETUP_TTL_SECONDS: i64 = 600;
pub const BACKUP_CODE_COUNT: usize = 10;
pub const BACKUP_CODES_LOW_WATERMARK: usize = 2;

#[derive(Debug, Clone)]
pub struct MfaConfiguration {
    pub user_id: String,
    pub secret_encrypted: String,
    pub is_enabled: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl MfaConfiguration {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|t| t > now)
    }
}

#[derive(Debug, Clone)]
pub struct MfaChallenge {
    pub id: String,
    pub challenge_token: String,
    pub user_id: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
}

impl MfaChallenge {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.completed_at.is_none() && self.attempts < self.max_attempts && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct MfaBackupCode {
    pub id: String,
    pub user_id: String,
    pub code_hash: String,
    pub used_at: Option<DateTime<Utc>>,
    pub used_ip_address: Option<String>,
    pub used_user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MfaStatus {
    pub is_enabled: bool,
    pub is_verified: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub backup_codes_remaining: usize,
    pub created_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait MfaConfigRepository: Send + Sync {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<MfaConfiguration>, CoreError>;
    async fn upsert(&self, config: MfaConfiguration) -> Result<(), CoreError>;
    async fn delete(&self, user_id: &str) -> Result<(), CoreError>;
}

#[async_trait]
pub trait MfaChallengeRepository: Send + Sync {
    async fn insert(&self, challenge: MfaChallenge) -> Result<(), CoreError>;
    async fn find_by_token(&self, challenge_token: &str) -> Result<Option<MfaChallenge>, CoreError>;
    async fn update(&self, challenge: MfaChallenge) -> Result<(), CoreError>;
    async fn delete(&self, id: &str) -> Result<(), CoreError>;
    async fn delete_expired_for_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<(), CoreError>;
}

#[async_trait]
pub trait BackupCodeRepository: Send + Sync {
    async fn replace_all(&self, user_id: &str, codes: Vec<MfaBackupCode>) -> Result<(), CoreError>;
    async fn find_unused(&self, user_id: &str) -> Result<Vec<MfaBackupCode>, CoreError>;
    async fn find_used(&self, user_id: &str) -> Result<Vec<MfaBackupCode>, CoreError>;
    async fn mark_used(&self, code_id: &str, now: DateTime<Utc>, ip: Option<String>, ua: Option<String>) -> Result<(), CoreError>;
}

pub struct MfaSetupResult {
    pub setup_token: String,
    pub provisioning_uri: String,
    pub expires_at: DateTime<Utc>,
}

pub struct MfaService<'a> {
    pub configs: &'a dyn MfaConfigRepository,
    pub challenges: &'a dyn MfaChallengeRepository,
    pub backup_codes: &'a dyn BackupCodeRepository,
    pub alerts: &'a dyn SecurityAlertRepository,
    pub cache: &'a dyn FastCache,
    pub crypto: &'a dyn CryptoService,
    pub totp: &'a dyn TotpService,
    pub clock: &'a dyn Clock,
    pub audit: Arc<ResilientAuditSink>,
}

impl<'a> MfaService<'a> {
    pub async fn status(&self, user_id: &str) -> Result<MfaStatus, CoreError> {
        let config = self.configs.find_by_user(user_id).await?;
        let remaining = self.backup_codes.find_unused(user_id).await?.len();
        Ok(match config {
            Some(c) => MfaStatus {
                is_enabled: c.is_enabled,
                is_verified: c.verified_at.is_some(),
                last_used_at: c.last_used_at,
                backup_codes_remaining: remaining,
                created_at: c.verified_at,
            },
            None => MfaStatus {
                is_enabled: false,
                is_verified: false,
                last_used_at: None,
                backup_codes_remaining: 0,
                created_at: None,
            },
        })
    }

    /// Setup initiation — spec.md §4.G. Caller is responsible for the
    /// password-re-verification precondition before invoking this.
    pub async fn initiate_setup(&self, user_id: &str, email: &str, issuer: &str) -> Result<MfaSetupResult, CoreError> {
        if let Some(existing) = self.configs.find_by_user(user_id).await? {
            if existing.is_enabled {
                return Err(CoreError::conflict("MFA is already enabled"));
            }
            self.configs.delete(user_id).await?;
        }

        let secret = self.totp.generate_secret(email, issuer);
        let setup_token = self.crypto.random_hex(32);
        let now = self.clock.now();
        let payload = serde_json::json!({"secret": secret.base32_secret, "userId": user_id}).to_string();
        self.cache
            .set(&keys::mfa_setup(&setup_token), &payload, std::time::Duration::from_secs(MFA_SETUP_TTL_SECONDS as u64))
            .await
            .map_err(|e| CoreError::internal(e.to_string()))?;

        self.audit
            .log(AuditEvent::new("MFA_SETUP_INITIATED", now).with_user(user_id))
            .await;

        Ok(MfaSetupResult {
            setup_token,
            provisioning_uri: secret.provisioning_uri,
            expires_at: now + chrono::Duration::seconds(MFA_SETUP_TTL_SECONDS),
        })
    }

    /// Setup verification — returns plaintext backup codes exactly once.
    pub async fn verify_setup(&self, setup_token: &str, code: &str) -> Result<Vec<String>, CoreError> {
        let lookup = self
            .cache
            .get(&keys::mfa_setup(setup_token))
            .await
            .map_err(|e| CoreError::internal(e.to_string()))?;
        let CacheLookup::Hit(payload) = lookup else {
            return Err(CoreError::not_found("setup token not found or expired"));
        };
        let parsed: serde_json::Value = serde_json::from_str(&payload).map_err(|e| CoreError::internal(e.to_string()))?;
        let secret = parsed["secret"].as_str().ok_or_else(|| CoreError::internal("malformed setup payload"))?;
        let user_id = parsed["userId"].as_str().ok_or_else(|| CoreError::internal("malformed setup payload"))?;

        let now = self.clock.now();
        if !self.totp.verify_token(secret, code, now) {
            return Err(CoreError::bad_request("invalid verification code"));
        }

        let encrypted = self.crypto.encrypt_secret(secret.as_bytes())?;
        self.configs
            .upsert(MfaConfiguration {
                user_id: user_id.to_string(),
                secret_encrypted: encrypted,
                is_enabled: true,
                verified_at: Some(now),
                last_used_at: None,
                failed_attempts: 0,
                locked_until: None,
            })
            .await?;

        let batch = self.totp.generate_backup_codes(BACKUP_CODE_COUNT);
        let mut rows = Vec::with_capacity(batch.plaintext_codes.len());
        for plaintext in &batch.plaintext_codes {
            rows.push(MfaBackupCode {
                id: self.crypto.random_hex(16),
                user_id: user_id.to_string(),
                code_hash: self.totp.hash_backup_code(plaintext)?,
                used_at: None,
                used_ip_address: None,
                used_user_agent: None,
                created_at: now,
            });
        }
        self.backup_codes.replace_all(user_id, rows).await?;
        self.cache.delete(&keys::mfa_setup(setup_token)).await.ok();

        self.audit.log(AuditEvent::new("MFA_ENABLED", now).with_user(user_id)).await;

        Ok(batch.plaintext_codes)
    }

    pub async fn disable(&self, user_id: &str) -> Result<(), CoreError> {
        self.configs.delete(user_id).await?;
        self.backup_codes.replace_all(user_id, vec![]).await?;
        let now = self.clock.now();
        self.challenges.delete_expired_for_user(user_id, now + chrono::Duration::days(365)).await?;
        self.audit.log(AuditEvent::new("MFA_DISABLED", now).with_user(user_id)).await;
        Ok(())
    }

    pub async fn create_challenge(&self, user_id: &str, ip_address: Option<String>) -> Result<MfaChallenge, CoreError> {
        let config = self
            .configs
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("MFA not enabled"))?;
        if !config.is_enabled {
            return Err(CoreError::not_found("MFA not enabled"));
        }
        let now = self.clock.now();
        if config.is_locked(now) {
            return Err(CoreError::too_many_requests("MFA is locked, try again later"));
        }
        self.challenges.delete_expired_for_user(user_id, now).await?;

        let challenge = MfaChallenge {
            id: self.crypto.random_hex(16),
            challenge_token: self.crypto.random_hex(32),
            user_id: user_id.to_string(),
            attempts: 0,
            max_attempts: MFA_CHALLENGE_MAX_ATTEMPTS,
            expires_at: now + chrono::Duration::seconds(MFA_CHALLENGE_TTL_SECONDS),
            completed_at: None,
            ip_address,
        };
        self.challenges.insert(challenge.clone()).await?;
        Ok(challenge)
    }

    /// Verify TOTP against an in-flight challenge — spec.md §4.G.
    pub async fn verify_totp(&self, challenge_token: &str, code: &str) -> Result<(), CoreError> {
        let mut challenge = self
            .challenges
            .find_by_token(challenge_token)
            .await?
            .ok_or_else(|| CoreError::not_found("challenge not found"))?;
        let now = self.clock.now();
        if !challenge.is_usable(now) {
            return Err(CoreError::bad_request("challenge is no longer usable"));
        }
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::bad_request("code must be 6 digits"));
        }

        let mut config = self
            .configs
            .find_by_user(&challenge.user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("MFA not enabled"))?;
        let plaintext_secret = self.crypto.decrypt_secret(&config.secret_encrypted)?;
        let secret = String::from_utf8(plaintext_secret).map_err(|e| CoreError::internal(e.to_string()))?;

        if self.totp.verify_token(&secret, code, now) {
            challenge.completed_at = Some(now);
            self.challenges.update(challenge).await?;
            config.last_used_at = Some(now);
            config.failed_attempts = 0;
            config.locked_until = None;
            self.configs.upsert(config).await?;
            self.audit
                .log(AuditEvent::new("MFA_VERIFIED", now).with_user(&challenge.user_id))
                .await;
            return Ok(());
        }

        challenge.attempts += 1;
        config.failed_attempts += 1;
        let mut locked_out = false;
        if config.failed_attempts >= MFA_MAX_FAILED_ATTEMPTS {
            config.locked_until = Some(now + chrono::Duration::minutes(MFA_LOCKOUT_MINUTES));
            locked_out = true;
        }
        self.configs.upsert(config).await?;

        if locked_out {
            self.audit
                .log(AuditEvent::new("ACCOUNT_LOCKED", now).with_user(&challenge.user_id))
                .await;
            crate::core::security_events::create_alert(
                self.alerts,
                self.cache,
                self.clock,
                &self.audit,
                Some(&challenge.user_id),
                "ACCOUNT_LOCKED",
                AlertSeverity::High,
                challenge.ip_address.clone(),
                "MFA locked after repeated failed verification attempts",
                serde_json::Value::Null,
            )
            .await
            .ok();
        }

        if challenge.attempts >= challenge.max_attempts {
            self.challenges.delete(&challenge.id).await?;
            return Err(CoreError::too_many_requests("too many failed MFA attempts"));
        }
        self.challenges.update(challenge.clone()).await?;
        self.audit
            .log(AuditEvent::new("MFA_VERIFICATION_FAILED", now).with_user(&challenge.user_id))
            .await;
        Err(CoreError::bad_request("invalid verification code"))
    }

    /// Verify a backup code against an in-flight challenge — spec.md §4.G.
    pub async fn verify_backup_code(&self, challenge_token: &str, code: &str) -> Result<usize, CoreError> {
        let mut challenge = self
            .challenges
            .find_by_token(challenge_token)
            .await?
            .ok_or_else(|| CoreError::not_found("challenge not found"))?;
        let now = self.clock.now();
        if !challenge.is_usable(now) {
            return Err(CoreError::bad_request("challenge is no longer usable"));
        }

        let remaining = self.verify_direct(&challenge.user_id, code, None, None).await?;

        challenge.completed_at = Some(now);
        self.challenges.update(challenge).await?;
        Ok(remaining)
    }

    /// Out-of-band backup-code verification, also used by the Backup Codes
    /// Service (§4.H) directly without a challenge in play.
    pub async fn verify_direct(&self, user_id: &str, code: &str, ip_address: Option<String>, user_agent: Option<String>) -> Result<usize, CoreError> {
        let candidate = code.to_uppercase();
        let unused = self.backup_codes.find_unused(user_id).await?;
        let now = self.clock.now();
        let mut matched_id = None;
        for row in &unused {
            if self.totp.verify_backup_code(&row.code_hash, &candidate) {
                matched_id = Some(row.id.clone());
                break;
            }
        }
        let Some(matched_id) = matched_id else {
            return Err(CoreError::bad_request("invalid backup code"));
        };
        self.backup_codes.mark_used(&matched_id, now, ip_address, user_agent).await?;
        let remaining = unused.len() - 1;
        self.audit
            .log(
                AuditEvent::new("MFA_BACKUP_CODE_USED", now)
                    .with_user(user_id)
                    .with_metadata(serde_json::json!({"backupCodesRemaining": remaining})),
            )
            .await;
        Ok(remaining)
    }

    pub async fn regenerate_backup_codes(&self, user_id: &str) -> Result<Vec<String>, CoreError> {
        let batch = self.totp.generate_backup_codes(BACKUP_CODE_COUNT);
        let now = self.clock.now();
        let mut rows = Vec::with_capacity(batch.plaintext_codes.len());
        for plaintext in &batch.plaintext_codes {
            rows.push(MfaBackupCode {
                id: self.crypto.random_hex(16),
                user_id: user_id.to_string(),
                code_hash: self.totp.hash_backup_code(plaintext)?,
                used_at: None,
                used_ip_address: None,
                used_user_agent: None,
                created_at: now,
            });
        }
        self.backup_codes.replace_all(user_id, rows).await?;
        self.audit
            .log(AuditEvent::new("MFA_BACKUP_CODES_REGENERATED", now).with_user(user_id))
            .await;
        Ok(batch.plaintext_codes)
    }
}

/// Backup Codes Service (§4.H) — a thin view over the same repository the
/// MFA service owns.
pub struct BackupCodesService<'a> {
    pub configs: &'a dyn MfaConfigRepository,
    pub backup_codes: &'a dyn BackupCodeRepository,
}

#[derive(Debug, Clone)]
pub struct BackupCodesStatus {
    pub is_enabled: bool,
    pub total_codes: usize,
    pub remaining_codes: usize,
    pub used_codes: usize,
    pub last_used_at: Option<DateTime<Utc>>,
    pub should_regenerate: bool,
}

impl<'a> BackupCodesService<'a> {
    pub async fn get_status(&self, user_id: &str) -> Result<BackupCodesStatus, CoreError> {
        let config = self.configs.find_by_user(user_id).await?;
        let unused = self.backup_codes.find_unused(user_id).await?;
        let used = self.backup_codes.find_used(user_id).await?;
        let remaining = unused.len();
        Ok(BackupCodesStatus {
            is_enabled: config.as_ref().is_some_and(|c| c.is_enabled),
            total_codes: remaining + used.len(),
            remaining_codes: remaining,
            used_codes: used.len(),
            last_used_at: used.iter().filter_map(|c| c.used_at).max(),
            should_regenerate: remaining <= BACKUP_CODES_LOW_WATERMARK,
        })
    }

    pub async fn list_used_codes(&self, user_id: &str, page: usize, limit: usize) -> Result<(Vec<MfaBackupCode>, usize), CoreError> {
        let mut used = self.backup_codes.find_used(user_id).await?;
        used.sort_by(|a, b| b.used_at.cmp(&a.used_at));
        let total = used.len();
        let start = (page.saturating_sub(1)) * limit;
        let page_rows = used.into_iter().skip(start).take(limit).collect();
        Ok((page_rows, total.div_ceil(limit.max(1))))
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryMfaConfigRepository {
        pub configs: Mutex<Vec<MfaConfiguration>>,
    }

    #[async_trait]
    impl MfaConfigRepository for InMemoryMfaConfigRepository {
        async fn find_by_user(&self, user_id: &str) -> Result<Option<MfaConfiguration>, CoreError> {
            Ok(self.configs.lock().unwrap().iter().find(|c| c.user_id == user_id).cloned())
        }

        async fn upsert(&self, config: MfaConfiguration) -> Result<(), CoreError> {
            let mut configs = self.configs.lock().unwrap();
            if let Some(existing) = configs.iter_mut().find(|c| c.user_id == config.user_id) {
                *existing = config;
            } else {
                configs.push(config);
            }
            Ok(())
        }

        async fn delete(&self, user_id: &str) -> Result<(), CoreError> {
            self.configs.lock().unwrap().retain(|c| c.user_id != user_id);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct InMemoryMfaChallengeRepository {
        pub challenges: Mutex<Vec<MfaChallenge>>,
    }

    #[async_trait]
    impl MfaChallengeRepository for InMemoryMfaChallengeRepository {
        async fn insert(&self, challenge: MfaChallenge) -> Result<(), CoreError> {
            self.challenges.lock().unwrap().push(challenge);
            Ok(())
        }

        async fn find_by_token(&self, challenge_token: &str) -> Result<Option<MfaChallenge>, CoreError> {
            Ok(self
                .challenges
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.challenge_token == challenge_token)
                .cloned())
        }

        async fn update(&self, challenge: MfaChallenge) -> Result<(), CoreError> {
            let mut challenges = self.challenges.lock().unwrap();
            if let Some(existing) = challenges.iter_mut().find(|c| c.id == challenge.id) {
                *existing = challenge;
            }
            Ok(())
        }

        async fn delete(&self, id: &str) -> Result<(), CoreError> {
            self.challenges.lock().unwrap().retain(|c| c.id != id);
            Ok(())
        }

        async fn delete_expired_for_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<(), CoreError> {
            self.challenges
                .lock()
                .unwrap()
                .retain(|c| c.user_id != user_id || c.expires_at >= now);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct InMemoryBackupCodeRepository {
        pub codes: Mutex<Vec<MfaBackupCode>>,
    }

    #[async_trait]
    impl BackupCodeRepository for InMemoryBackupCodeRepository {
        async fn replace_all(&self, user_id: &str, codes: Vec<MfaBackupCode>) -> Result<(), CoreError> {
            let mut all = self.codes.lock().unwrap();
            all.retain(|c| c.user_id != user_id);
            all.extend(codes);
            Ok(())
        }

        async fn find_unused(&self, user_id: &str) -> Result<Vec<MfaBackupCode>, CoreError> {
            Ok(self
                .codes
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.user_id == user_id && c.used_at.is_none())
                .cloned()
                .collect())
        }

        async fn find_used(&self, user_id: &str) -> Result<Vec<MfaBackupCode>, CoreError> {
            Ok(self
                .codes
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.user_id == user_id && c.used_at.is_some())
                .cloned()
                .collect())
        }

        async fn mark_used(&self, code_id: &str, now: DateTime<Utc>, ip: Option<String>, ua: Option<String>) -> Result<(), CoreError> {
            let mut codes = self.codes.lock().unwrap();
            let row = codes
                .iter_mut()
                .find(|c| c.id == code_id)
                .ok_or_else(|| CoreError::not_found("backup code not found"))?;
            row.used_at = Some(now);
            row.used_ip_address = ip;
            row.used_user_agent = ua;
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
    use crate::core::security_events::fake::InMemoryAlertRepository;
    use crate::core::totp::fake::FakeTotpService;

    fn service<'a>(
        configs: &'a InMemoryMfaConfigRepository,
        challenges: &'a InMemoryMfaChallengeRepository,
        backup_codes: &'a InMemoryBackupCodeRepository,
        alerts: &'a InMemoryAlertRepository,
        cache: &'a InMemoryFastCache,
        crypto: &'a InsecureTestCrypto,
        totp: &'a FakeTotpService,
        clock: &'a FakeClock,
    ) -> MfaService<'a> {
        MfaService {
            configs,
            challenges,
            backup_codes,
            alerts,
            cache,
            crypto,
            totp,
            clock,
            audit: Arc::new(ResilientAuditSink::new(Arc::new(crate::core::audit::fake::InMemoryAuditSink::default()))),
        }
    }

    #[tokio::test]
    async fn setup_then_verify_enables_mfa_and_issues_backup_codes() {
        let configs = InMemoryMfaConfigRepository::default();
        let challenges = InMemoryMfaChallengeRepository::default();
        let backup_codes = InMemoryBackupCodeRepository::default();
        let alerts = InMemoryAlertRepository::default();
        let cache = InMemoryFastCache::default();
        let crypto = InsecureTestCrypto;
        let totp = FakeTotpService;
        let clock = FakeClock::new(Utc::now());
        let svc = service(&configs, &challenges, &backup_codes, &alerts, &cache, &crypto, &totp, &clock);

        let setup = svc.initiate_setup("u1", "u1@example.com", "Agora").await.unwrap();
        let codes = svc.verify_setup(&setup.setup_token, "000000").await.unwrap();
        assert_eq!(codes.len(), BACKUP_CODE_COUNT);

        let config = configs.find_by_user("u1").await.unwrap().unwrap();
        assert!(config.is_enabled);
    }

    #[tokio::test]
    async fn fifth_failed_verify_locks_mfa_for_thirty_minutes() {
        let configs = InMemoryMfaConfigRepository::default();
        let challenges = InMemoryMfaChallengeRepository::default();
        let backup_codes = InMemoryBackupCodeRepository::default();
        let alerts = InMemoryAlertRepository::default();
        let cache = InMemoryFastCache::default();
        let crypto = InsecureTestCrypto;
        let totp = FakeTotpService;
        let clock = FakeClock::new(Utc::now());
        let svc = service(&configs, &challenges, &backup_codes, &alerts, &cache, &crypto, &totp, &clock);

        let now = clock.now();
        configs
            .upsert(MfaConfiguration {
                user_id: "u1".into(),
                secret_encrypted: crypto.encrypt_secret(b"JBSWY3DPEHPK3PXP").unwrap(),
                is_enabled: true,
                verified_at: Some(now),
                last_used_at: None,
                failed_attempts: 0,
                locked_until: None,
            })
            .await
            .unwrap();

        for i in 0..3 {
            let challenge = svc.create_challenge("u1", None).await.unwrap();
            let result = svc.verify_totp(&challenge.challenge_token, "999999").await;
            assert!(result.is_err(), "attempt {i} should fail");
        }
        // Two more challenges to accumulate the 5th config-level failure
        // (3 attempts are consumed per challenge cap of 3; two challenges already spent).
        for _ in 0..2 {
            let challenge = svc.create_challenge("u1", None).await.unwrap();
            let _ = svc.verify_totp(&challenge.challenge_token, "999999").await;
        }

        let config = configs.find_by_user("u1").await.unwrap().unwrap();
        assert!(config.is_locked(now));
    }

    #[tokio::test]
    async fn backup_code_is_single_use() {
        let configs = InMemoryMfaConfigRepository::default();
        let challenges = InMemoryMfaChallengeRepository::default();
        let backup_codes = InMemoryBackupCodeRepository::default();
        let alerts = InMemoryAlertRepository::default();
        let cache = InMemoryFastCache::default();
        let crypto = InsecureTestCrypto;
        let totp = FakeTotpService;
        let clock = FakeClock::new(Utc::now());
        let svc = service(&configs, &challenges, &backup_codes, &alerts, &cache, &crypto, &totp, &clock);

        backup_codes
            .replace_all(
                "u1",
                vec![MfaBackupCode {
                    id: "c1".into(),
                    user_id: "u1".into(),
                    code_hash: totp.hash_backup_code("ABCD1234").unwrap(),
                    used_at: None,
                    used_ip_address: None,
                    used_user_agent: None,
                    created_at: clock.now(),
                }],
            )
            .await
            .unwrap();

        let remaining = svc.verify_direct("u1", "abcd1234", Some("10.0.0.1".into()), None).await.unwrap();
        assert_eq!(remaining, 0);
        let second = svc.verify_direct("u1", "abcd1234", None, None).await;
        assert!(second.is_err());
    }
}
