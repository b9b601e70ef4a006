//! TOTP / backup-code service port (components D, H).
//!
//! RFC 6238 time-based one-time passwords plus single-use backup codes.
//! Secrets are never returned to callers in plaintext after setup
//! verification — only the encrypted-at-rest form the adapter persists.

use crate::core::error::CoreError;

/// A freshly generated TOTP secret, ready to be shown once during setup.
#[derive(Debug, Clone)]
pub struct TotpSecret {
    /// Base32-encoded secret, as entered manually or embedded in the QR code.
    pub base32_secret: String,
    /// `otpauth://` URI for QR-code rendering.
    pub provisioning_uri: String,
}

/// A batch of backup codes generated at MFA setup or regeneration time.
/// `plaintext_codes` is shown to the user exactly once; only the hashed form
/// is persisted.
#[derive(Debug, Clone)]
pub struct BackupCodeBatch {
    pub plaintext_codes: Vec<String>,
}

pub trait TotpService: Send + Sync {
    /// Generate a new secret and its provisioning URI for the given account
    /// label (typically the user's email) and issuer (the product name).
    fn generate_secret(&self, account_label: &str, issuer: &str) -> TotpSecret;

    /// Verify a 6-digit code against a base32 secret, allowing +/-1 step of
    /// clock skew.
    fn verify_token(&self, base32_secret: &str, code: &str, now: chrono::DateTime<chrono::Utc>) -> bool;

    /// Generate `count` single-use backup codes.
    fn generate_backup_codes(&self, count: usize) -> BackupCodeBatch;

    /// Hash a backup code for storage (distinct from password hashing so the
    /// cost parameters can be tuned independently).
    fn hash_backup_code(&self, code: &str) -> Result<String, CoreError>;

    fn verify_backup_code(&self, hash: &str, code: &str) -> bool;
}

#[cfg(test)]
pub mod fake {
    use super::*;

    /// A TOTP double that accepts the fixed code `"000000"` — sufficient for
    /// exercising MFA challenge/verify flows without RFC 6238 math.
    #[derive(Default)]
    pub struct FakeTotpService;

    impl TotpService for FakeTotpService {
        fn generate_secret(&self, account_label: &str, issuer: &str) -> TotpSecret {
            TotpSecret {
                base32_secret: "JBSWY3DPEHPK3PXP".to_string(),
                provisioning_uri: format!(
                    "otpauth://totp/{issuer}:{account_label}?secret=JBSWY3DPEHPK3PXP&issuer={issuer}"
                ),
            }
        }

        fn verify_token(&self, _base32_secret: &str, code: &str, _now: chrono::DateTime<chrono::Utc>) -> bool {
            code == "000000"
        }

        fn generate_backup_codes(&self, count: usize) -> BackupCodeBatch {
            BackupCodeBatch {
                plaintext_codes: (0..count).map(|i| format!("BKUP-{i:04}")).collect(),
            }
        }

        fn hash_backup_code(&self, code: &str) -> Result<String, CoreError> {
            Ok(format!("hashed:{code}"))
        }

        fn verify_backup_code(&self, hash: &str, code: &str) -> bool {
            hash == format!("hashed:{code}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeTotpService;
    use super::*;

    #[test]
    fn generated_secret_embeds_label_and_issuer() {
        let svc = FakeTotpService;
        let secret = svc.generate_secret("user@example.com", "Agora");
        assert!(secret.provisioning_uri.contains("user@example.com"));
        assert!(secret.provisioning_uri.contains("Agora"));
    }

    #[test]
    fn backup_codes_are_unique_and_hash_round_trips() {
        let svc = FakeTotpService;
        let batch = svc.generate_backup_codes(10);
        assert_eq!(batch.plaintext_codes.len(), 10);
        let unique: std::collections::HashSet<_> = batch.plaintext_codes.iter().collect();
        assert_eq!(unique.len(), 10);

        let hash = svc.hash_backup_code(&batch.plaintext_codes[0]).unwrap();
        assert!(svc.verify_backup_code(&hash, &batch.plaintext_codes[0]));
        assert!(!svc.verify_backup_code(&hash, &batch.plaintext_codes[1]));
    }
}
