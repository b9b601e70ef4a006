//! `CryptoService` implementation — Argon2id for passwords, AES-256-GCM for
//! MFA secrets at rest.
//!
//! # Design Principles
//!
//! - **Pure cryptographic**: no policy logic, no version tracking.
//! - **Configurable**: Argon2 parameters injected via constructor, never
//!   hard-coded, per spec.md §4.C (memory >= 64 MiB, iterations >= 3,
//!   parallelism >= 4).
//! - **PHC format**: password hashes are stored as standard PHC strings.
//! - **No secret leakage**: passwords and plaintext MFA secrets are never
//!   logged.

use aes_gcm::aead::{Aead, KeyInit, OsRng as AesOsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as Argon2Hasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::core::crypto::CryptoService;
use crate::core::error::CoreError;

#[derive(Clone)]
pub struct Argon2CryptoService {
    argon2: Argon2<'static>,
    encryption_key: [u8; 32],
}

impl Argon2CryptoService {
    /// `encryption_key` is the 32-byte AES-256-GCM key used to encrypt MFA
    /// secrets at rest; callers decode it from `MFA_ENCRYPTION_KEY_HEX`.
    pub fn new(memory_cost_kib: u32, time_cost: u32, parallelism: u32, encryption_key: [u8; 32]) -> Result<Self, CoreError> {
        let params = Params::new(memory_cost_kib, time_cost, parallelism, None)
            .map_err(|e| CoreError::internal(format!("invalid argon2 parameters: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { argon2, encryption_key })
    }
}

impl CryptoService for Argon2CryptoService {
    fn hash_password(&self, password: &str) -> Result<String, CoreError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CoreError::internal(format!("argon2 hashing failed: {e}")))?;
        Ok(hash.to_string())
    }

    fn verify_password(&self, hash: &str, password: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        self.argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    }

    /// Format: `iv:authTag:ciphertext`, all hex-encoded, matching the
    /// at-rest representation spec.md §4.D mandates.
    fn encrypt_secret(&self, plaintext: &[u8]) -> Result<String, CoreError> {
        let key = Key::<Aes256Gcm>::from_slice(&self.encryption_key);
        let cipher = Aes256Gcm::new(key);
        let mut iv_bytes = [0u8; 12];
        AesOsRng.fill_bytes(&mut iv_bytes);
        let nonce = Nonce::from_slice(&iv_bytes);

        let sealed = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CoreError::internal(format!("encryption failed: {e}")))?;
        // aes-gcm appends the 16-byte auth tag to the ciphertext.
        let tag_offset = sealed.len() - 16;
        let (ciphertext, tag) = sealed.split_at(tag_offset);

        Ok(format!("{}:{}:{}", hex::encode(iv_bytes), hex::encode(tag), hex::encode(ciphertext)))
    }

    fn decrypt_secret(&self, encoded: &str) -> Result<Vec<u8>, CoreError> {
        let parts: Vec<&str> = encoded.split(':').collect();
        let [iv_hex, tag_hex, ciphertext_hex] = parts[..] else {
            return Err(CoreError::internal("malformed encrypted secret"));
        };
        let iv = hex::decode(iv_hex).map_err(|e| CoreError::internal(e.to_string()))?;
        let tag = hex::decode(tag_hex).map_err(|e| CoreError::internal(e.to_string()))?;
        let ciphertext = hex::decode(ciphertext_hex).map_err(|e| CoreError::internal(e.to_string()))?;

        let key = Key::<Aes256Gcm>::from_slice(&self.encryption_key);
        let cipher = Aes256Gcm::new(key);
        let nonce = Nonce::from_slice(&iv);

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);
        cipher.decrypt(nonce, sealed.as_slice()).map_err(|_| CoreError::internal("decryption failed"))
    }

    fn random_bytes(&self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        rand::rng().fill_bytes(&mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> Argon2CryptoService {
        Argon2CryptoService::new(65536, 3, 4, [7u8; 32]).unwrap()
    }

    #[test]
    fn hash_then_verify_round_trips() {
        let svc = service();
        let hash = svc.hash_password("correct horse battery staple").unwrap();
        assert!(svc.verify_password(&hash, "correct horse battery staple"));
        assert!(!svc.verify_password(&hash, "wrong password"));
    }

    #[test]
    fn encrypt_then_decrypt_round_trips_the_secret() {
        let svc = service();
        let secret = b"JBSWY3DPEHPK3PXP";
        let encoded = svc.encrypt_secret(secret).unwrap();
        assert_eq!(encoded.matches(':').count(), 2);
        let decrypted = svc.decrypt_secret(&encoded).unwrap();
        assert_eq!(decrypted, secret);
    }

    #[test]
    fn malformed_encoded_secret_is_rejected() {
        let svc = service();
        assert!(svc.decrypt_secret("not-the-right-format").is_err());
    }
}
