//! Crypto service port (component C).
//!
//! Password hashing/verification, symmetric secret encryption, and random
//! byte generation, as capability interfaces — spec.md §1 scopes out the
//! underlying primitive implementations, but requires Argon2id for passwords
//! (memory >= 64 MiB, iterations >= 3, parallelism >= 4) and AES-256-GCM for
//! secrets (96-bit iv, 128-bit tag) from whatever adapter is plugged in.

use crate::core::error::CoreError;

pub trait CryptoService: Send + Sync {
    /// Hash a plaintext password into an Argon2id-encoded string.
    fn hash_password(&self, password: &str) -> Result<String, CoreError>;

    /// Constant-time-relative-to-candidate-length verification.
    fn verify_password(&self, hash: &str, password: &str) -> bool;

    /// Encrypt a secret as `"iv:authTag:ciphertext"` (hex-encoded segments).
    fn encrypt_secret(&self, plaintext: &[u8]) -> Result<String, CoreError>;

    /// Decrypt a value produced by `encrypt_secret`. Fails on tag mismatch.
    fn decrypt_secret(&self, encoded: &str) -> Result<Vec<u8>, CoreError>;

    fn random_bytes(&self, n: usize) -> Vec<u8>;

    fn random_hex(&self, n: usize) -> String {
        hex::encode(self.random_bytes(n))
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;

    /// Deterministic, insecure crypto double for unit tests that only need
    /// the port's *contract* (round-trips, tag-mismatch failure) — never used
    /// in production wiring.
    #[derive(Default)]
    pub struct InsecureTestCrypto;

    impl CryptoService for InsecureTestCrypto {
        fn hash_password(&self, password: &str) -> Result<String, CoreError> {
            Ok(format!("test-hash${password}"))
        }

        fn verify_password(&self, hash: &str, password: &str) -> bool {
            hash == format!("test-hash${password}")
        }

        fn encrypt_secret(&self, plaintext: &[u8]) -> Result<String, CoreError> {
            Ok(format!("00:00:{}", hex::encode(plaintext)))
        }

        fn decrypt_secret(&self, encoded: &str) -> Result<Vec<u8>, CoreError> {
            let parts: Vec<&str> = encoded.split(':').collect();
            if parts.len() != 3 {
                return Err(CoreError::internal("malformed secret envelope"));
            }
            hex::decode(parts[2]).map_err(|e| CoreError::internal(e.to_string()))
        }

        fn random_bytes(&self, n: usize) -> Vec<u8> {
            (0..n).map(|i| (i % 256) as u8).collect()
        }
    }
}
