//! Crypto adapter — Argon2id password hashing, AES-256-GCM secret-at-rest
//! encryption, RS256 JWT issuance, and TOTP/backup-code generation.

pub mod argon2_crypto;
pub mod rsa_token_service;
pub mod totp_service;

pub use argon2_crypto::Argon2CryptoService;
pub use rsa_token_service::RsaTokenService;
pub use totp_service::TotpRsService;
