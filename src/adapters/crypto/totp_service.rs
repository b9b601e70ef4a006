//! `TotpService` implementation — RFC 6238 TOTP via `totp-rs`, plus SHA-256
//! backup-code hashing and a hand-rolled SVG QR-code renderer over
//! `qrcode`'s module grid (no `image` dependency needed for a vector format).

use rand::Rng;
use sha2::{Digest, Sha256};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::core::crypto::CryptoService;
use crate::core::error::CoreError;
use crate::core::totp::{BackupCodeBatch, TotpSecret, TotpService};

const BACKUP_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub struct TotpRsService<'a> {
    crypto: &'a dyn CryptoService,
}

impl<'a> TotpRsService<'a> {
    pub fn new(crypto: &'a dyn CryptoService) -> Self {
        Self { crypto }
    }

    fn totp_for(&self, base32_secret: &str, account_label: &str, issuer: &str) -> Result<TOTP, CoreError> {
        let secret = Secret::Encoded(base32_secret.to_string())
            .to_bytes()
            .map_err(|e| CoreError::internal(format!("invalid base32 secret: {e}")))?;
        TOTP::new(Algorithm::SHA1, 6, 1, 30, secret, Some(issuer.to_string()), account_label.to_string())
            .map_err(|e| CoreError::internal(format!("failed to build TOTP instance: {e}")))
    }

    /// Renders the QR code as a minimal SVG, one `<rect>` per dark module.
    pub fn render_svg(&self, provisioning_uri: &str) -> Result<String, CoreError> {
        let code = qrcode::QrCode::new(provisioning_uri.as_bytes()).map_err(|e| CoreError::internal(format!("failed to encode QR code: {e}")))?;
        let width = code.width();
        const MODULE_PX: usize = 8;
        let size_px = width * MODULE_PX;

        let mut svg = String::with_capacity(size_px * size_px / 4);
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {size_px} {size_px}\" width=\"{size_px}\" height=\"{size_px}\">\
             <rect width=\"100%\" height=\"100%\" fill=\"#fff\"/>"
        ));
        for y in 0..width {
            for x in 0..width {
                if code[(x, y)] == qrcode::Color::Dark {
                    svg.push_str(&format!("<rect x=\"{}\" y=\"{}\" width=\"{MODULE_PX}\" height=\"{MODULE_PX}\" fill=\"#000\"/>", x * MODULE_PX, y * MODULE_PX));
                }
            }
        }
        svg.push_str("</svg>");
        Ok(svg)
    }
}

impl<'a> TotpService for TotpRsService<'a> {
    fn generate_secret(&self, account_label: &str, issuer: &str) -> TotpSecret {
        let secret_bytes = self.crypto.random_bytes(20);
        let base32_secret = base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &secret_bytes);
        let provisioning_uri = format!(
            "otpauth://totp/{issuer}:{account_label}?secret={base32_secret}&issuer={issuer}&algorithm=SHA1&digits=6&period=30"
        );
        TotpSecret { base32_secret, provisioning_uri }
    }

    fn verify_token(&self, base32_secret: &str, code: &str, now: chrono::DateTime<chrono::Utc>) -> bool {
        let Ok(totp) = self.totp_for(base32_secret, "", "") else {
            return false;
        };
        let timestamp = now.timestamp() as u64;
        // +/-1 step (30s) of clock skew, per spec.md §4.D.
        [timestamp.saturating_sub(30), timestamp, timestamp + 30]
            .iter()
            .any(|t| totp.generate(*t) == code)
    }

    fn generate_backup_codes(&self, count: usize) -> BackupCodeBatch {
        let mut rng = rand::rng();
        let plaintext_codes = (0..count)
            .map(|_| {
                let chars: String = (0..8).map(|_| BACKUP_CODE_ALPHABET[rng.random_range(0..BACKUP_CODE_ALPHABET.len())] as char).collect();
                format!("{}-{}", &chars[0..4], &chars[4..8])
            })
            .collect();
        BackupCodeBatch { plaintext_codes }
    }

    fn hash_backup_code(&self, code: &str) -> Result<String, CoreError> {
        let mut hasher = Sha256::new();
        hasher.update(code.to_uppercase().as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    fn verify_backup_code(&self, hash: &str, code: &str) -> bool {
        self.hash_backup_code(code).map(|computed| computed == hash).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::fake::InsecureTestCrypto;

    #[test]
    fn generated_secret_is_valid_base32_and_embeds_identity() {
        let crypto = InsecureTestCrypto;
        let svc = TotpRsService::new(&crypto);
        let secret = svc.generate_secret("user@example.com", "Aim");
        assert!(!secret.base32_secret.is_empty());
        assert!(secret.provisioning_uri.contains("user@example.com"));
        assert!(secret.provisioning_uri.contains("Aim"));
    }

    #[test]
    fn backup_codes_hash_and_verify_round_trip() {
        let crypto = InsecureTestCrypto;
        let svc = TotpRsService::new(&crypto);
        let batch = svc.generate_backup_codes(10);
        assert_eq!(batch.plaintext_codes.len(), 10);

        let hash = svc.hash_backup_code(&batch.plaintext_codes[0]).unwrap();
        assert!(svc.verify_backup_code(&hash, &batch.plaintext_codes[0]));
        assert!(svc.verify_backup_code(&hash, &batch.plaintext_codes[0].to_lowercase()));
        assert!(!svc.verify_backup_code(&hash, &batch.plaintext_codes[1]));
    }

    #[test]
    fn svg_rendering_produces_a_well_formed_document() {
        let crypto = InsecureTestCrypto;
        let svc = TotpRsService::new(&crypto);
        let secret = svc.generate_secret("user@example.com", "Aim");
        let svg = svc.render_svg(&secret.provisioning_uri).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
    }
}
