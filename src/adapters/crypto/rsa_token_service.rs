//! `TokenService` implementation — RS256 JWTs for access and refresh tokens.
//!
//! Refresh tokens are full JWTs too (so verification is symmetric with
//! access tokens) but the core only ever persists their SHA-256 hash;
//! the signed string itself never touches the store.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};

use crate::core::error::CoreError;
use crate::core::token::{AccessClaims, IssueTokenPair, RefreshClaims, TokenPair, TokenService};

pub struct RsaTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
    remember_me_refresh_ttl: chrono::Duration,
}

impl RsaTokenService {
    pub fn new(private_key_pem: &[u8], public_key_pem: &[u8], access_ttl: chrono::Duration, refresh_ttl: chrono::Duration, remember_me_refresh_ttl: chrono::Duration) -> Result<Self, CoreError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem).map_err(|e| CoreError::internal(format!("invalid RSA private key: {e}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem).map_err(|e| CoreError::internal(format!("invalid RSA public key: {e}")))?;
        Ok(Self { encoding_key, decoding_key, access_ttl, refresh_ttl, remember_me_refresh_ttl })
    }
}

impl TokenService for RsaTokenService {
    fn generate_token_pair(&self, params: IssueTokenPair<'_>) -> Result<TokenPair, CoreError> {
        let refresh_ttl = if params.remember_me { self.remember_me_refresh_ttl } else { self.refresh_ttl };
        let access_expires_at = params.now + self.access_ttl;
        let refresh_expires_at = params.now + refresh_ttl;

        let access_claims = AccessClaims {
            sub: params.user_id.to_string(),
            session_id: params.session_id.to_string(),
            roles: params.roles,
            org_id: params.org_id,
            iat: params.now.timestamp(),
            exp: access_expires_at.timestamp(),
        };
        let refresh_claims = RefreshClaims {
            sub: params.user_id.to_string(),
            session_id: params.session_id.to_string(),
            token_family: params.token_family.to_string(),
            iat: params.now.timestamp(),
            exp: refresh_expires_at.timestamp(),
        };

        let header = Header::new(jsonwebtoken::Algorithm::RS256);
        let access_token = encode(&header, &access_claims, &self.encoding_key).map_err(|e| CoreError::internal(format!("failed to sign access token: {e}")))?;
        let refresh_token = encode(&header, &refresh_claims, &self.encoding_key).map_err(|e| CoreError::internal(format!("failed to sign refresh token: {e}")))?;

        Ok(TokenPair { access_token, refresh_token, access_expires_at, refresh_expires_at })
    }

    fn verify_access_token(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, CoreError> {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.leeway = 0;
        let data = decode::<AccessClaims>(token, &self.decoding_key, &validation).map_err(|_| CoreError::unauthorized("invalid access token"))?;
        if data.claims.exp < now.timestamp() {
            return Err(CoreError::unauthorized("access token expired"));
        }
        Ok(data.claims)
    }

    fn verify_refresh_token(&self, token: &str, now: DateTime<Utc>) -> Result<RefreshClaims, CoreError> {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.leeway = 0;
        let data = decode::<RefreshClaims>(token, &self.decoding_key, &validation).map_err(|_| CoreError::unauthorized("invalid refresh token"))?;
        if data.claims.exp < now.timestamp() {
            return Err(CoreError::unauthorized("refresh token expired"));
        }
        Ok(data.claims)
    }

    fn get_token_hash(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;

    fn service() -> RsaTokenService {
        let mut rng = rand::rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
        let public_key = private_key.to_public_key();

        let private_pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let public_pem = public_key.to_public_key_pem(LineEnding::LF).unwrap();

        RsaTokenService::new(
            private_pem.as_bytes(),
            public_pem.as_bytes(),
            chrono::Duration::minutes(15),
            chrono::Duration::days(7),
            chrono::Duration::days(30),
        )
        .unwrap()
    }

    #[test]
    fn issued_access_token_verifies_and_carries_claims() {
        let svc = service();
        let now = Utc::now();
        let pair = svc
            .generate_token_pair(IssueTokenPair {
                user_id: "u1",
                session_id: "s1",
                roles: vec!["member".into()],
                org_id: Some("org1".into()),
                token_family: "fam1",
                remember_me: false,
                now,
            })
            .unwrap();

        let claims = svc.verify_access_token(&pair.access_token, now).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.org_id.as_deref(), Some("org1"));
    }

    #[test]
    fn token_hash_never_echoes_the_raw_token() {
        let svc = service();
        let hash = svc.get_token_hash("raw-refresh-token-value");
        assert_ne!(hash, "raw-refresh-token-value");
        assert_eq!(hash.len(), 64);
    }
}
