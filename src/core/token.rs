//! Token service port (component B).
//!
//! Access tokens are short-lived RS256 JWTs carrying `sub`/`sessionId`/
//! `roles`/`orgId`; refresh tokens are opaque, stored only as a hash, and
//! carry a `tokenFamily` used to detect reuse after rotation (spec.md §3, §6).

use crate::core::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims embedded in an access token JWT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub session_id: String,
    pub roles: Vec<String>,
    pub org_id: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Claims embedded in a refresh token JWT. `token_family` is stable across
/// rotations of the same login chain; reuse of a blacklisted member revokes
/// every session sharing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub session_id: String,
    pub token_family: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly issued access/refresh pair, plus the expiry the caller needs to
/// persist alongside the session record.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Parameters for issuing a new token pair, kept as a struct rather than a
/// long positional arg list so call sites stay readable under rotation.
#[derive(Debug, Clone)]
pub struct IssueTokenPair<'a> {
    pub user_id: &'a str,
    pub session_id: &'a str,
    pub roles: Vec<String>,
    pub org_id: Option<String>,
    pub token_family: &'a str,
    pub remember_me: bool,
    pub now: DateTime<Utc>,
}

pub trait TokenService: Send + Sync {
    fn generate_token_pair(&self, params: IssueTokenPair<'_>) -> Result<TokenPair, CoreError>;

    /// Verify an access token's signature and expiry, returning its claims.
    fn verify_access_token(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, CoreError>;

    /// Verify a refresh token's signature and expiry, returning its claims.
    fn verify_refresh_token(&self, token: &str, now: DateTime<Utc>) -> Result<RefreshClaims, CoreError>;

    /// SHA-256 hex digest used as the blacklist/lookup key — the raw token
    /// is never stored.
    fn get_token_hash(&self, token: &str) -> String;
}


#[cfg(test)]
mod tests {
    use super::fake::FakeTokenService;
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn generated_pair_verifies_with_expected_claims() {
        let svc = FakeTokenService::default();
        let pair = svc
            .generate_token_pair(IssueTokenPair {
                user_id: "u1",
                session_id: "s1",
                roles: vec!["member".into()],
                org_id: Some("org1".into()),
                token_family: "fam1",
                remember_me: false,
                now: now(),
            })
            .unwrap();

        let access = svc.verify_access_token(&pair.access_token, now()).unwrap();
        assert_eq!(access.sub, "u1");
        assert_eq!(access.session_id, "s1");
        assert_eq!(access.org_id.as_deref(), Some("org1"));

        let refresh = svc.verify_refresh_token(&pair.refresh_token, now()).unwrap();
        assert_eq!(refresh.token_family, "fam1");
    }

    #[test]
    fn remember_me_extends_refresh_expiry_to_30_days() {
        let svc = FakeTokenService::default();
        let pair = svc
            .generate_token_pair(IssueTokenPair {
                user_id: "u1",
                session_id: "s1",
                roles: vec![],
                org_id: None,
                token_family: "fam1",
                remember_me: true,
                now: now(),
            })
            .unwrap();
        assert_eq!((pair.refresh_expires_at - now()).num_days(), 30);
    }

    #[test]
    fn expired_access_token_is_rejected() {
        let svc = FakeTokenService::default();
        let pair = svc
            .generate_token_pair(IssueTokenPair {
                user_id: "u1",
                session_id: "s1",
                roles: vec![],
                org_id: None,
                token_family: "fam1",
                remember_me: false,
                now: now(),
            })
            .unwrap();
        let later = now() + chrono::Duration::minutes(16);
        assert!(svc.verify_access_token(&pair.access_token, later).is_err());
    }

    #[test]
    fn token_hash_is_stable_and_does_not_echo_the_token() {
        let svc = FakeTokenService::default();
        let h1 = svc.get_token_hash("some-refresh-token");
        let h2 = svc.get_token_hash("some-refresh-token");
        assert_eq!(h1, h2);
        assert_ne!(h1, "some-refresh-token");
    }
}
