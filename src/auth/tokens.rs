//! Access-token signing/verification and refresh-token random generation.
//!
//! Access tokens are self-contained JWTs (spec §4.1 "Access-token
//! semantics"): not stored server-side, so revocation before expiry is not
//! supported. Refresh tokens are 256-bit random values, persisted only by
//! hash, never the raw value.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: i64,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

pub fn issue_access_token(user_id: i64, ttl: std::time::Duration, secret: &str) -> Result<(String, i64)> {
    let now = Utc::now();
    let expires_at = now + ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::seconds(1800));
    let claims = AccessClaims {
        user_id,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        token_type: "access".to_string(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("token signing failed: {e}")))?;
    Ok((token, ttl.as_secs() as i64))
}

/// Verify signature and expiry; does not touch the database.
pub fn verify_access_token(token: &str, secret: &str) -> Result<AccessClaims> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| Error::Unauthorized("invalid or expired access token".to_string()))?;

    if data.claims.token_type != "access" {
        return Err(Error::Unauthorized("wrong token type".to_string()));
    }
    Ok(data.claims)
}

/// A fresh 256-bit refresh token plus the hash stored server-side.
pub struct RefreshTokenMaterial {
    pub token: String,
    pub token_hash: String,
}

pub fn generate_refresh_token() -> RefreshTokenMaterial {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let token = base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes);
    RefreshTokenMaterial {
        token_hash: hash_refresh_token(&token),
        token,
    }
}

pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn expiry_from_now(ttl: std::time::Duration) -> DateTime<Utc> {
    Utc::now() + ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::days(30))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_roundtrips() {
        let (token, ttl) = issue_access_token(42, std::time::Duration::from_secs(1800), "a-very-long-test-secret-value").unwrap();
        assert_eq!(ttl, 1800);
        let claims = verify_access_token(&token, "a-very-long-test-secret-value").unwrap();
        assert_eq!(claims.user_id, 42);
    }

    #[test]
    fn access_token_rejects_wrong_secret() {
        let (token, _) = issue_access_token(1, std::time::Duration::from_secs(60), "secret-one-is-long-enough").unwrap();
        assert!(verify_access_token(&token, "secret-two-is-long-enough-too").is_err());
    }

    #[test]
    fn refresh_token_hash_is_deterministic() {
        let a = hash_refresh_token("same-token");
        let b = hash_refresh_token("same-token");
        assert_eq!(a, b);
    }

    #[test]
    fn generated_refresh_tokens_are_unique() {
        let a = generate_refresh_token();
        let b = generate_refresh_token();
        assert_ne!(a.token, b.token);
    }
}
