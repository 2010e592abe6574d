//! Authentication & Session Core (spec §4.1): registration, verification
//! codes, login, refresh-token rotation with replay detection, logout.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::auth::models::{AuthBinding, Purpose, TokenPair, User};
use crate::auth::{password, tokens};
use crate::collaborators::notifier::Notifier;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ids;

pub struct AuthService {
    pool: PgPool,
    config: Arc<Config>,
    notifier: Arc<dyn Notifier>,
}

impl AuthService {
    pub fn new(pool: PgPool, config: Arc<Config>, notifier: Arc<dyn Notifier>) -> Self {
        Self { pool, config, notifier }
    }

    /// Issue and dispatch a one-time code. Invalidates any prior unused code
    /// for the triple, per spec's "issuing a new code invalidates the prior
    /// unused one" invariant.
    pub async fn send_code(&self, provider: &str, provider_id: &str, purpose: Purpose) -> Result<()> {
        let code = generate_numeric_code();
        let code_hash = hash_code(&code);
        let expires_at = Utc::now() + chrono::Duration::from_std(self.config.verification_code_ttl).unwrap();

        let mut tx = self.pool.begin().await?;

        // Proactive cleanup of expired codes for this triple.
        sqlx::query(
            "DELETE FROM verification_codes WHERE provider = $1 AND provider_id = $2 AND purpose = $3 AND expires_at <= now()",
        )
        .bind(provider)
        .bind(provider_id)
        .bind(purpose.as_str())
        .execute(&mut *tx)
        .await?;

        // Invalidate the current live code, if any.
        sqlx::query(
            "UPDATE verification_codes SET used_at = now() WHERE provider = $1 AND provider_id = $2 AND purpose = $3 AND used_at IS NULL",
        )
        .bind(provider)
        .bind(provider_id)
        .bind(purpose.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO verification_codes (provider, provider_id, code_hash, purpose, expires_at, max_attempts)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(provider)
        .bind(provider_id)
        .bind(&code_hash)
        .bind(purpose.as_str())
        .bind(expires_at)
        .bind(self.config.verification_code_max_attempts)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let idempotency_key =
            ids::notify_idempotency_key(provider, provider_id, purpose.as_str(), Utc::now().timestamp());
        self.notifier
            .send(provider_id, "verification_code", &[("code", &code)], &idempotency_key)
            .await
            .map_err(|e| Error::UpstreamTimeout(e.to_string()))?;

        Ok(())
    }

    /// Atomic check-and-consume of a live code. Returns `true` exactly once
    /// per issuance (spec §8 round-trip property).
    pub async fn verify_code(&self, provider: &str, provider_id: &str, code: &str, purpose: Purpose) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(i64, String, i32, i32)> = sqlx::query_as(
            r#"
            SELECT code_id, code_hash, attempts, max_attempts
            FROM verification_codes
            WHERE provider = $1 AND provider_id = $2 AND purpose = $3
              AND used_at IS NULL AND expires_at > now()
            FOR UPDATE
            "#,
        )
        .bind(provider)
        .bind(provider_id)
        .bind(purpose.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((code_id, code_hash, attempts, max_attempts)) = row else {
            return Ok(false);
        };

        if attempts >= max_attempts {
            tx.commit().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE verification_codes SET attempts = attempts + 1 WHERE code_id = $1")
            .bind(code_id)
            .execute(&mut *tx)
            .await?;

        let matches = hash_code(code) == code_hash;
        if matches {
            sqlx::query("UPDATE verification_codes SET used_at = now() WHERE code_id = $1")
                .bind(code_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(matches)
    }

    /// Create User + verified primary AuthBinding, issue tokens.
    pub async fn register(
        &self,
        provider: &str,
        provider_id: &str,
        code: &str,
        display_name: &str,
        password_plain: Option<&str>,
    ) -> Result<(User, TokenPair)> {
        if !self.verify_code(provider, provider_id, code, Purpose::Register).await? {
            return Err(Error::InvalidArgument("invalid or expired code".to_string()));
        }

        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT binding_id FROM auth_bindings WHERE provider = $1 AND provider_id = $2 AND is_verified = true",
        )
        .bind(provider)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;
        if existing.is_some() {
            return Err(Error::Conflict("account already exists for this identity".to_string()));
        }

        let password_hash = match password_plain {
            Some(p) => Some(password::hash(p)?),
            None => None,
        };

        let mut tx = self.pool.begin().await?;

        let user: User = sqlx::query_as(
            "INSERT INTO users (display_name) VALUES ($1) RETURNING user_id, display_name, status, created_at, last_active",
        )
        .bind(display_name)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO auth_bindings (user_id, provider, provider_id, password_hash, is_verified, is_primary)
            VALUES ($1, $2, $3, $4, true, true)
            "#,
        )
        .bind(user.user_id)
        .bind(provider)
        .bind(provider_id)
        .bind(&password_hash)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO memberships (user_id) VALUES ($1)")
            .bind(user.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let tokens = self.issue_token_pair(user.user_id, None).await?;
        tracing::info!(target: "audit", user_id = user.user_id, provider, "registration succeeded");
        Ok((user, tokens))
    }

    /// `credential` is a verification code for code-based providers, a
    /// password for credential providers (spec §4.1).
    pub async fn login(&self, provider: &str, provider_id: &str, credential: &str) -> Result<TokenPair> {
        let binding: Option<AuthBinding> = sqlx::query_as(
            "SELECT * FROM auth_bindings WHERE provider = $1 AND provider_id = $2 AND is_verified = true",
        )
        .bind(provider)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;

        // Deliberately vague failure: no distinction between "no such
        // account" and "wrong credential" (spec §7 enumeration guard).
        let generic_failure = || Error::Unauthorized("invalid credentials".to_string());

        let Some(binding) = binding else {
            // Still run a password verification against a dummy hash so the
            // timing profile matches the account-exists path.
            let _ = password::verify(credential, None);
            return Err(generic_failure());
        };

        if binding.is_locked(Utc::now()) {
            tracing::warn!(target: "audit", provider, provider_id, "login attempted on locked binding");
            return Err(generic_failure());
        }

        let is_credential_provider = provider == "email";
        let ok = if is_credential_provider {
            password::verify(credential, binding.password_hash.as_deref())
        } else {
            self.verify_code(provider, provider_id, credential, Purpose::Login).await?
        };

        if !ok {
            self.record_failed_login(binding.binding_id, binding.failed_attempts).await?;
            tracing::warn!(target: "audit", provider, provider_id, "login failed");
            return Err(generic_failure());
        }

        sqlx::query(
            "UPDATE auth_bindings SET failed_attempts = 0, locked_until = NULL, last_login = now() WHERE binding_id = $1",
        )
        .bind(binding.binding_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(target: "audit", provider, provider_id, user_id = binding.user_id, "login succeeded");
        self.issue_token_pair(binding.user_id, None).await
    }

    async fn record_failed_login(&self, binding_id: i64, current_attempts: i32) -> Result<()> {
        let attempts = current_attempts + 1;
        if attempts >= self.config.failed_login_lock_threshold {
            let locked_until = Utc::now() + chrono::Duration::from_std(self.config.failed_login_lock_duration).unwrap();
            sqlx::query("UPDATE auth_bindings SET failed_attempts = $1, locked_until = $2 WHERE binding_id = $3")
                .bind(attempts)
                .bind(locked_until)
                .bind(binding_id)
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query("UPDATE auth_bindings SET failed_attempts = $1 WHERE binding_id = $2")
                .bind(attempts)
                .bind(binding_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn issue_token_pair(&self, user_id: i64, parent_token_id: Option<i64>) -> Result<TokenPair> {
        let (access_token, expires_in) =
            tokens::issue_access_token(user_id, self.config.access_token_ttl, &self.config.jwt_secret)?;

        let material = tokens::generate_refresh_token();
        let expires_at = tokens::expiry_from_now(self.config.refresh_token_ttl);

        sqlx::query(
            "INSERT INTO refresh_tokens (token_hash, user_id, expires_at, parent_token) VALUES ($1, $2, $3, $4)",
        )
        .bind(&material.token_hash)
        .bind(user_id)
        .bind(expires_at)
        .bind(parent_token_id)
        .execute(&self.pool)
        .await?;

        Ok(TokenPair {
            access_token,
            refresh_token: material.token,
            expires_in,
        })
    }

    /// Rotation protocol (spec §4.1): replay of an already-rotated token
    /// revokes the whole parent chain.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let hash = tokens::hash_refresh_token(refresh_token);

        let row: Option<(i64, i64, bool, chrono::DateTime<Utc>)> = sqlx::query_as(
            "SELECT token_id, user_id, revoked, expires_at FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(&hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some((token_id, user_id, revoked, expires_at)) = row else {
            return Err(Error::Unauthorized("invalid refresh token".to_string()));
        };

        if expires_at <= Utc::now() {
            return Err(Error::Unauthorized("refresh token expired".to_string()));
        }

        if revoked {
            self.revoke_parent_chain(token_id).await?;
            tracing::warn!(target: "audit", user_id, token_id, "refresh token replay detected");
            return Err(Error::Unauthorized("refresh token already used".to_string()));
        }

        sqlx::query("UPDATE refresh_tokens SET revoked = true, last_used = now() WHERE token_id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await?;

        self.issue_token_pair(user_id, Some(token_id)).await
    }

    async fn revoke_parent_chain(&self, start_token_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            WITH RECURSIVE chain AS (
                SELECT token_id, parent_token FROM refresh_tokens WHERE token_id = $1
                UNION ALL
                SELECT rt.token_id, rt.parent_token
                FROM refresh_tokens rt
                JOIN chain ON rt.token_id = chain.parent_token
            )
            UPDATE refresh_tokens SET revoked = true WHERE token_id IN (SELECT token_id FROM chain)
            "#,
        )
        .bind(start_token_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        let hash = tokens::hash_refresh_token(refresh_token);
        sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE token_hash = $1")
            .bind(&hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn current_user(&self, access_token: &str) -> Result<User> {
        let claims = tokens::verify_access_token(access_token, &self.config.jwt_secret)?;
        let user: Option<User> = sqlx::query_as(
            "SELECT user_id, display_name, status, created_at, last_active FROM users WHERE user_id = $1",
        )
        .bind(claims.user_id)
        .fetch_optional(&self.pool)
        .await?;

        let user = user.ok_or_else(|| Error::Unauthorized("no such user".to_string()))?;
        if !user.is_active() {
            return Err(Error::Forbidden("account is not active".to_string()));
        }
        Ok(user)
    }
}

fn generate_numeric_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{n:06}")
}

fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_codes_are_six_digits() {
        for _ in 0..20 {
            let code = generate_numeric_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn code_hash_is_deterministic() {
        assert_eq!(hash_code("123456"), hash_code("123456"));
        assert_ne!(hash_code("123456"), hash_code("654321"));
    }
}
