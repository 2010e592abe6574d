//! Row types for the credential store, verification-code ledger, and
//! refresh-token ledger (spec §3).

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct User {
    pub user_id: i64,
    pub display_name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Phone,
    Email,
    Wechat,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Phone => "phone",
            Provider::Email => "email",
            Provider::Wechat => "wechat",
            Provider::Google => "google",
        }
    }

    /// Whether this provider carries a password (vs. verification-code-only).
    pub fn is_credential_provider(&self) -> bool {
        matches!(self, Provider::Email)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthBinding {
    pub binding_id: i64,
    pub user_id: i64,
    pub provider: String,
    pub provider_id: String,
    pub password_hash: Option<String>,
    pub is_verified: bool,
    pub is_primary: bool,
    pub failed_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

impl AuthBinding {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.map(|until| until > now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Register,
    Login,
    Reset,
    Verify,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Register => "register",
            Purpose::Login => "login",
            Purpose::Reset => "reset",
            Purpose::Verify => "verify",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VerificationCode {
    pub code_id: i64,
    pub provider: String,
    pub provider_id: String,
    pub code_hash: String,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub max_attempts: i32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRow {
    pub token_id: i64,
    pub token_hash: String,
    pub user_id: i64,
    pub device_descriptor: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub parent_token: Option<i64>,
}

/// Token pair handed back to the client on register/login/refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}
