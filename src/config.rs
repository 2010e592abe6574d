//! Process-wide configuration, loaded once at startup from the environment.

use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,

    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,

    pub verification_code_ttl: Duration,
    pub verification_code_max_attempts: i32,

    pub session_idle_window: Duration,
    pub session_hard_expiry: Duration,

    pub failed_login_lock_threshold: i32,
    pub failed_login_lock_duration: Duration,

    pub db_deadline: Duration,
    pub notifier_deadline: Duration,
    pub llm_deadline: Duration,
    pub vector_db_deadline: Duration,

    pub payment_order_ttl: Duration,

    pub otlp_endpoint: Option<String>,
    pub service_name: String,

    pub http_host: String,
    pub http_port: u16,
}

impl Config {
    /// Load from environment, falling back to documented defaults.
    /// Fails fast on a missing/invalid required value rather than panicking
    /// deep in a handler.
    pub fn from_env() -> Result<Self> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt_secret = env_required("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            return Err(Error::Configuration(
                "JWT_SECRET must be at least 32 bytes".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            database_max_connections: env_parsed("DATABASE_MAX_CONNECTIONS", 10)?,

            jwt_secret,
            access_token_ttl: Duration::from_secs(env_parsed("ACCESS_TOKEN_TTL_SECS", 30 * 60)?),
            refresh_token_ttl: Duration::from_secs(env_parsed(
                "REFRESH_TOKEN_TTL_SECS",
                30 * 24 * 3600,
            )?),

            verification_code_ttl: Duration::from_secs(env_parsed(
                "VERIFICATION_CODE_TTL_SECS",
                600,
            )?),
            verification_code_max_attempts: env_parsed("VERIFICATION_CODE_MAX_ATTEMPTS", 3)?,

            session_idle_window: Duration::from_secs(env_parsed(
                "SESSION_IDLE_WINDOW_SECS",
                15 * 60,
            )?),
            session_hard_expiry: Duration::from_secs(env_parsed(
                "SESSION_HARD_EXPIRY_SECS",
                7 * 24 * 3600,
            )?),

            failed_login_lock_threshold: env_parsed("FAILED_LOGIN_LOCK_THRESHOLD", 5)?,
            failed_login_lock_duration: Duration::from_secs(env_parsed(
                "FAILED_LOGIN_LOCK_DURATION_SECS",
                15 * 60,
            )?),

            db_deadline: Duration::from_secs(env_parsed("DB_DEADLINE_SECS", 2)?),
            notifier_deadline: Duration::from_secs(env_parsed("NOTIFIER_DEADLINE_SECS", 10)?),
            llm_deadline: Duration::from_secs(env_parsed("LLM_DEADLINE_SECS", 3)?),
            vector_db_deadline: Duration::from_secs(env_parsed("VECTOR_DB_DEADLINE_SECS", 5)?),

            payment_order_ttl: Duration::from_secs(env_parsed("PAYMENT_ORDER_TTL_SECS", 24 * 3600)?),

            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            service_name: std::env::var("SERVICE_NAME").unwrap_or_else(|_| "matchcore".to_string()),

            http_host: std::env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env_parsed("HTTP_PORT", 8080)?,
        })
    }
}

fn env_required(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::Configuration(format!("{key} is not set")))
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| Error::Configuration(format!("{key} has an invalid value: {value}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_jwt_secret() {
        std::env::set_var("DATABASE_URL", "postgres://x/y");
        std::env::set_var("JWT_SECRET", "too-short");
        let result = Config::from_env();
        assert!(result.is_err());
        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("JWT_SECRET");
    }
}
