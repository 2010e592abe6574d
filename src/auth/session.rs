//! Session tracker (component E): presence and hard-expiry sweeping.

use chrono::Utc;
use sqlx::PgPool;

use crate::error::Result;

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Session {
    pub session_id: i64,
    pub user_id: i64,
    pub created_at: chrono::DateTime<Utc>,
    pub last_activity: chrono::DateTime<Utc>,
    pub expires_at: chrono::DateTime<Utc>,
    pub device: Option<String>,
    pub ip: Option<String>,
    pub active: bool,
}

/// Open a new session row, or touch the existing one for this device.
pub async fn open(
    pool: &PgPool,
    user_id: i64,
    device: Option<&str>,
    ip: Option<&str>,
    hard_expiry: std::time::Duration,
) -> Result<i64> {
    let expires_at = Utc::now() + chrono::Duration::from_std(hard_expiry).unwrap();
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO sessions (user_id, device, ip, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING session_id
        "#,
    )
    .bind(user_id)
    .bind(device)
    .bind(ip)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// Touch `last_activity`; called on every authenticated request (spec §4.1).
pub async fn touch(pool: &PgPool, session_id: i64) -> Result<()> {
    sqlx::query("UPDATE sessions SET last_activity = now() WHERE session_id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Find-or-create-and-touch the live session for this (user, device) pair
/// in one statement (spec §4.1: "touches Session, create if missing for
/// this device, update last_activity" on every authenticated request).
pub async fn touch_or_open(
    pool: &PgPool,
    user_id: i64,
    device: Option<&str>,
    ip: Option<&str>,
    hard_expiry: std::time::Duration,
) -> Result<i64> {
    let expires_at = Utc::now() + chrono::Duration::from_std(hard_expiry).unwrap();
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO sessions (user_id, device, ip, expires_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, COALESCE(device, '')) WHERE active = true
        DO UPDATE SET last_activity = now(), ip = EXCLUDED.ip
        RETURNING session_id
        "#,
    )
    .bind(user_id)
    .bind(device)
    .bind(ip)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// Count of sessions active within the presence window.
pub async fn online_count(pool: &PgPool, presence_window: std::time::Duration) -> Result<i64> {
    let since = Utc::now() - chrono::Duration::from_std(presence_window).unwrap();
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sessions WHERE active = true AND last_activity >= $1",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// Mark sessions inactive once idle past `hard_expiry` or past their
/// `expires_at`. Idempotent, safe to run repeatedly from the scheduler.
pub async fn sweep_expired(pool: &PgPool, hard_expiry: std::time::Duration) -> Result<u64> {
    let idle_cutoff = Utc::now() - chrono::Duration::from_std(hard_expiry).unwrap();
    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET active = false
        WHERE active = true
          AND (expires_at <= now() OR last_activity <= $1)
        "#,
    )
    .bind(idle_cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
