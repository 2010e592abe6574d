//! Membership ledger (component H): tier derivation, paid extension,
//! downgrade, and the per-tier action-limit table.

use chrono::Utc;
use sqlx::PgPool;

use crate::error::Result;
use crate::quota::models::{ActionKind, MembershipRow, Tier};

#[derive(Debug, Clone, Copy)]
pub enum Window {
    Hour,
    Day,
}

/// `None` means unlimited for that tier/action combination.
pub fn limit_for(tier: Tier, action: ActionKind) -> Option<(i64, Window)> {
    use ActionKind::*;
    use Tier::*;
    match (tier, action) {
        (Free, Swipe) => Some((30, Window::Day)),
        (Paid, Swipe) => Some((30, Window::Hour)), // anti-bot guard only; daily is unlimited
        (Free, CardCreate) => Some((2, Window::Day)),
        (Paid, CardCreate) => Some((10, Window::Day)),
        (Free, Message) => Some((50, Window::Day)),
        (Paid, Message) => None,
        (Free, ProjectIdea) => Some((1, Window::Day)),
        (Paid, ProjectIdea) => Some((30, Window::Hour)),
    }
}

pub async fn get_or_create(pool: &PgPool, user_id: i64) -> Result<MembershipRow> {
    let existing: Option<MembershipRow> = sqlx::query_as("SELECT * FROM memberships WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = existing {
        return Ok(row);
    }

    let row: MembershipRow = sqlx::query_as(
        "INSERT INTO memberships (user_id) VALUES ($1) ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id RETURNING *",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// `end_date = max(now, end_date) + days`; tier effectively becomes paid.
pub async fn extend(pool: &PgPool, user_id: i64, days: i32) -> Result<MembershipRow> {
    get_or_create(pool, user_id).await?;
    let row: MembershipRow = sqlx::query_as(
        r#"
        UPDATE memberships
        SET end_date = GREATEST(now(), COALESCE(end_date, now())) + ($2 || ' days')::interval,
            tier = 'paid'
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(days)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn downgrade(pool: &PgPool, user_id: i64) -> Result<()> {
    sqlx::query("UPDATE memberships SET tier = 'free', end_date = NULL WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Background sweep: downgrade users whose membership lapsed. Lazy
/// derivation at `check` time makes this optimisation, not correctness
/// (spec §4.3).
pub async fn sweep_lapsed(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE memberships SET tier = 'free' WHERE tier = 'paid' AND end_date IS NOT NULL AND end_date <= now()",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub fn effective_tier_now(row: &MembershipRow) -> Tier {
    row.effective_tier(Utc::now())
}
