//! Payment settlement (spec §4.3 "Payment settlement"): order pricing,
//! HMAC-verified confirmation, and membership extension.

use chrono::Utc;
use sqlx::PgPool;

use crate::collaborators::payment::{PaymentNotification, PaymentProvider};
use crate::error::{Error, Result};
use crate::quota::membership;
use crate::quota::models::PaymentOrder;

const MONTHLY_PACKAGE_DAYS: i32 = 30;
const ANNUAL_PACKAGE_DAYS: i32 = 365;
const MONTHLY_PRICE_CENTS: i64 = 2999;
const ANNUAL_PRICE_CENTS: i64 = 30591; // ~15% off 12x the monthly rate

/// 30 days = base rate, 365 days = discounted annual rate, anything else =
/// linear at the 30-day daily rate.
pub fn price_for_days(days: i32) -> i64 {
    match days {
        MONTHLY_PACKAGE_DAYS => MONTHLY_PRICE_CENTS,
        ANNUAL_PACKAGE_DAYS => ANNUAL_PRICE_CENTS,
        _ => {
            let daily_rate = MONTHLY_PRICE_CENTS as f64 / MONTHLY_PACKAGE_DAYS as f64;
            (daily_rate * days as f64).round() as i64
        }
    }
}

pub struct PaymentService {
    pool: PgPool,
    order_ttl: std::time::Duration,
}

impl PaymentService {
    pub fn new(pool: PgPool, order_ttl: std::time::Duration) -> Self {
        Self { pool, order_ttl }
    }

    pub async fn create_order(
        &self,
        user_id: i64,
        days: i32,
        method: &str,
        provider: &dyn PaymentProvider,
    ) -> Result<(PaymentOrder, serde_json::Value)> {
        if !(1..=3650).contains(&days) {
            return Err(Error::InvalidArgument("days must be between 1 and 3650".to_string()));
        }

        let amount_cents = price_for_days(days);
        let expires_at = Utc::now() + chrono::Duration::from_std(self.order_ttl).unwrap();

        let order: PaymentOrder = sqlx::query_as(
            r#"
            INSERT INTO payment_orders (user_id, amount_cents, currency, provider, days_purchased, expires_at)
            VALUES ($1, $2, 'USD', $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(amount_cents)
        .bind(method)
        .bind(days)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        let created = provider.create_order(amount_cents, "USD", order.order_id);
        Ok((order, created.client_payload))
    }

    /// Idempotent: a repeated paid notification for an already-paid order
    /// is a no-op (spec §4.3, §8).
    pub async fn confirm_payment(
        &self,
        notification: &PaymentNotification,
        provider: &dyn PaymentProvider,
    ) -> Result<()> {
        provider.verify_notification(notification)?;

        let mut tx = self.pool.begin().await?;

        let order: Option<PaymentOrder> =
            sqlx::query_as("SELECT * FROM payment_orders WHERE order_id = $1 FOR UPDATE")
                .bind(notification.order_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(order) = order else {
            return Err(Error::NotFound("no such payment order".to_string()));
        };

        if order.status != "pending" {
            // Already settled (or failed/expired) — idempotent no-op.
            tx.commit().await?;
            return Ok(());
        }

        if order.expires_at <= Utc::now() {
            sqlx::query("UPDATE payment_orders SET status = 'expired' WHERE order_id = $1")
                .bind(order.order_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Err(Error::PaymentVerifyFailed("order expired before confirmation".to_string()));
        }

        sqlx::query(
            "UPDATE payment_orders SET status = 'paid', provider_txn_id = $2 WHERE order_id = $1",
        )
        .bind(order.order_id)
        .bind(&notification.provider_txn_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        membership::extend(&self.pool, order.user_id, order.days_purchased).await?;
        tracing::info!(target: "audit", order_id = order.order_id, user_id = order.user_id, "payment confirmed");
        Ok(())
    }

    /// Sweeper: flips stale pending orders to expired (spec §5).
    pub async fn sweep_expired_orders(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE payment_orders SET status = 'expired' WHERE status = 'pending' AND expires_at <= now()",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_and_annual_use_fixed_prices() {
        assert_eq!(price_for_days(30), 2999);
        assert_eq!(price_for_days(365), 30591);
    }

    #[test]
    fn custom_days_are_linear() {
        assert_eq!(price_for_days(15), (2999.0_f64 / 30.0 * 15.0).round() as i64);
    }
}
