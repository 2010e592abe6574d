//! Periodic sweepers (spec §5): session cleanup, verification-code cleanup,
//! membership downgrade, payment-order expiry, rate-limiter compaction.
//! A thin wrapper around `tokio_cron_scheduler::JobScheduler`; every job
//! here is idempotent, as required by spec §5.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::middleware::rate_limit;
use crate::quota::payments::PaymentService;
use crate::{auth, quota};

pub struct Scheduler {
    db: PgPool,
    config: Arc<Config>,
    scheduler: JobScheduler,
}

impl Scheduler {
    pub async fn new(db: PgPool, config: Arc<Config>) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| Error::Internal(format!("failed to create scheduler: {e}")))?;
        Ok(Self { db, config, scheduler })
    }

    pub async fn start(&self) -> Result<()> {
        self.add_session_cleanup().await?;
        self.add_verification_code_cleanup().await?;
        self.add_membership_downgrade().await?;
        self.add_payment_order_expiry().await?;
        self.add_rate_limiter_compaction().await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| Error::Internal(format!("failed to start scheduler: {e}")))?;

        tracing::info!("scheduler started");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| Error::Internal(format!("failed to stop scheduler: {e}")))?;
        tracing::info!("scheduler stopped");
        Ok(())
    }

    async fn add_session_cleanup(&self) -> Result<()> {
        let db = self.db.clone();
        let hard_expiry = self.config.session_hard_expiry;
        let job = Job::new_repeated_async(Duration::from_secs(300), move |_uuid, _lock| {
            let db = db.clone();
            Box::pin(async move {
                match auth::session::sweep_expired(&db, hard_expiry).await {
                    Ok(count) => tracing::info!(count, "session cleanup swept expired sessions"),
                    Err(e) => tracing::error!(error = %e, "session cleanup failed"),
                }
            })
        })
        .map_err(|e| Error::Internal(format!("failed to create session cleanup job: {e}")))?;
        self.scheduler
            .add(job)
            .await
            .map_err(|e| Error::Internal(format!("failed to schedule session cleanup: {e}")))?;
        Ok(())
    }

    async fn add_verification_code_cleanup(&self) -> Result<()> {
        let db = self.db.clone();
        let job = Job::new_repeated_async(Duration::from_secs(600), move |_uuid, _lock| {
            let db = db.clone();
            Box::pin(async move {
                let result = sqlx::query("DELETE FROM verification_codes WHERE expires_at <= now()")
                    .execute(&db)
                    .await;
                match result {
                    Ok(r) => tracing::info!(count = r.rows_affected(), "verification code cleanup"),
                    Err(e) => tracing::error!(error = %e, "verification code cleanup failed"),
                }
            })
        })
        .map_err(|e| Error::Internal(format!("failed to create verification code cleanup job: {e}")))?;
        self.scheduler
            .add(job)
            .await
            .map_err(|e| Error::Internal(format!("failed to schedule verification code cleanup: {e}")))?;
        Ok(())
    }

    async fn add_membership_downgrade(&self) -> Result<()> {
        let db = self.db.clone();
        let job = Job::new_repeated_async(Duration::from_secs(900), move |_uuid, _lock| {
            let db = db.clone();
            Box::pin(async move {
                match quota::membership::sweep_lapsed(&db).await {
                    Ok(count) => tracing::info!(count, "membership downgrade sweep"),
                    Err(e) => tracing::error!(error = %e, "membership downgrade sweep failed"),
                }
            })
        })
        .map_err(|e| Error::Internal(format!("failed to create membership downgrade job: {e}")))?;
        self.scheduler
            .add(job)
            .await
            .map_err(|e| Error::Internal(format!("failed to schedule membership downgrade: {e}")))?;
        Ok(())
    }

    async fn add_payment_order_expiry(&self) -> Result<()> {
        let db = self.db.clone();
        let order_ttl = self.config.payment_order_ttl;
        let job = Job::new_repeated_async(Duration::from_secs(300), move |_uuid, _lock| {
            let db = db.clone();
            Box::pin(async move {
                let service = PaymentService::new(db, order_ttl);
                match service.sweep_expired_orders().await {
                    Ok(count) => tracing::info!(count, "payment order expiry sweep"),
                    Err(e) => tracing::error!(error = %e, "payment order expiry sweep failed"),
                }
            })
        })
        .map_err(|e| Error::Internal(format!("failed to create payment order expiry job: {e}")))?;
        self.scheduler
            .add(job)
            .await
            .map_err(|e| Error::Internal(format!("failed to schedule payment order expiry: {e}")))?;
        Ok(())
    }

    async fn add_rate_limiter_compaction(&self) -> Result<()> {
        let job = Job::new_repeated_async(Duration::from_secs(120), move |_uuid, _lock| {
            Box::pin(async move {
                rate_limit::cleanup();
                tracing::debug!("rate limiter windows compacted");
            })
        })
        .map_err(|e| Error::Internal(format!("failed to create rate limiter compaction job: {e}")))?;
        self.scheduler
            .add(job)
            .await
            .map_err(|e| Error::Internal(format!("failed to schedule rate limiter compaction: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scheduler_creation_succeeds() {
        let pool = PgPool::connect_lazy("postgres://localhost/does_not_matter").unwrap();
        let config = Arc::new(Config {
            database_url: "postgres://localhost/does_not_matter".to_string(),
            database_max_connections: 5,
            jwt_secret: "a-very-long-test-secret-value-here".to_string(),
            access_token_ttl: Duration::from_secs(1800),
            refresh_token_ttl: Duration::from_secs(2592000),
            verification_code_ttl: Duration::from_secs(600),
            verification_code_max_attempts: 3,
            session_idle_window: Duration::from_secs(900),
            session_hard_expiry: Duration::from_secs(604800),
            failed_login_lock_threshold: 5,
            failed_login_lock_duration: Duration::from_secs(900),
            db_deadline: Duration::from_secs(2),
            notifier_deadline: Duration::from_secs(10),
            llm_deadline: Duration::from_secs(3),
            vector_db_deadline: Duration::from_secs(5),
            payment_order_ttl: Duration::from_secs(86400),
            otlp_endpoint: None,
            service_name: "matchcore-test".to_string(),
            http_host: "127.0.0.1".to_string(),
            http_port: 0,
        });
        let result = Scheduler::new(pool, config).await;
        assert!(result.is_ok());
    }
}
