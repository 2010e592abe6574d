//! Directional swipes with reject-duplicate default policy (spec §9 Open
//! Questions); overwrite is an explicit admin tool, never an end-user path.

use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::quota::{ActionKind, QuotaService};
use crate::swipes::{Direction, Swipe};

pub struct SwipeService {
    pool: PgPool,
    quota: QuotaService,
}

impl SwipeService {
    pub fn new(pool: PgPool, quota: QuotaService) -> Self {
        Self { pool, quota }
    }

    pub async fn swipe(&self, swiper_id: i64, target_id: i64, direction: Direction) -> Result<Swipe> {
        if swiper_id == target_id {
            return Err(Error::InvalidArgument("cannot swipe on yourself".to_string()));
        }

        self.quota.consume(swiper_id, ActionKind::Swipe, 1).await?;

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT swipe_id FROM swipes WHERE swiper_id = $1 AND target_id = $2")
                .bind(swiper_id)
                .bind(target_id)
                .fetch_optional(&self.pool)
                .await?;

        if existing.is_some() {
            return Err(Error::Conflict("already swiped on this user".to_string()));
        }

        let swipe: Swipe = sqlx::query_as(
            r#"
            INSERT INTO swipes (swiper_id, target_id, direction)
            VALUES ($1, $2, $3)
            RETURNING swipe_id, swiper_id, target_id, direction, created_at
            "#,
        )
        .bind(swiper_id)
        .bind(target_id)
        .bind(direction.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(swipe)
    }

    /// Admin-only overwrite tool (spec §9 Open Questions). Not reachable
    /// from the public HTTP surface.
    pub async fn admin_overwrite(&self, swiper_id: i64, target_id: i64, direction: Direction) -> Result<Swipe> {
        let swipe: Swipe = sqlx::query_as(
            r#"
            INSERT INTO swipes (swiper_id, target_id, direction)
            VALUES ($1, $2, $3)
            ON CONFLICT (swiper_id, target_id) DO UPDATE SET direction = EXCLUDED.direction
            RETURNING swipe_id, swiper_id, target_id, direction, created_at
            "#,
        )
        .bind(swiper_id)
        .bind(target_id)
        .bind(direction.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(swipe)
    }

    pub async fn mutual_pairs(&self, user_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT a.target_id
            FROM swipes a
            JOIN swipes b ON b.swiper_id = a.target_id AND b.target_id = a.swiper_id
            WHERE a.swiper_id = $1 AND a.direction = 'like' AND b.direction = 'like'
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn viewed(&self, user_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT target_id FROM swipes WHERE swiper_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
