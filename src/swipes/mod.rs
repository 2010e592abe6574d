//! Swipe / Mutual-Match state machine (spec §4.5, component I).

mod service;

pub use service::SwipeService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Like,
    Dislike,
    SuperLike,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Like => "like",
            Direction::Dislike => "dislike",
            Direction::SuperLike => "super_like",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(Direction::Like),
            "dislike" => Some(Direction::Dislike),
            "super_like" => Some(Direction::SuperLike),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Swipe {
    pub swipe_id: i64,
    pub swiper_id: i64,
    pub target_id: i64,
    pub direction: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
