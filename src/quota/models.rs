//! Quota and membership row types (spec §3).

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Swipe,
    CardCreate,
    Message,
    ProjectIdea,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Swipe => "swipe",
            ActionKind::CardCreate => "card_create",
            ActionKind::Message => "message",
            ActionKind::ProjectIdea => "project_idea",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    Free,
    Paid,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MembershipRow {
    pub user_id: i64,
    pub tier: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub active: bool,
}

impl MembershipRow {
    /// Tier is derived lazily from `end_date`, not trusted verbatim from the
    /// row — the sweeper is an optimisation, not the source of truth
    /// (spec §4.3).
    pub fn effective_tier(&self, now: DateTime<Utc>) -> Tier {
        match self.end_date {
            Some(end) if end > now => Tier::Paid,
            _ => Tier::Free,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub current_usage: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageStats {
    pub tier: Tier,
    pub counters: Vec<(String, i64)>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PaymentOrder {
    pub order_id: i64,
    pub user_id: i64,
    pub amount_cents: i64,
    pub currency: String,
    pub provider: String,
    pub status: String,
    pub days_purchased: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub provider_txn_id: Option<String>,
}
