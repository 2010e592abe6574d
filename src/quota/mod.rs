//! Quota & Membership Engine (spec §4.3): components G, H, plus settlement.

pub mod membership;
pub mod models;
pub mod payments;
pub mod service;

pub use models::{ActionKind, Tier};
pub use payments::PaymentService;
pub use service::QuotaService;
