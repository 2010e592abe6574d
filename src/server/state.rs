//! Shared application state injected into every handler.

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::agent::Dispatcher;
use crate::auth::AuthService;
use crate::config::Config;
use crate::messaging::MessagingService;
use crate::quota::{PaymentService, QuotaService};
use crate::swipes::SwipeService;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub auth: Arc<AuthService>,
    pub quota: Arc<QuotaService>,
    pub swipes: Arc<SwipeService>,
    pub messaging: Arc<MessagingService>,
    pub payments: Arc<PaymentService>,
    pub dispatcher: Arc<Dispatcher>,
    pub payment_provider: Arc<dyn crate::collaborators::payment::PaymentProvider>,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Arc<Config> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
