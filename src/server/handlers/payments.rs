//! `/payments/*` handlers (spec §6, §4.3).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::collaborators::payment::PaymentNotification;
use crate::error::{Error, Result};
use crate::middleware::AuthUser;
use crate::quota::models::PaymentOrder;
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub days: i32,
    pub method: String,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: PaymentOrder,
    pub client_payload: serde_json::Value,
}

pub async fn create_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>)> {
    let (order, client_payload) = state
        .payments
        .create_order(user.user_id, request.days, &request.method, state.payment_provider.as_ref())
        .await?;

    if let Some(m) = crate::observability::metrics() {
        m.payment_orders_created.add(1, &[]);
    }

    Ok((StatusCode::CREATED, Json(CreateOrderResponse { order, client_payload })))
}

/// Provider-signed webhook body. `method` selects which provider's shared
/// secret verifies the signature.
pub async fn webhook(
    State(state): State<AppState>,
    Path(method): Path<String>,
    Json(notification): Json<PaymentNotification>,
) -> Result<StatusCode> {
    if method != state.payment_provider.name() {
        return Err(Error::InvalidArgument("method does not match configured provider".to_string()));
    }

    state.payments.confirm_payment(&notification, state.payment_provider.as_ref()).await?;

    if let Some(m) = crate::observability::metrics() {
        m.payment_orders_confirmed.add(1, &[]);
    }

    Ok(StatusCode::OK)
}
