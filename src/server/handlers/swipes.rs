//! `POST /swipes` (spec §6).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::middleware::AuthUser;
use crate::server::state::AppState;
use crate::swipes::{Direction, Swipe};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwipeRequest {
    pub target_id: i64,
    pub direction: String,
}

pub async fn swipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<SwipeRequest>,
) -> Result<(StatusCode, Json<Swipe>)> {
    let direction = Direction::parse(&request.direction)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown direction: {}", request.direction)))?;

    let swipe = state.swipes.swipe(user.user_id, request.target_id, direction).await?;

    if let Some(m) = crate::observability::metrics() {
        m.swipes_recorded.add(1, &[]);
    }

    Ok((StatusCode::CREATED, Json(swipe)))
}
