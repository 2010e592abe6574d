//! `POST /agent/conversation` (spec §4.6, §6).

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::agent::{DispatchRequest, DispatchResult};
use crate::error::Result;
use crate::middleware::AuthUser;
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationRequest {
    pub utterance: String,
    #[serde(default)]
    pub referenced_user_ids: Vec<i64>,
}

pub async fn conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<ConversationRequest>,
) -> Result<Json<DispatchResult>> {
    let viewed_ids = state.swipes.viewed(user.user_id).await?;

    let timer = crate::observability::DispatchTimer::start();
    let result = state
        .dispatcher
        .dispatch(
            DispatchRequest {
                utterance: request.utterance,
                referenced_user_ids: request.referenced_user_ids,
                caller_id: user.user_id,
            },
            &viewed_ids,
        )
        .await?;

    let intent = match &result {
        DispatchResult::Search { .. } => "search",
        DispatchResult::Inquiry { .. } => "inquiry",
        DispatchResult::Casual { .. } => "casual",
        DispatchResult::Clarification { .. } => "clarification",
    };
    timer.finish(intent);

    Ok(Json(result))
}
