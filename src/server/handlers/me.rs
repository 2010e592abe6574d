//! `GET /me` (spec §6).

use axum::Json;

use crate::auth::models::User;
use crate::middleware::AuthUser;

pub async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}
