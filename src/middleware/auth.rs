//! `AuthUser` extractor for Axum: resolves the `Authorization: Bearer`
//! access token (spec §6 `GET /me` contract) into the caller's `User`,
//! touching their session alongside resolution (spec §4.1 "Session
//! tracking").

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use serde::Serialize;
use sqlx::PgPool;

use crate::auth::models::User;
use crate::auth::{session, tokens};
use crate::config::Config;

#[derive(Debug, Serialize)]
pub struct AuthRejection {
    pub error: String,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

/// The resolved user for an authenticated request, extracted from the
/// `Authorization: Bearer <access_token>` header.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    PgPool: FromRef<S>,
    std::sync::Arc<Config>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthRejection { error: "missing bearer token".to_string() })?;

        let pool = PgPool::from_ref(state);
        let config = std::sync::Arc::<Config>::from_ref(state);

        let claims = tokens::verify_access_token(bearer.token(), &config.jwt_secret)
            .map_err(|_| AuthRejection { error: "invalid or expired access token".to_string() })?;

        let user: Option<User> = sqlx::query_as(
            "SELECT user_id, display_name, status, created_at, last_active FROM users WHERE user_id = $1",
        )
        .bind(claims.user_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AuthRejection { error: "lookup failed".to_string() })?;

        let user = user.ok_or(AuthRejection { error: "no such user".to_string() })?;
        if !user.is_active() {
            return Err(AuthRejection { error: "account is not active".to_string() });
        }

        sqlx::query("UPDATE users SET last_active = now() WHERE user_id = $1")
            .bind(user.user_id)
            .execute(&pool)
            .await
            .ok();

        let device = parts.headers.get("x-device-id").and_then(|v| v.to_str().ok());
        let ip = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|s| s.trim());
        session::touch_or_open(&pool, user.user_id, device, ip, config.session_hard_expiry).await.ok();

        Ok(AuthUser(user))
    }
}
