//! `/auth/*` handlers (spec §6).

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::models::{Purpose, TokenPair, User};
use crate::error::{Error, Result};
use crate::middleware::rate_limit;
use crate::server::state::AppState;

/// Applies an endpoint-specific rate-limit class keyed on client IP before
/// the handler body runs (spec §4.2's per-endpoint budgets on top of the
/// global gate). Tripping this blocks the IP — reserved for per-endpoint
/// abuse budgets, not for throttles a legitimate user can trip.
fn gate(headers: &HeaderMap, path: &str, class: rate_limit::RateLimitClass) -> Result<()> {
    let ip = rate_limit::client_ip(headers);
    rate_limit::check_endpoint_class(&ip, path, class)
        .map(|_| ())
        .map_err(|_| Error::RateLimited { retry_after: class.window_seconds.max(0) as u64 })
}

/// Soft per-identity throttle (e.g. "one verification code per minute"):
/// 429s without blocking the IP, since a legitimate user re-requesting a
/// code is expected to trip this occasionally.
fn gate_soft(key: &str, class: rate_limit::RateLimitClass) -> Result<()> {
    rate_limit::check_soft_throttle(key, class)
        .map(|_| ())
        .map_err(|_| Error::RateLimited { retry_after: class.window_seconds.max(0) as u64 })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub provider: String,
    pub provider_id: String,
    pub code: String,
    pub name: String,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    gate(&headers, "/auth/register", rate_limit::REGISTER)?;

    let (user, tokens) = state
        .auth
        .register(
            &request.provider,
            &request.provider_id,
            &request.code,
            &request.name,
            request.password.as_deref(),
        )
        .await?;

    if let Some(m) = crate::observability::metrics() {
        m.auth_successes.add(1, &[]);
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub provider: String,
    pub provider_id: String,
    pub credential: String,
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenPair>> {
    gate(&headers, "/auth/login", rate_limit::LOGIN)?;

    let tokens = state.auth.login(&request.provider, &request.provider_id, &request.credential).await;
    match &tokens {
        Ok(_) => {
            if let Some(m) = crate::observability::metrics() {
                m.auth_successes.add(1, &[]);
            }
        }
        Err(_) => {
            if let Some(m) = crate::observability::metrics() {
                m.auth_failures.add(1, &[]);
            }
        }
    }
    Ok(Json(tokens?))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendCodeRequest {
    pub provider: String,
    pub provider_id: String,
    pub purpose: String,
}

pub async fn send_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SendCodeRequest>,
) -> Result<StatusCode> {
    let purpose = parse_purpose(&request.purpose)?;
    let endpoint_class = if matches!(purpose, Purpose::Reset) { rate_limit::PASSWORD_RESET } else { rate_limit::SEND_CODE };
    gate(&headers, "/auth/send-code", endpoint_class)?;
    gate_soft(
        &format!("send_code_identity:{}:{}", request.provider, request.provider_id),
        rate_limit::SEND_CODE_PER_IDENTITY,
    )?;

    state.auth.send_code(&request.provider, &request.provider_id, purpose).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyRequest {
    pub provider: String,
    pub provider_id: String,
    pub code: String,
    pub purpose: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub verified: bool,
}

pub async fn verify(State(state): State<AppState>, Json(request): Json<VerifyRequest>) -> Result<Json<VerifyResponse>> {
    let purpose = parse_purpose(&request.purpose)?;
    let verified = state.auth.verify_code(&request.provider, &request.provider_id, &request.code, purpose).await?;
    Ok(Json(VerifyResponse { verified }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(State(state): State<AppState>, Json(request): Json<RefreshRequest>) -> Result<Json<TokenPair>> {
    Ok(Json(state.auth.refresh(&request.refresh_token).await?))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

pub async fn logout(State(state): State<AppState>, Json(request): Json<LogoutRequest>) -> Result<StatusCode> {
    state.auth.logout(&request.refresh_token).await?;
    Ok(StatusCode::OK)
}

fn parse_purpose(s: &str) -> Result<Purpose> {
    match s {
        "register" => Ok(Purpose::Register),
        "login" => Ok(Purpose::Login),
        "reset" => Ok(Purpose::Reset),
        "verify" => Ok(Purpose::Verify),
        other => Err(crate::error::Error::InvalidArgument(format!("unknown purpose: {other}"))),
    }
}
