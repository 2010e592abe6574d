//! HTTP server: router assembly, middleware stack, health check.

pub mod handlers;
pub mod state;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::middleware::{rate_limit, security_headers};
use crate::server::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/send-code", post(handlers::auth::send_code))
        .route("/auth/verify", post(handlers::auth::verify))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout));

    let api_routes = Router::new()
        .route("/me", get(handlers::me::me))
        .route("/swipes", post(handlers::swipes::swipe))
        .route("/chats/greeting", post(handlers::chats::send_greeting))
        .route("/chats/greeting/respond", post(handlers::chats::respond_greeting))
        .route("/chats/message", post(handlers::chats::send_message))
        .route("/chats", get(handlers::chats::list_chats))
        .route("/chats/pending", get(handlers::chats::list_pending))
        .route("/chats/:id", get(handlers::chats::get_chat))
        .route("/chats/:id/messages", get(handlers::chats::get_messages))
        .route("/payments/orders", post(handlers::payments::create_order))
        .route("/payments/webhooks/:method", post(handlers::payments::webhook))
        .route("/agent/conversation", post(handlers::agent::conversation));

    Router::new()
        .route("/health", get(health))
        .merge(auth_routes)
        .merge(api_routes)
        .layer(middleware::from_fn(security_headers::apply))
        .layer(middleware::from_fn(rate_limit::global_gate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") })))
}
