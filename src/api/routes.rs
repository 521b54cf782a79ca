//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use crate::api::websocket::ws_handler;
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};

/// JSON 404 for unknown routes
async fn fallback_handler(uri: axum::http::Uri) -> impl IntoResponse {
    log::debug!("No route for {}", uri.path());
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not Found" })),
    )
}

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // WebSocket event feed
        .route("/ws", get(ws_handler))
        // Ledger reads
        .route("/api/token", get(handlers::get_token_info))
        .route("/api/holders", get(handlers::get_holders))
        .route("/api/balances/{address}", get(handlers::get_balance))
        .route(
            "/api/allowances/{owner}/{spender}",
            get(handlers::get_allowance),
        )
        .route("/api/accounts/{address}/nonce", get(handlers::get_nonce))
        .route("/api/receipts", get(handlers::get_receipts))
        // Signed calls
        .route("/api/calls", post(handlers::submit_call))
        // Wallets
        .route(
            "/api/wallets",
            get(handlers::list_wallets).post(handlers::create_wallet),
        )
        .route(
            "/api/wallets/{address}/call",
            post(handlers::call_with_wallet),
        )
        .fallback(fallback_handler)
        // Add state and middleware
        .with_state(state)
        .layer(cors)
}
