use axum::{
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::handlers::b2c_handlers;
use crate::handlers::c2b_handlers;
use crate::handlers::mpesa_handlers;
use crate::state::AppState;

pub fn mpesa_routes() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health", get(mpesa_health))

        // Token (operations debugging)
        .route("/token", get(mpesa_handlers::get_access_token))

        // C2B routes
        .route("/register-url", post(c2b_handlers::register_url))
        .route("/c2b/simulate", post(c2b_handlers::simulate_c2b))
        .route("/c2b/validation", post(c2b_handlers::c2b_validation))
        .route("/c2b/confirmation", post(c2b_handlers::c2b_confirmation))

        // STK push routes
        .route("/stk-push", post(mpesa_handlers::initiate_stk_push))
        .route("/stk-query", post(mpesa_handlers::query_stk_status))
        .route("/callback", post(mpesa_handlers::stk_callback))

        // B2C routes
        .route("/b2c/send", post(b2c_handlers::send_b2c_payment))
        .route("/b2c/result", post(b2c_handlers::b2c_result_callback))
        .route("/b2c/timeout", post(b2c_handlers::b2c_timeout_callback))

        // Account queries
        .route(
            "/transaction-status",
            post(b2c_handlers::query_transaction_status),
        )
        .route("/balance", get(b2c_handlers::check_account_balance))
}

async fn mpesa_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "mpesa",
        "timestamp": Utc::now().to_rfc3339(),
        "features": ["c2b", "b2c", "stk-push", "stk-query", "transaction-status", "balance"]
    }))
}
