// handlers/c2b_handlers.rs
//
// C2B surface: URL registration, sandbox simulation, and the two receivers
// the gateway calls for incoming customer payments.
use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use validator::Validate;

use crate::dtos::callback_dtos::C2BCallback;
use crate::errors::AppError;
use crate::handlers::mpesa_handlers::positive_amount;
use crate::models::mpesa_entries::B2CC2BEntry;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct InternalSimulateRequest {
    pub amount: String,
    #[validate(length(min = 9, message = "msisdn must be at least 9 digits"))]
    pub msisdn: String,
    #[validate(length(min = 1, message = "bill_ref_number must not be empty"))]
    pub bill_ref_number: String,
    pub command_id: Option<String>,
}

pub async fn register_url(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let daraja = state.daraja()?;
    let response = daraja.register_url().await?;

    Ok(Json(json!({
        "success": true,
        "originator_conversation_id": response.originator_conversation_id,
        "conversation_id": response.conversation_id,
        "response_description": response.response_description,
    })))
}

pub async fn simulate_c2b(
    State(state): State<AppState>,
    Json(request): Json<InternalSimulateRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Received C2B simulation request: {:?}", request);

    request.validate()?;
    positive_amount(&request.amount)?;

    let daraja = state.daraja()?;
    let response = daraja
        .simulate_c2b(
            &request.amount,
            &request.msisdn,
            &request.bill_ref_number,
            request.command_id.as_deref(),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "originator_conversation_id": response.originator_conversation_id,
        "conversation_id": response.conversation_id,
        "response_description": response.response_description,
    })))
}

/// Validation receiver. We accept every payment; rejecting would need a
/// business rule this adapter does not own.
pub async fn c2b_validation(Json(payload): Json<Value>) -> impl IntoResponse {
    match serde_json::from_value::<C2BCallback>(payload) {
        Ok(callback) => info!(
            "C2B validation for {} - KSh {} from {}",
            callback.trans_id, callback.trans_amount, callback.msisdn
        ),
        Err(e) => error!("Could not decode C2B validation callback: {}", e),
    }

    Json(json!({ "ResultCode": 0, "ResultDesc": "Success" }))
}

/// Confirmation receiver. Builds a ledger entry for the settled payment.
pub async fn c2b_confirmation(Json(payload): Json<Value>) -> impl IntoResponse {
    match serde_json::from_value::<C2BCallback>(payload.clone()) {
        Ok(callback) => {
            let entry = B2CC2BEntry::from_c2b_confirmation(&callback, payload);
            info!("C2B ledger entry: {}", json!(entry));
        }
        Err(e) => error!("Could not decode C2B confirmation callback: {}", e),
    }

    Json(json!({ "ResultCode": 0, "ResultDesc": "Success" }))
}
