// handlers/b2c_handlers.rs
use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};
use validator::Validate;

use crate::dtos::callback_dtos::ResultEnvelope;
use crate::errors::AppError;
use crate::handlers::mpesa_handlers::positive_amount;
use crate::models::mpesa_entries::B2CC2BEntry;
use crate::state::AppState;

const VALID_B2C_COMMANDS: [&str; 3] = ["BusinessPayment", "SalaryPayment", "PromotionPayment"];

#[derive(Debug, Deserialize, Validate)]
pub struct InternalB2CRequest {
    #[validate(length(min = 9, message = "phone_number must be at least 9 digits"))]
    pub phone_number: String,
    pub amount: String,
    pub command_id: String,
    #[validate(length(min = 1, message = "remarks must not be empty"))]
    pub remarks: String,
    pub occasion: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct B2CHandlerResponse {
    pub success: bool,
    pub conversation_id: Option<String>,
    pub originator_conversation_id: Option<String>,
    pub response_code: Option<String>,
    pub response_description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InternalTransactionStatusRequest {
    #[validate(length(min = 1, message = "transaction_id must not be empty"))]
    pub transaction_id: String,
}

pub async fn send_b2c_payment(
    State(state): State<AppState>,
    Json(request): Json<InternalB2CRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Received B2C request: {:?}", request);

    request.validate()?;
    positive_amount(&request.amount)?;
    if !VALID_B2C_COMMANDS.contains(&request.command_id.as_str()) {
        return Err(AppError::validation(format!(
            "command_id must be one of: {}",
            VALID_B2C_COMMANDS.join(", ")
        )));
    }

    let daraja = state.daraja()?;
    let response = daraja
        .send_b2c_payment(
            &request.phone_number,
            &request.amount,
            &request.command_id,
            &request.remarks,
            request.occasion.as_deref(),
        )
        .await?;

    Ok(Json(B2CHandlerResponse {
        success: true,
        conversation_id: response.conversation_id,
        originator_conversation_id: response.originator_conversation_id,
        response_code: response.response_code,
        response_description: response.response_description,
    }))
}

pub async fn query_transaction_status(
    State(state): State<AppState>,
    Json(request): Json<InternalTransactionStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Received transaction status request: {:?}", request);

    request.validate()?;

    let daraja = state.daraja()?;
    let response = daraja
        .query_transaction_status(&request.transaction_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "conversation_id": response.conversation_id,
        "originator_conversation_id": response.originator_conversation_id,
        "response_code": response.response_code,
        "response_description": response.response_description,
    })))
}

pub async fn check_account_balance(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let daraja = state.daraja()?;
    let response = daraja.check_account_balance().await?;

    Ok(Json(json!({
        "success": true,
        "conversation_id": response.conversation_id,
        "originator_conversation_id": response.originator_conversation_id,
        "response_code": response.response_code,
        "response_description": response.response_description,
    })))
}

/// B2C result receiver, invoked by the gateway when a disbursement settles.
pub async fn b2c_result_callback(Json(payload): Json<Value>) -> impl IntoResponse {
    match serde_json::from_value::<ResultEnvelope>(payload.clone()) {
        Ok(envelope) => {
            let result = envelope.result;
            if result.result_code == 0 {
                info!("B2C payment settled: {}", result.transaction_id);
            } else {
                error!(
                    "B2C payment failed: {} - {}",
                    result.result_code, result.result_desc
                );
            }
            let entry = B2CC2BEntry::from_b2c_result(&result, payload);
            info!("B2C ledger entry: {}", json!(entry));
        }
        Err(e) => error!("Could not decode B2C result callback: {}", e),
    }

    Json(json!({ "ResultCode": 0, "ResultDesc": "Success" }))
}

pub async fn b2c_timeout_callback(Json(payload): Json<Value>) -> impl IntoResponse {
    error!("B2C request timed out in the gateway queue: {}", payload);

    Json(json!({ "ResultCode": 0, "ResultDesc": "Success" }))
}
