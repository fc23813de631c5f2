// handlers/mpesa_handlers.rs
use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};
use validator::Validate;

use crate::dtos::callback_dtos::StkCallbackEnvelope;
use crate::errors::AppError;
use crate::models::mpesa_entries::StkPushEntry;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct InternalStkPushRequest {
    #[validate(length(min = 9, message = "phone_number must be at least 9 digits"))]
    pub phone_number: String,
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct StkPushHandlerResponse {
    pub success: bool,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub response_code: String,
    pub response_description: String,
    pub customer_message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InternalStkQueryRequest {
    #[validate(length(min = 1, message = "checkout_request_id must not be empty"))]
    pub checkout_request_id: String,
}

pub async fn get_access_token(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let daraja = state.daraja()?;
    let token = daraja.get_access_token().await?;

    Ok(Json(json!({
        "success": true,
        "access_token": token.access_token,
        "expires_in": token.expires_in,
    })))
}

pub async fn initiate_stk_push(
    State(state): State<AppState>,
    Json(request): Json<InternalStkPushRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Received STK push request: {:?}", request);

    request.validate()?;
    positive_amount(&request.amount)?;

    let daraja = state.daraja()?;
    let response = daraja
        .initiate_stk_push(&request.phone_number, &request.amount)
        .await?;

    Ok(Json(StkPushHandlerResponse {
        success: true,
        merchant_request_id: response.merchant_request_id,
        checkout_request_id: response.checkout_request_id,
        response_code: response.response_code,
        response_description: response.response_description,
        customer_message: response.customer_message,
    }))
}

pub async fn query_stk_status(
    State(state): State<AppState>,
    Json(request): Json<InternalStkQueryRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!("Received STK query request: {:?}", request);

    request.validate()?;

    let daraja = state.daraja()?;
    let response = daraja.query_stk_status(&request.checkout_request_id).await?;

    Ok(Json(json!({
        "success": true,
        "merchant_request_id": response.merchant_request_id,
        "checkout_request_id": response.checkout_request_id,
        "result_code": response.result_code,
        "result_desc": response.result_desc,
    })))
}

/// STK result receiver, invoked by the gateway. Builds a ledger entry from
/// the callback and always acknowledges, even on payloads we cannot decode.
pub async fn stk_callback(Json(payload): Json<Value>) -> impl IntoResponse {
    match serde_json::from_value::<StkCallbackEnvelope>(payload.clone()) {
        Ok(envelope) => {
            let callback = envelope.body.stk_callback;
            if callback.result_code != 0 {
                error!(
                    "STK push {} failed: {} - {}",
                    callback.checkout_request_id, callback.result_code, callback.result_desc
                );
            }
            let entry = StkPushEntry::from_callback(&callback, payload);
            info!("STK ledger entry: {}", json!(entry));
        }
        Err(e) => error!("Could not decode STK callback: {}", e),
    }

    // the gateway expects an acknowledgement regardless of outcome
    Json(json!({ "ResultCode": 0, "ResultDesc": "Success" }))
}

pub(crate) fn positive_amount(amount: &str) -> Result<(), AppError> {
    match amount.parse::<f64>() {
        Ok(parsed) if parsed > 0.0 => Ok(()),
        _ => Err(AppError::validation("amount must be a number greater than 0")),
    }
}
