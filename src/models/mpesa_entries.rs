// models/mpesa_entries.rs
//
// Passive ledger records built from gateway callbacks. Whatever store keeps
// them is an external collaborator; here they only get constructed and logged.
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::dtos::callback_dtos::{B2CResult, C2BCallback, StkCallback};
use crate::dtos::mpesa_dtos::CUSTOMER_PAY_BILL_ONLINE;

#[derive(Debug, Clone, Serialize)]
pub struct StkPushEntry {
    pub transaction_id: Option<String>,
    pub transaction_type: String,
    pub msisdn: Option<String>,
    pub amount: Option<String>,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub entry_date: DateTime<Utc>,
    pub result_code: String,
    pub raw_callback_payload: Value,
}

impl StkPushEntry {
    pub fn from_callback(callback: &StkCallback, raw_payload: Value) -> Self {
        let metadata = callback.callback_metadata.as_ref();
        StkPushEntry {
            transaction_id: metadata
                .and_then(|m| m.value_of("MpesaReceiptNumber"))
                .map(text),
            transaction_type: CUSTOMER_PAY_BILL_ONLINE.to_string(),
            msisdn: metadata.and_then(|m| m.value_of("PhoneNumber")).map(text),
            amount: metadata.and_then(|m| m.value_of("Amount")).map(text),
            merchant_request_id: callback.merchant_request_id.clone(),
            checkout_request_id: callback.checkout_request_id.clone(),
            entry_date: Utc::now(),
            result_code: callback.result_code.to_string(),
            raw_callback_payload: raw_payload,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct B2CC2BEntry {
    pub transaction_type: String,
    pub transaction_id: String,
    pub bill_ref_number: Option<String>,
    pub msisdn: Option<String>,
    pub amount: Option<String>,
    pub conversation_id: Option<String>,
    pub originator_conversation_id: Option<String>,
    pub entry_date: DateTime<Utc>,
    pub result_code: String,
    pub raw_callback_payload: Value,
}

impl B2CC2BEntry {
    pub fn from_b2c_result(result: &B2CResult, raw_payload: Value) -> Self {
        let params = result.result_parameters.as_ref();
        B2CC2BEntry {
            transaction_type: "B2C".to_string(),
            transaction_id: result.transaction_id.clone(),
            bill_ref_number: None,
            // ReceiverPartyPublicName comes as "2547XXXXXXXX - Full Name"
            msisdn: params
                .and_then(|p| p.value_of("ReceiverPartyPublicName"))
                .and_then(Value::as_str)
                .and_then(|name| name.split(" - ").next())
                .map(str::to_string),
            amount: params.and_then(|p| p.value_of("TransactionAmount")).map(text),
            conversation_id: Some(result.conversation_id.clone()),
            originator_conversation_id: Some(result.originator_conversation_id.clone()),
            entry_date: Utc::now(),
            result_code: result.result_code.to_string(),
            raw_callback_payload: raw_payload,
        }
    }

    pub fn from_c2b_confirmation(callback: &C2BCallback, raw_payload: Value) -> Self {
        B2CC2BEntry {
            transaction_type: callback.transaction_type.clone(),
            transaction_id: callback.trans_id.clone(),
            bill_ref_number: callback.bill_ref_number.clone(),
            msisdn: Some(callback.msisdn.clone()),
            amount: Some(callback.trans_amount.clone()),
            conversation_id: None,
            originator_conversation_id: None,
            entry_date: Utc::now(),
            result_code: "0".to_string(),
            raw_callback_payload: raw_payload,
        }
    }
}

// Metadata values arrive as strings or bare numbers; keep both as text.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
