// config.rs
use std::{env, fs};

use crate::errors::AppError;

pub const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
pub const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";

/// Gateway credentials and endpoints, loaded once and injected into
/// `DarajaService` at construction. Immutable after `from_env`.
#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub environment: String,
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub grant_type: String,
    pub short_code: String,
    pub response_type: String,
    pub confirmation_url: String,
    pub validation_url: String,
    pub initiator_name: String,
    pub initiator_password: String,
    pub certificate_pem: String,
    pub b2c_result_url: String,
    pub b2c_queue_timeout_url: String,
    pub stk_short_code: String,
    pub stk_passkey: String,
    pub stk_callback_url: String,
}

impl MpesaConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let environment =
            env::var("MPESA_ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string());

        // MPESA_BASE_URL overrides the environment switch (local doubles, proxies).
        let base_url = match env::var("MPESA_BASE_URL") {
            Ok(url) => url.trim_end_matches('/').to_string(),
            Err(_) if environment == "production" => PRODUCTION_BASE_URL.to_string(),
            Err(_) => SANDBOX_BASE_URL.to_string(),
        };

        let certificate_path = required("MPESA_CERTIFICATE_PATH")?;
        let certificate_pem = fs::read_to_string(&certificate_path).map_err(|e| {
            AppError::Configuration(format!(
                "could not read gateway certificate {}: {}",
                certificate_path, e
            ))
        })?;

        Ok(MpesaConfig {
            environment,
            base_url,
            consumer_key: required("MPESA_CONSUMER_KEY")?,
            consumer_secret: required("MPESA_CONSUMER_SECRET")?,
            grant_type: env::var("MPESA_GRANT_TYPE")
                .unwrap_or_else(|_| "client_credentials".to_string()),
            short_code: required("MPESA_SHORT_CODE")?,
            response_type: env::var("MPESA_RESPONSE_TYPE")
                .unwrap_or_else(|_| "Completed".to_string()),
            confirmation_url: required("MPESA_CONFIRMATION_URL")?,
            validation_url: required("MPESA_VALIDATION_URL")?,
            initiator_name: required("MPESA_INITIATOR_NAME")?,
            initiator_password: required("MPESA_INITIATOR_PASSWORD")?,
            certificate_pem,
            b2c_result_url: required("MPESA_B2C_RESULT_URL")?,
            b2c_queue_timeout_url: required("MPESA_B2C_QUEUE_TIMEOUT_URL")?,
            stk_short_code: required("MPESA_STK_SHORT_CODE")?,
            stk_passkey: required("MPESA_STK_PASSKEY")?,
            stk_callback_url: required("MPESA_STK_CALLBACK_URL")?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn oauth_endpoint(&self) -> String {
        format!("{}/oauth/v1/generate", self.base_url)
    }

    pub fn register_url_endpoint(&self) -> String {
        format!("{}/mpesa/c2b/v1/registerurl", self.base_url)
    }

    pub fn simulate_endpoint(&self) -> String {
        format!("{}/mpesa/c2b/v1/simulate", self.base_url)
    }

    pub fn b2c_endpoint(&self) -> String {
        format!("{}/mpesa/b2c/v1/paymentrequest", self.base_url)
    }

    pub fn transaction_status_endpoint(&self) -> String {
        format!("{}/mpesa/transactionstatus/v1/query", self.base_url)
    }

    pub fn account_balance_endpoint(&self) -> String {
        format!("{}/mpesa/accountbalance/v1/query", self.base_url)
    }

    pub fn stk_push_endpoint(&self) -> String {
        format!("{}/mpesa/stkpush/v1/processrequest", self.base_url)
    }

    pub fn stk_query_endpoint(&self) -> String {
        format!("{}/mpesa/stkpushquery/v1/query", self.base_url)
    }

    /// Boot-time summary for the logs. Secrets are reported by presence only.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "environment": self.environment,
            "is_production": self.is_production(),
            "base_url": self.base_url,
            "short_code": self.short_code,
            "stk_short_code": self.stk_short_code,
            "initiator_name": self.initiator_name,
            "stk_callback_url": self.stk_callback_url,
            "b2c_result_url": self.b2c_result_url,
            "b2c_timeout_url": self.b2c_queue_timeout_url,
            "consumer_key_set": !self.consumer_key.is_empty(),
            "consumer_secret_set": !self.consumer_secret.is_empty(),
            "certificate_loaded": !self.certificate_pem.is_empty(),
        })
    }
}

fn required(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Configuration(format!("{} must be set", name)))
}
