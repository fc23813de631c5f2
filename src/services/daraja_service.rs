// services/daraja_service.rs
//
// The gateway client. Every public operation fetches a fresh access token,
// builds the Daraja payload, POSTs it and decodes the typed response. The
// token fetch always completes before the main call starts.
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use chrono::Utc;
use openssl::error::ErrorStack;
use openssl::pkey::Public;
use openssl::rsa::{Padding, Rsa};
use openssl::x509::X509;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::MpesaConfig;
use crate::dtos::mpesa_dtos::*;
use crate::errors::{AppError, DarajaError};

pub struct DarajaService {
    config: MpesaConfig,
    client: Client,
    certificate_key: Rsa<Public>,
}

impl DarajaService {
    pub fn new(config: MpesaConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::configuration(format!("could not build HTTP client: {}", e)))?;

        let certificate = X509::from_pem(config.certificate_pem.as_bytes()).map_err(|e| {
            AppError::configuration(format!("gateway certificate is not valid PEM: {}", e))
        })?;
        let certificate_key = certificate
            .public_key()
            .and_then(|key| key.rsa())
            .map_err(|e| {
                AppError::configuration(format!(
                    "gateway certificate does not carry an RSA public key: {}",
                    e
                ))
            })?;

        Ok(DarajaService {
            config,
            client,
            certificate_key,
        })
    }

    /// Fetches a fresh OAuth token. Called internally by every operation;
    /// tokens are never cached or shared between calls.
    pub async fn get_access_token(&self) -> Result<AccessTokenResponse, DarajaError> {
        const OPERATION: &str = "access token";

        let credentials = base64.encode(format!(
            "{}:{}",
            self.config.consumer_key, self.config.consumer_secret
        ));

        let response = self
            .client
            .get(self.config.oauth_endpoint())
            .query(&[("grant_type", self.config.grant_type.as_str())])
            .header(header::AUTHORIZATION, format!("Basic {}", credentials))
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| {
                error!("could not reach the oauth endpoint: {}", e);
                DarajaError::transport(OPERATION, e)
            })?;

        decode_response(OPERATION, response).await
    }

    /// Registers the configured C2B confirmation and validation URLs.
    pub async fn register_url(&self) -> Result<RegisterUrlResponse, DarajaError> {
        const OPERATION: &str = "register url";

        let request = RegisterUrlRequest {
            short_code: self.config.short_code.clone(),
            response_type: self.config.response_type.clone(),
            confirmation_url: self.config.confirmation_url.clone(),
            validation_url: self.config.validation_url.clone(),
        };

        info!(
            "Registering C2B URLs for short code {}",
            self.config.short_code
        );

        let response: RegisterUrlResponse = self
            .post_authorized(OPERATION, &self.config.register_url_endpoint(), &request)
            .await?;

        check_gateway_ack(
            OPERATION,
            response.response_code.as_deref(),
            response.response_description.as_deref(),
        )?;
        Ok(response)
    }

    /// Simulates a C2B payment (sandbox only). Caller-supplied fields are
    /// forwarded verbatim.
    pub async fn simulate_c2b(
        &self,
        amount: &str,
        msisdn: &str,
        bill_ref_number: &str,
        command_id: Option<&str>,
    ) -> Result<SimulateTransactionResponse, DarajaError> {
        const OPERATION: &str = "simulate c2b";

        let request = SimulateTransactionRequest {
            short_code: self.config.short_code.clone(),
            command_id: command_id.unwrap_or(CUSTOMER_PAY_BILL_ONLINE).to_string(),
            amount: amount.to_string(),
            msisdn: msisdn.to_string(),
            bill_ref_number: bill_ref_number.to_string(),
        };

        info!("Simulating C2B payment of KSh {} from {}", amount, msisdn);

        let response: SimulateTransactionResponse = self
            .post_authorized(OPERATION, &self.config.simulate_endpoint(), &request)
            .await?;

        check_gateway_ack(
            OPERATION,
            response.response_code.as_deref(),
            response.response_description.as_deref(),
        )?;
        Ok(response)
    }

    /// Sends money to a customer. The security credential is recomputed for
    /// every call from the initiator password and the gateway certificate.
    pub async fn send_b2c_payment(
        &self,
        phone_number: &str,
        amount: &str,
        command_id: &str,
        remarks: &str,
        occasion: Option<&str>,
    ) -> Result<CommonSyncResponse, DarajaError> {
        const OPERATION: &str = "b2c payment";

        let msisdn = format_msisdn(phone_number);
        let request = B2CTransactionRequest {
            initiator_name: self.config.initiator_name.clone(),
            security_credential: security_credential(
                &self.certificate_key,
                &self.config.initiator_password,
            )?,
            command_id: command_id.to_string(),
            amount: amount.to_string(),
            party_a: self.config.short_code.clone(),
            party_b: msisdn.clone(),
            remarks: remarks.to_string(),
            queue_timeout_url: self.config.b2c_queue_timeout_url.clone(),
            result_url: self.config.b2c_result_url.clone(),
            occasion: occasion.map(str::to_string),
        };

        info!("B2C: sending KSh {} to {}", amount, msisdn);

        let response: CommonSyncResponse = self
            .post_authorized(OPERATION, &self.config.b2c_endpoint(), &request)
            .await?;

        check_gateway_ack(
            OPERATION,
            response.response_code.as_deref(),
            response.response_description.as_deref(),
        )?;

        if let Some(conversation_id) = &response.conversation_id {
            info!("B2C accepted: {}", conversation_id);
        }
        Ok(response)
    }

    /// Queries the result of a completed transaction by its M-Pesa receipt.
    pub async fn query_transaction_status(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionStatusSyncResponse, DarajaError> {
        const OPERATION: &str = "transaction status";

        let request = TransactionStatusRequest {
            initiator: self.config.initiator_name.clone(),
            security_credential: security_credential(
                &self.certificate_key,
                &self.config.initiator_password,
            )?,
            command_id: TRANSACTION_STATUS_QUERY_COMMAND.to_string(),
            transaction_id: transaction_id.to_string(),
            party_a: self.config.short_code.clone(),
            identifier_type: SHORT_CODE_IDENTIFIER.to_string(),
            result_url: self.config.b2c_result_url.clone(),
            queue_timeout_url: self.config.b2c_queue_timeout_url.clone(),
            remarks: TRANSACTION_STATUS_VALUE.to_string(),
            occasion: TRANSACTION_STATUS_VALUE.to_string(),
        };

        info!("Querying status of transaction {}", transaction_id);

        let response: TransactionStatusSyncResponse = self
            .post_authorized(
                OPERATION,
                &self.config.transaction_status_endpoint(),
                &request,
            )
            .await?;

        check_gateway_ack(
            OPERATION,
            response.response_code.as_deref(),
            response.response_description.as_deref(),
        )?;
        Ok(response)
    }

    /// Queries the working account balance of the configured short code.
    pub async fn check_account_balance(&self) -> Result<CommonSyncResponse, DarajaError> {
        const OPERATION: &str = "account balance";

        let request = AccountBalanceRequest {
            initiator: self.config.initiator_name.clone(),
            security_credential: security_credential(
                &self.certificate_key,
                &self.config.initiator_password,
            )?,
            command_id: ACCOUNT_BALANCE_COMMAND.to_string(),
            party_a: self.config.short_code.clone(),
            identifier_type: SHORT_CODE_IDENTIFIER.to_string(),
            remarks: ACCOUNT_BALANCE_REMARKS.to_string(),
            queue_timeout_url: self.config.b2c_queue_timeout_url.clone(),
            result_url: self.config.b2c_result_url.clone(),
        };

        info!("Checking account balance for {}", self.config.short_code);

        let response: CommonSyncResponse = self
            .post_authorized(OPERATION, &self.config.account_balance_endpoint(), &request)
            .await?;

        check_gateway_ack(
            OPERATION,
            response.response_code.as_deref(),
            response.response_description.as_deref(),
        )?;
        Ok(response)
    }

    /// Pushes a payment prompt to the payer's device. Timestamp and password
    /// are derived at call time, so no two calls share them.
    pub async fn initiate_stk_push(
        &self,
        phone_number: &str,
        amount: &str,
    ) -> Result<StkPushSyncResponse, DarajaError> {
        const OPERATION: &str = "stk push";

        let msisdn = format_msisdn(phone_number);
        let timestamp = transaction_timestamp();
        let password = stk_password(
            &self.config.stk_short_code,
            &self.config.stk_passkey,
            &timestamp,
        );

        let request = StkPushRequest {
            business_short_code: self.config.stk_short_code.clone(),
            password,
            timestamp,
            transaction_type: CUSTOMER_PAY_BILL_ONLINE.to_string(),
            amount: amount.to_string(),
            party_a: msisdn.clone(),
            party_b: self.config.stk_short_code.clone(),
            phone_number: msisdn.clone(),
            callback_url: self.config.stk_callback_url.clone(),
            account_reference: transaction_reference(),
            transaction_desc: format!("{} Transaction", msisdn),
        };

        info!("STK push to {} for KSh {}", msisdn, amount);

        let response: StkPushSyncResponse = self
            .post_authorized(OPERATION, &self.config.stk_push_endpoint(), &request)
            .await?;

        check_gateway_ack(
            OPERATION,
            Some(&response.response_code),
            Some(&response.response_description),
        )?;

        info!("STK push accepted: {}", response.merchant_request_id);
        Ok(response)
    }

    /// Queries the outcome of an earlier STK push by its checkout request id.
    pub async fn query_stk_status(
        &self,
        checkout_request_id: &str,
    ) -> Result<LnmQueryResponse, DarajaError> {
        const OPERATION: &str = "stk query";

        let timestamp = transaction_timestamp();
        let password = stk_password(
            &self.config.stk_short_code,
            &self.config.stk_passkey,
            &timestamp,
        );

        let request = LnmQueryRequest {
            business_short_code: self.config.stk_short_code.clone(),
            password,
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };

        info!("Querying STK push {}", checkout_request_id);

        let response: LnmQueryResponse = self
            .post_authorized(OPERATION, &self.config.stk_query_endpoint(), &request)
            .await?;

        check_gateway_ack(
            OPERATION,
            Some(&response.response_code),
            Some(&response.response_description),
        )?;
        Ok(response)
    }

    /// Shared shape of every authorized call: fetch a token, POST the JSON
    /// body with Bearer auth, then decode the typed response. Field mapping
    /// stays with each operation.
    async fn post_authorized<B, T>(
        &self,
        operation: &'static str,
        url: &str,
        body: &B,
    ) -> Result<T, DarajaError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self
            .get_access_token()
            .await
            .map_err(|e| DarajaError::Auth(Box::new(e)))?;

        let response = self
            .client
            .post(url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.access_token),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("{}: request to the gateway failed: {}", operation, e);
                DarajaError::transport(operation, e)
            })?;

        decode_response(operation, response).await
    }
}

/// Reads the response body once, then splits on status: non-2xx becomes an
/// upstream error (typed when the gateway sent its error shape, raw text
/// otherwise), 2xx is decoded into `T` with the body text kept on failure.
async fn decode_response<T: DeserializeOwned>(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<T, DarajaError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| {
        error!("{}: could not read the gateway response: {}", operation, e);
        DarajaError::transport(operation, e)
    })?;

    if !status.is_success() {
        return Err(upstream_error(operation, status, body));
    }

    serde_json::from_str(&body).map_err(|e| {
        error!(
            "{}: could not decode the gateway response: {} (body: {})",
            operation, e, body
        );
        DarajaError::decode(operation, e, body)
    })
}

fn upstream_error(operation: &'static str, status: StatusCode, body: String) -> DarajaError {
    let error = match serde_json::from_str::<GatewayErrorResponse>(&body) {
        Ok(gateway) => DarajaError::upstream(operation, gateway.error_code, gateway.error_message),
        Err(_) => DarajaError::upstream(operation, status.as_str(), body),
    };
    error!("{}", error);
    error
}

/// A 2xx body can still carry a rejection in its ResponseCode. Accept codes
/// made of zeroes (the gateway answers "0" or zero-padded variants); bodies
/// with no code at all are legacy shapes and count as accepted.
fn check_gateway_ack(
    operation: &'static str,
    code: Option<&str>,
    description: Option<&str>,
) -> Result<(), DarajaError> {
    match code {
        Some(code) if !code.chars().all(|c| c == '0') => {
            let error = DarajaError::upstream(
                operation,
                code,
                description.unwrap_or("no description given"),
            );
            error!("{}", error);
            Err(error)
        }
        _ => Ok(()),
    }
}

/// base64(short_code + passkey + timestamp), recomputed for every STK call.
pub fn stk_password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    base64.encode(format!("{}{}{}", short_code, passkey, timestamp))
}

/// Gateway timestamp format, yyyyMMddHHmmss.
pub fn transaction_timestamp() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// Uniqueness token used as the STK AccountReference.
pub fn transaction_reference() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_uppercase()
}

/// Normalizes Kenyan msisdns to the 254 form the gateway expects. Inputs
/// already in canonical form pass through unchanged.
pub fn format_msisdn(phone: &str) -> String {
    let phone = phone.trim();
    if phone.starts_with("254") && phone.len() == 12 {
        return phone.to_string();
    }
    if phone.starts_with("07") && phone.len() == 10 {
        return format!("254{}", &phone[1..]);
    }
    if phone.starts_with('7') && phone.len() == 9 {
        return format!("254{}", phone);
    }
    phone.to_string()
}

/// RSA PKCS#1 v1.5 encryption of the initiator password under the gateway
/// certificate's public key, base64 encoded. The scheme the gateway
/// documents for privileged API credentials.
pub fn security_credential(
    certificate_key: &Rsa<Public>,
    initiator_password: &str,
) -> Result<String, ErrorStack> {
    let mut encrypted = vec![0; certificate_key.size() as usize];
    let written = certificate_key.public_encrypt(
        initiator_password.as_bytes(),
        &mut encrypted,
        Padding::PKCS1,
    )?;
    encrypted.truncate(written);
    Ok(base64.encode(&encrypted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stk_password_matches_known_vector() {
        let password = stk_password(
            "174379",
            "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919",
            "20231005141023",
        );
        assert_eq!(
            password,
            base64.encode(
                "174379bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919\
                 20231005141023"
            )
        );
    }

    #[test]
    fn stk_password_changes_with_the_timestamp() {
        let first = stk_password("174379", "passkey", "20231005141023");
        let second = stk_password("174379", "passkey", "20231005141024");
        assert_ne!(first, second);
    }

    #[test]
    fn transaction_timestamp_has_gateway_shape() {
        let timestamp = transaction_timestamp();
        assert_eq!(timestamp.len(), 14);
        assert!(timestamp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn transaction_references_are_short_and_unique() {
        let first = transaction_reference();
        let second = transaction_reference();
        assert_eq!(first.len(), 12);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_ne!(first, second);
    }

    #[test]
    fn format_msisdn_normalizes_local_forms() {
        assert_eq!(format_msisdn("0712345678"), "254712345678");
        assert_eq!(format_msisdn("712345678"), "254712345678");
        assert_eq!(format_msisdn("254712345678"), "254712345678");
        assert_eq!(format_msisdn(" 254712345678 "), "254712345678");
        // unknown shapes are left for the gateway to reject
        assert_eq!(format_msisdn("+254712345678"), "+254712345678");
    }

    #[test]
    fn gateway_ack_accepts_zero_codes_and_missing_codes() {
        assert!(check_gateway_ack("op", Some("0"), None).is_ok());
        assert!(check_gateway_ack("op", Some("00000000"), Some("Accepted")).is_ok());
        assert!(check_gateway_ack("op", None, None).is_ok());
    }

    #[test]
    fn gateway_ack_rejects_nonzero_codes() {
        let error = check_gateway_ack("op", Some("1032"), Some("Request cancelled by user"))
            .unwrap_err();
        match error {
            DarajaError::Upstream {
                code, description, ..
            } => {
                assert_eq!(code, "1032");
                assert_eq!(description, "Request cancelled by user");
            }
            other => panic!("expected an upstream error, got {:?}", other),
        }
    }

    #[test]
    fn security_credential_decrypts_back_to_the_password() {
        let private = Rsa::generate(2048).unwrap();
        let public = Rsa::from_public_components(
            private.n().to_owned().unwrap(),
            private.e().to_owned().unwrap(),
        )
        .unwrap();

        let credential = security_credential(&public, "Safaricom999!*!").unwrap();
        let encrypted = base64.decode(credential).unwrap();

        let mut decrypted = vec![0; private.size() as usize];
        let written = private
            .private_decrypt(&encrypted, &mut decrypted, Padding::PKCS1)
            .unwrap();
        assert_eq!(&decrypted[..written], b"Safaricom999!*!");
    }
}
