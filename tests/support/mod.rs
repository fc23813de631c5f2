// Shared test fixtures: a generated gateway certificate, a canned config
// pointed at a wiremock double, and the oauth mount every operation needs.
#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::{Padding, Rsa};
use openssl::x509::{X509NameBuilder, X509};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use daraja_gateway::config::MpesaConfig;

pub const TEST_TOKEN: &str = "c9SQxWWhmdVRlyh0zh8gZDTkubVF";
pub const SHORT_CODE: &str = "600638";
pub const STK_SHORT_CODE: &str = "174379";
pub const STK_PASSKEY: &str =
    "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919";
pub const INITIATOR_PASSWORD: &str = "Safaricom999!*!";

/// Self-signed certificate standing in for the gateway's published one.
/// Returns the private key so tests can decrypt the security credential.
pub fn test_certificate() -> (Rsa<Private>, String) {
    let rsa = Rsa::generate(2048).unwrap();
    let pkey = PKey::from_rsa(rsa.clone()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "sandbox.safaricom.co.ke")
        .unwrap();
    let name = name.build();

    let serial = {
        let mut bn = BigNum::new().unwrap();
        bn.rand(159, MsbOption::MAYBE_ZERO, false).unwrap();
        bn.to_asn1_integer().unwrap()
    };

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&pkey).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();
    builder.sign(&pkey, MessageDigest::sha256()).unwrap();

    let pem = String::from_utf8(builder.build().to_pem().unwrap()).unwrap();
    (rsa, pem)
}

pub fn test_config(base_url: &str) -> (Rsa<Private>, MpesaConfig) {
    let (private_key, certificate_pem) = test_certificate();

    let config = MpesaConfig {
        environment: "sandbox".to_string(),
        base_url: base_url.trim_end_matches('/').to_string(),
        consumer_key: "test-consumer-key".to_string(),
        consumer_secret: "test-consumer-secret".to_string(),
        grant_type: "client_credentials".to_string(),
        short_code: SHORT_CODE.to_string(),
        response_type: "Completed".to_string(),
        confirmation_url: "https://example.com/api/mpesa/c2b/confirmation".to_string(),
        validation_url: "https://example.com/api/mpesa/c2b/validation".to_string(),
        initiator_name: "testapi".to_string(),
        initiator_password: INITIATOR_PASSWORD.to_string(),
        certificate_pem,
        b2c_result_url: "https://example.com/api/mpesa/b2c/result".to_string(),
        b2c_queue_timeout_url: "https://example.com/api/mpesa/b2c/timeout".to_string(),
        stk_short_code: STK_SHORT_CODE.to_string(),
        stk_passkey: STK_PASSKEY.to_string(),
        stk_callback_url: "https://example.com/api/mpesa/callback".to_string(),
    };

    (private_key, config)
}

pub async fn mount_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/oauth/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TEST_TOKEN,
            "expires_in": "3599",
        })))
        .mount(server)
        .await;
}

pub fn decrypt_credential(private_key: &Rsa<Private>, credential: &str) -> String {
    let encrypted = base64.decode(credential).unwrap();
    let mut decrypted = vec![0; private_key.size() as usize];
    let written = private_key
        .private_decrypt(&encrypted, &mut decrypted, Padding::PKCS1)
        .unwrap();
    String::from_utf8(decrypted[..written].to_vec()).unwrap()
}
