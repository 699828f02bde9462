//! Registry validator: submits a solved captcha and classifies the answer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::COOKIE;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::BillscanError;
use crate::models::config::RegistryConfig;
use crate::models::records::{RegistrantDetails, RegistryResult};

use super::TaxRegistry;

/// The two documented registry error codes.
#[derive(Debug, Clone)]
pub struct ErrorCodes {
    pub invalid_number: String,
    pub invalid_captcha: String,
}

impl From<&RegistryConfig> for ErrorCodes {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            invalid_number: config.invalid_number_code.clone(),
            invalid_captcha: config.invalid_captcha_code.clone(),
        }
    }
}

/// Client for the registry's taxpayer-details endpoint.
pub struct RegistryValidator {
    client: Client,
    details_url: String,
    cookie_name: String,
    codes: ErrorCodes,
}

impl RegistryValidator {
    pub fn new(config: &RegistryConfig) -> Result<Self, BillscanError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            details_url: config.details_url.clone(),
            cookie_name: config.cookie_name.clone(),
            codes: ErrorCodes::from(config),
        })
    }
}

#[async_trait]
impl TaxRegistry for RegistryValidator {
    async fn validate(
        &self,
        registration_number: &str,
        captcha_text: &str,
        session_token: &str,
    ) -> RegistryResult {
        let payload = json!({ "gstin": registration_number, "captcha": captcha_text });

        let response = self
            .client
            .post(&self.details_url)
            .header(COOKIE, format!("{}={}", self.cookie_name, session_token))
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!("Registry request failed: {}", e);
                let reason = if e.is_timeout() {
                    "registry request timed out".to_string()
                } else {
                    e.to_string()
                };
                return RegistryResult::TransportError { reason };
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read registry response: {}", e);
                return RegistryResult::TransportError {
                    reason: e.to_string(),
                };
            }
        };
        debug!("Registry answered {} ({} bytes)", status, body.len());

        let result = classify_response(status.is_success(), &body, &self.codes);
        info!(registration_number, outcome = outcome_name(&result), "Registry lookup finished");
        result
    }
}

fn outcome_name(result: &RegistryResult) -> &'static str {
    match result {
        RegistryResult::Verified(_) => "verified",
        RegistryResult::InvalidNumber => "invalid_number",
        RegistryResult::InvalidCaptcha => "invalid_captcha",
        RegistryResult::TransportError { .. } => "transport_error",
    }
}

/// Classify a registry response body.
///
/// The documented error codes win regardless of HTTP status. A success needs
/// a JSON object naming the registrant: a non-empty `gstin`, `lgnm` or
/// `tradeNam`, or a `pradr` object. Anything else is a transport error; it is
/// never treated as a verified registration.
pub fn classify_response(status_ok: bool, body: &str, codes: &ErrorCodes) -> RegistryResult {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => {
            return RegistryResult::TransportError {
                reason: "registry returned a non-JSON body".to_string(),
            };
        }
    };

    let Some(object) = value.as_object() else {
        return RegistryResult::TransportError {
            reason: "registry returned a non-object body".to_string(),
        };
    };

    if let Some(code) = object.get("errorCode").and_then(Value::as_str) {
        return if code == codes.invalid_number {
            RegistryResult::InvalidNumber
        } else if code == codes.invalid_captcha {
            RegistryResult::InvalidCaptcha
        } else {
            RegistryResult::TransportError {
                reason: format!("registry error code {}", code),
            }
        };
    }

    if object.contains_key("errorCode") || object.contains_key("error") {
        return RegistryResult::TransportError {
            reason: "registry returned an unrecognised error".to_string(),
        };
    }

    if !status_ok {
        return RegistryResult::TransportError {
            reason: "registry returned an error status".to_string(),
        };
    }

    if !names_registrant(&value) {
        return RegistryResult::TransportError {
            reason: "registry response has no registrant details".to_string(),
        };
    }

    RegistryResult::Verified(RegistrantDetails {
        legal_name: registrant_name(&value),
        registered_address: nested_str(&value, &["pradr", "adr"]),
        raw: value,
    })
}

fn names_registrant(value: &Value) -> bool {
    let present = |key: &str| !nested_str(value, &[key]).trim().is_empty();
    present("gstin")
        || present("lgnm")
        || present("tradeNam")
        || value.get("pradr").is_some_and(Value::is_object)
}

/// Trade name, or the legal name when the trade name is blank.
fn registrant_name(value: &Value) -> String {
    let trade = nested_str(value, &["tradeNam"]);
    if trade.trim().is_empty() {
        nested_str(value, &["lgnm"])
    } else {
        trade
    }
}

/// String at a nested path; any missing or non-string step yields "".
fn nested_str(value: &Value, path: &[&str]) -> String {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn codes() -> ErrorCodes {
        ErrorCodes::from(&RegistryConfig::default())
    }

    #[test]
    fn test_classify_documented_codes() {
        let invalid_number = r#"{"errorCode": "SWEB_9035", "message": "No records found"}"#;
        let invalid_captcha = r#"{"errorCode": "SWEB_9000", "message": "Invalid captcha"}"#;

        assert_eq!(classify_response(true, invalid_number, &codes()), RegistryResult::InvalidNumber);
        assert_eq!(classify_response(false, invalid_captcha, &codes()), RegistryResult::InvalidCaptcha);
    }

    #[test]
    fn test_classify_unknown_shapes_are_transport_errors() {
        for (ok, body) in [
            (true, r#"{"errorCode": "SWEB_1234"}"#),
            (true, "<html>Service Unavailable</html>"),
            (true, "[]"),
            (false, r#"{"gstin": "27AAPFU0939F1ZV"}"#),
            (true, "{}"),
            (true, r#"{"message": "Session expired"}"#),
            (true, r#"{"errorCode": 9000}"#),
            (true, r#"{"error": {"code": "SWEB_9000"}}"#),
            (true, r#"{"gstin": "  ", "pradr": 7}"#),
        ] {
            assert!(
                matches!(classify_response(ok, body, &codes()), RegistryResult::TransportError { .. }),
                "{} should be a transport error",
                body
            );
        }
    }

    #[test]
    fn test_classify_success_extracts_nested_fields() {
        let body = r#"{
            "gstin": "27AAPFU0939F1ZV",
            "lgnm": "FRESH MART RETAIL LLP",
            "tradeNam": "FRESH MART",
            "pradr": {"adr": "12, MG Road, Pune, Maharashtra, 411001"}
        }"#;

        let RegistryResult::Verified(details) = classify_response(true, body, &codes()) else {
            panic!("expected verified");
        };
        assert_eq!(details.legal_name, "FRESH MART");
        assert_eq!(details.registered_address, "12, MG Road, Pune, Maharashtra, 411001");
        assert_eq!(details.raw["gstin"], "27AAPFU0939F1ZV");
    }

    #[test]
    fn test_classify_success_missing_fields_are_empty() {
        let RegistryResult::Verified(details) =
            classify_response(true, r#"{"pradr": {"addr": {}}, "lgnm": "ACME"}"#, &codes())
        else {
            panic!("expected verified");
        };
        assert_eq!(details.legal_name, "ACME");
        assert_eq!(details.registered_address, "");

        let body = r#"{"gstin": "27AAPFU0939F1ZV", "pradr": 7}"#;
        let RegistryResult::Verified(details) = classify_response(true, body, &codes()) else {
            panic!("expected verified");
        };
        assert_eq!(details.legal_name, "");
        assert_eq!(details.registered_address, "");
    }
}
