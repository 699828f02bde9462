//! Values exchanged between the orchestrator and its callers.

use serde::{Deserialize, Serialize};

use crate::invoice::ParsePath;
use crate::models::invoice::ExtractedInvoice;
use crate::models::records::{
    CaptchaChallenge, ExpenseRecord, GeoPoint, RegistrantDetails, RegistryEntry,
};

/// How far a pipeline run got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Extracted,
    /// Structured; no registration number was found.
    Structured,
    /// A captcha must be solved to verify the registration number.
    AwaitingCaptcha,
    /// Registration number known but no challenge could be fetched.
    ReadyToPersist,
    Persisted,
}

/// Non-fatal problems met during ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    /// The model output was unusable and the pattern fallback ran.
    StructuringDegraded { path: ParsePath },
    /// GST number found but no captcha could be fetched.
    BrokerUnavailable { reason: String },
    /// A field was dropped or questioned while normalizing.
    FieldIssue { message: String },
}

/// Result of `ingest`.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub stage: Stage,
    pub invoice: ExtractedInvoice,
    pub parse_path: ParsePath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha: Option<CaptchaChallenge>,
    pub warnings: Vec<PipelineWarning>,
}

impl IngestReport {
    /// Whether the caller has to solve a captcha to finish.
    pub fn needs_captcha(&self) -> bool {
        self.stage == Stage::AwaitingCaptcha
    }
}

/// Caller-held context for `verify`.
///
/// Field aliases accept the names used by the web client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(default, alias = "gst_number")]
    pub registration_number: String,

    #[serde(default, alias = "captcha")]
    pub captcha_text: String,

    #[serde(default, alias = "captcha_cookie")]
    pub session_token: String,

    /// The invoice returned by `ingest`; without it only the registry
    /// record is saved.
    #[serde(default, alias = "ai_data")]
    pub invoice: Option<ExtractedInvoice>,
}

/// Result of a successful `verify`.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub registrant: RegistrantDetails,
    pub location: Option<GeoPoint>,
    pub registry_entry: RegistryEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expense: Option<ExpenseRecord>,
}

impl VerifyOutcome {
    pub fn expense_saved(&self) -> bool {
        self.expense.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_request_accepts_client_names() {
        let request: VerifyRequest = serde_json::from_str(
            r#"{"gst_number": "27AAPFU0939F1ZV", "captcha": "123456",
                "captcha_cookie": "tok", "ai_data": {"store_name": "Kirana", "items": []}}"#,
        )
        .unwrap();

        assert_eq!(request.registration_number, "27AAPFU0939F1ZV");
        assert_eq!(request.captcha_text, "123456");
        assert_eq!(request.session_token, "tok");
        assert_eq!(
            request.invoice.and_then(|i| i.store_name).as_deref(),
            Some("Kirana")
        );
    }

    #[test]
    fn test_verify_request_missing_fields_default_empty() {
        let request: VerifyRequest = serde_json::from_str(r#"{"captcha": "123456"}"#).unwrap();
        assert!(request.registration_number.is_empty());
        assert!(request.invoice.is_none());
    }

    #[test]
    fn test_warning_serialization() {
        let warning = PipelineWarning::StructuringDegraded {
            path: ParsePath::Fallback,
        };
        assert_eq!(
            serde_json::to_value(&warning).unwrap(),
            serde_json::json!({"kind": "structuring_degraded", "path": "fallback"})
        );
    }
}
