//! Records exchanged with the registry, the geocoder and storage.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::invoice::{ExtractedInvoice, LineItem};

/// A captcha image plus the session token that redeems it.
///
/// One challenge serves one validation attempt; the registry binds the token
/// to a single solved value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaChallenge {
    /// Raw image bytes as returned by the registry.
    #[serde(skip)]
    pub image: Vec<u8>,

    /// File name under which the image is served back to the user.
    pub image_ref: String,

    /// Value of the registry's captcha session cookie.
    pub session_token: String,
}

/// Registrant details returned by a successful registry lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrantDetails {
    /// Trade name (falls back to the legal name when no trade name is set).
    pub legal_name: String,

    /// Principal place of business.
    pub registered_address: String,

    /// Full registry payload.
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Outcome of a registry lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistryResult {
    Verified(RegistrantDetails),
    InvalidNumber,
    InvalidCaptcha,
    TransportError { reason: String },
}

/// A resolved address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

/// An expense as persisted after successful verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub id: Uuid,
    pub user_id: String,
    pub registration_number: String,
    pub store_name: Option<String>,
    pub total_amount: Decimal,
    pub date: NaiveDate,
    pub address: Option<String>,
    pub items: Vec<LineItem>,
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
}

impl ExpenseRecord {
    /// Merge model-derived fields with registry-confirmed ones.
    ///
    /// Registry name and address override the model's when non-empty; the
    /// model fills everything else. A missing date becomes the creation date
    /// and a missing total becomes zero.
    pub fn merge(
        user_id: &str,
        registration_number: &str,
        invoice: &ExtractedInvoice,
        registrant: &RegistrantDetails,
        location: Option<GeoPoint>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            registration_number: registration_number.to_string(),
            store_name: prefer_registry(&registrant.legal_name, invoice.store_name.as_deref()),
            total_amount: invoice.total_amount.unwrap_or(Decimal::ZERO),
            date: invoice.date.unwrap_or_else(|| created_at.date_naive()),
            address: prefer_registry(&registrant.registered_address, invoice.address.as_deref()),
            items: invoice.items.clone(),
            location,
            created_at,
        }
    }
}

/// Registry lookup as persisted, independent of any expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: Uuid,
    pub user_id: String,
    pub registration_number: String,
    pub business_name: Option<String>,
    pub address: Option<String>,
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
}

/// A known user, as supplied by the auth/storage collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Pick the registry value unless it is blank.
pub fn prefer_registry(registry: &str, model: Option<&str>) -> Option<String> {
    let registry = registry.trim();
    if !registry.is_empty() {
        return Some(registry.to_string());
    }
    model
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
