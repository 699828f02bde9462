//! Receipt data produced by the structurer.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A receipt as understood from its OCR text.
///
/// Every field except `items` may be absent; a record produced by the
/// deterministic fallback carries at most a registration number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInvoice {
    /// Seller's GSTIN (15 characters).
    #[serde(default, alias = "gst_number")]
    pub registration_number: Option<String>,

    /// Grand total, never negative.
    #[serde(default)]
    pub total_amount: Option<Decimal>,

    /// Store or seller name as printed.
    #[serde(default)]
    pub store_name: Option<String>,

    /// Purchase date.
    #[serde(default)]
    pub date: Option<NaiveDate>,

    /// Seller address as printed.
    #[serde(default)]
    pub address: Option<String>,

    /// Purchased items, in receipt order.
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl ExtractedInvoice {
    /// Record carrying only a registration number (or nothing at all).
    pub fn registration_only(registration_number: Option<String>) -> Self {
        Self {
            registration_number,
            ..Self::default()
        }
    }

    /// Check if nothing beyond the registration number was recovered.
    pub fn is_minimal(&self) -> bool {
        self.total_amount.is_none()
            && self.store_name.is_none()
            && self.date.is_none()
            && self.address.is_none()
            && self.items.is_empty()
    }
}

/// A single purchased item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item description.
    pub name: String,

    /// Price paid, never negative.
    pub price: Decimal,

    /// Spending category; unknown labels resolve to [`Category::Other`].
    #[serde(default)]
    pub category: Category,
}

impl LineItem {
    pub fn new(name: impl Into<String>, price: Decimal, category: Category) -> Self {
        Self {
            name: name.into(),
            price,
            category,
        }
    }
}

/// Closed set of spending categories.
///
/// Deserialization never fails: `null`, missing and unrecognized labels all
/// become `Other`, so no item is ever left unclassified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>")]
pub enum Category {
    Food,
    Electronics,
    Clothing,
    Utilities,
    Transportation,
    Healthcare,
    Entertainment,
    #[default]
    Other,
}

impl Category {
    /// All categories, in prompt order.
    pub const ALL: [Category; 8] = [
        Category::Food,
        Category::Electronics,
        Category::Clothing,
        Category::Utilities,
        Category::Transportation,
        Category::Healthcare,
        Category::Entertainment,
        Category::Other,
    ];

    /// Canonical label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Electronics => "Electronics",
            Category::Clothing => "Clothing",
            Category::Utilities => "Utilities",
            Category::Transportation => "Transportation",
            Category::Healthcare => "Healthcare",
            Category::Entertainment => "Entertainment",
            Category::Other => "Other",
        }
    }

    /// Match a label case-insensitively against the closed set.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(label))
    }

    /// Resolve an optional label, defaulting to `Other`.
    pub fn resolve(label: Option<&str>) -> Self {
        label.and_then(Self::from_label).unwrap_or_default()
    }

    /// Comma-separated list used in the model instructions.
    pub fn prompt_list() -> String {
        Self::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<Option<String>> for Category {
    fn from(label: Option<String>) -> Self {
        Self::resolve(label.as_deref())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
