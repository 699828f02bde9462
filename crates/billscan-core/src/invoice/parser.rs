//! Parsing of language-model responses into receipt records.
//!
//! Parsing is an ordered chain of pure attempts over the same response text.
//! Each attempt either yields a JSON object or declines; the first success
//! wins. Normalization into [`ExtractedInvoice`] is shared by every path, so
//! the record does not depend on which attempt produced it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::invoice::{Category, ExtractedInvoice, LineItem};

use super::rules::amounts::amount_from_json;
use super::rules::dates::parse_date;
use super::rules::gstin::{extract_gstin, is_gstin, validate_gstin_checksum};
use super::rules::patterns::FENCED_BLOCK;

/// Which step of the chain produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePath {
    /// The whole response was a JSON object.
    Direct,
    /// A fenced code block held the object.
    Fenced,
    /// An outermost balanced `{...}` span held the object.
    Braced,
    /// No JSON anywhere; pattern matching over the OCR text.
    Fallback,
}

impl ParsePath {
    /// Whether the model output was unusable.
    pub fn is_degraded(&self) -> bool {
        matches!(self, ParsePath::Fallback)
    }
}

type ParseAttempt = fn(&str) -> Option<Map<String, Value>>;

const ATTEMPTS: [(ParsePath, ParseAttempt); 3] = [
    (ParsePath::Direct, parse_direct),
    (ParsePath::Fenced, parse_fenced),
    (ParsePath::Braced, parse_braced),
];

/// Run the parse chain over a model response.
pub fn parse_response(response: &str) -> Option<(ParsePath, Map<String, Value>)> {
    ATTEMPTS.iter().find_map(|(path, attempt)| {
        let object = attempt(response)?;
        debug!(?path, "Parsed model response");
        Some((*path, object))
    })
}

fn as_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// The response is a JSON object as-is.
pub fn parse_direct(response: &str) -> Option<Map<String, Value>> {
    as_object(response)
}

/// The object sits inside a ```` ``` ```` fenced block.
pub fn parse_fenced(response: &str) -> Option<Map<String, Value>> {
    FENCED_BLOCK
        .captures_iter(response)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| as_object(m.as_str()))
}

/// The object is the first balanced brace span that parses.
pub fn parse_braced(response: &str) -> Option<Map<String, Value>> {
    balanced_spans(response).find_map(as_object)
}

/// Iterate over outermost balanced `{...}` spans, ignoring braces inside JSON
/// strings. An unclosed `{` does not hide the spans after it.
fn balanced_spans(text: &str) -> impl Iterator<Item = &str> {
    let mut spans = Vec::new();
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' if !open.is_empty() => in_string = true,
            '{' => open.push(i),
            '}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, i));
                }
            }
            _ => {}
        }
    }

    spans.sort_by_key(|(start, _)| *start);
    let mut covered = None;
    spans.retain(|&(start, end)| {
        let nested = covered.is_some_and(|outer_end| start < outer_end);
        if !nested {
            covered = Some(end);
        }
        !nested
    });
    spans.into_iter().map(move |(start, end)| &text[start..=end])
}

/// Options applied while normalizing a parsed object.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    pub reject_bad_checksum: bool,
    pub recover_number_from_text: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            reject_bad_checksum: false,
            recover_number_from_text: true,
        }
    }
}

/// Turn a parsed JSON object into a typed record.
///
/// Scalar fields of the wrong type are dropped rather than failing the whole
/// record. Item categories outside the closed set become `Other`.
pub fn normalize(
    object: &Map<String, Value>,
    ocr_text: &str,
    options: NormalizeOptions,
    warnings: &mut Vec<String>,
) -> ExtractedInvoice {
    let model_number = ["gst_number", "registration_number", "gstin"]
        .iter()
        .find_map(|key| object.get(*key).and_then(text_value));

    let registration_number = match model_number {
        Some(number) if is_gstin(&number) => Some(number.to_ascii_uppercase()),
        Some(number) => {
            warnings.push(format!("Discarded malformed GSTIN from model: {}", number));
            None
        }
        None if options.recover_number_from_text => extract_gstin(ocr_text),
        None => None,
    };
    let registration_number = check_registration_number(registration_number, options, warnings);

    let total_amount = object.get("total_amount").and_then(amount_from_json);
    if total_amount.is_none() && object.get("total_amount").is_some_and(|v| !v.is_null()) {
        warnings.push("Discarded unusable total_amount".to_string());
    }

    let date = object
        .get("date")
        .and_then(text_value)
        .and_then(|d| parse_date(&d));

    let items = match object.get("items") {
        Some(Value::Array(values)) => values
            .iter()
            .enumerate()
            .filter_map(|(i, value)| {
                let item = normalize_item(value);
                if item.is_none() {
                    warnings.push(format!("Dropped item {} without usable name/price", i + 1));
                }
                item
            })
            .collect(),
        _ => Vec::new(),
    };

    ExtractedInvoice {
        registration_number,
        total_amount,
        store_name: object.get("store_name").and_then(text_value),
        date,
        address: object.get("address").and_then(text_value),
        items,
    }
}

/// Deterministic record used when the model output is unusable.
pub fn fallback(ocr_text: &str, options: NormalizeOptions, warnings: &mut Vec<String>) -> ExtractedInvoice {
    let number = check_registration_number(extract_gstin(ocr_text), options, warnings);
    ExtractedInvoice::registration_only(number)
}

fn check_registration_number(
    number: Option<String>,
    options: NormalizeOptions,
    warnings: &mut Vec<String>,
) -> Option<String> {
    let number = number?;
    if validate_gstin_checksum(&number) {
        return Some(number);
    }
    if options.reject_bad_checksum {
        warnings.push(format!("Rejected GSTIN {} with bad check character", number));
        None
    } else {
        warnings.push(format!("GSTIN {} has a bad check character", number));
        Some(number)
    }
}

fn normalize_item(value: &Value) -> Option<LineItem> {
    let object = value.as_object()?;
    let name = object
        .get("name")
        .or_else(|| object.get("description"))
        .and_then(text_value)?;
    let price = object.get("price").and_then(amount_from_json)?;
    let category = Category::resolve(object.get("category").and_then(Value::as_str));

    Some(LineItem::new(name, price, category))
}

/// Non-empty string content; models sometimes write the string "null".
fn text_value(value: &Value) -> Option<String> {
    let s = value.as_str()?.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    const BODY: &str = r#"{
        "gst_number": "27AAPFU0939F1ZV",
        "total_amount": 145.5,
        "store_name": "Fresh Mart",
        "date": "2024-03-02",
        "address": "12 MG Road, Pune",
        "items": [
            {"name": "Milk {1L}", "price": 60, "category": "Food"},
            {"name": "AA Battery", "price": "85.50", "category": "gadgets"},
            {"name": "Mystery", "price": 0, "category": null}
        ]
    }"#;

    fn normalized(response: &str) -> (ParsePath, ExtractedInvoice) {
        let (path, object) = parse_response(response).unwrap();
        let mut warnings = Vec::new();
        (path, normalize(&object, "", NormalizeOptions::default(), &mut warnings))
    }

    #[test]
    fn test_direct_path() {
        let (path, invoice) = normalized(BODY);
        assert_eq!(path, ParsePath::Direct);
        assert_eq!(invoice.registration_number.as_deref(), Some("27AAPFU0939F1ZV"));
        assert_eq!(invoice.total_amount, Some(Decimal::new(1455, 1)));
        assert_eq!(invoice.date, NaiveDate::from_ymd_opt(2024, 3, 2));
        assert_eq!(invoice.items.len(), 3);
        assert_eq!(invoice.items[0].name, "Milk {1L}");
        assert_eq!(invoice.items[1].category, Category::Other);
        assert_eq!(invoice.items[2].category, Category::Other);
    }

    #[test]
    fn test_fenced_matches_direct() {
        let fenced = format!("Here is the data:\n```json\n{}\n```\nLet me know!", BODY);
        let (path, invoice) = normalized(&fenced);
        assert_eq!(path, ParsePath::Fenced);
        assert_eq!(invoice, normalized(BODY).1);

        let untagged = format!("```\n{}\n```", BODY);
        assert_eq!(normalized(&untagged), (ParsePath::Fenced, normalized(BODY).1));
    }

    #[test]
    fn test_braced_matches_direct() {
        let prose = format!("Sure! The extracted record is {} -- hope that helps.", BODY);
        let (path, invoice) = normalized(&prose);
        assert_eq!(path, ParsePath::Braced);
        assert_eq!(invoice, normalized(BODY).1);
    }

    #[test]
    fn test_braced_skips_unparseable_span() {
        let response = r#"Template: {store_name} then {"store_name": "Kirana"}"#;
        let (path, object) = parse_response(response).unwrap();
        assert_eq!(path, ParsePath::Braced);
        assert_eq!(object["store_name"], "Kirana");
    }

    #[test]
    fn test_braces_inside_strings() {
        let spans: Vec<&str> = balanced_spans(r#"x {"a": "}{"} y {"b": 1}"#).collect();
        assert_eq!(spans, vec![r#"{"a": "}{"}"#, r#"{"b": 1}"#]);
    }

    #[test]
    fn test_braced_after_unclosed_brace() {
        let response = r#"Note: the {total field is below: {"store_name": "Kirana", "total_amount": 5}"#;
        let (path, object) = parse_response(response).unwrap();
        assert_eq!(path, ParsePath::Braced);
        assert_eq!(object["store_name"], "Kirana");
        assert_eq!(object["total_amount"], 5);
    }

    #[test]
    fn test_nested_spans_are_not_split() {
        let spans: Vec<&str> = balanced_spans(r#"{"a": {"b": 1}} {x {"c": 2}"#).collect();
        assert_eq!(spans, vec![r#"{"a": {"b": 1}}"#, r#"{"c": 2}"#]);
    }

    #[test]
    fn test_no_json_anywhere() {
        assert!(parse_response("I could not read this receipt, sorry.").is_none());
        assert!(parse_response(r#"{"store_name": "Trunc"#).is_none());
        assert!(parse_response("[1, 2, 3]").is_none());
    }

    #[test]
    fn test_fallback_only_registration_number() {
        let mut warnings = Vec::new();
        let invoice = fallback(
            "GSTIN 22AAAAA0000A1Z5 Total: 45.00",
            NormalizeOptions::default(),
            &mut warnings,
        );
        assert_eq!(invoice.registration_number.as_deref(), Some("22AAAAA0000A1Z5"));
        assert!(invoice.is_minimal());
        assert_eq!(warnings.len(), 1); // bad check character
    }

    #[test]
    fn test_fallback_rejects_bad_checksum_when_configured() {
        let mut warnings = Vec::new();
        let options = NormalizeOptions {
            reject_bad_checksum: true,
            ..NormalizeOptions::default()
        };
        let invoice = fallback("GSTIN 22AAAAA0000A1Z5", options, &mut warnings);
        assert_eq!(invoice.registration_number, None);
    }

    #[test]
    fn test_model_number_malformed_is_discarded() {
        let object = as_object(r#"{"gst_number": "22AAAAA0000"}"#).unwrap();
        let mut warnings = Vec::new();
        let invoice = normalize(
            &object,
            "GSTIN 27AAPFU0939F1ZV",
            NormalizeOptions::default(),
            &mut warnings,
        );
        assert_eq!(invoice.registration_number, None);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_model_null_number_recovered_from_text() {
        let object = as_object(r#"{"gst_number": null, "store_name": "Kirana"}"#).unwrap();
        let mut warnings = Vec::new();
        let invoice = normalize(
            &object,
            "Kirana Stores GSTIN: 27AAPFU0939F1ZV",
            NormalizeOptions::default(),
            &mut warnings,
        );
        assert_eq!(invoice.registration_number.as_deref(), Some("27AAPFU0939F1ZV"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_wrong_types_are_dropped() {
        let object = as_object(
            r#"{"store_name": 42, "total_amount": "n/a", "date": "null",
                "items": [{"name": "Pen"}, "junk", {"name": "Ink", "price": -4}, {"name": "Pad", "price": 30}]}"#,
        )
        .unwrap();
        let mut warnings = Vec::new();
        let invoice = normalize(&object, "", NormalizeOptions::default(), &mut warnings);

        assert_eq!(invoice.store_name, None);
        assert_eq!(invoice.total_amount, None);
        assert_eq!(invoice.date, None);
        assert_eq!(invoice.items, vec![LineItem::new("Pad", Decimal::new(30, 0), Category::Other)]);
        assert_eq!(warnings.len(), 4);
    }
}
