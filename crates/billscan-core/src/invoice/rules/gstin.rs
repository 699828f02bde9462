//! GSTIN (Indian GST registration number) extraction and validation.

use super::patterns::{GSTIN_EXACT, GSTIN_LABELED, GSTIN_PATTERN};
use super::{ExtractionMatch, FieldExtractor};

const CHARSET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// GSTIN field extractor.
pub struct GstinExtractor {
    validate: bool,
}

impl GstinExtractor {
    /// Create a new GSTIN extractor. Check characters are not validated by
    /// default; OCR output and sample receipts routinely carry numbers whose
    /// shape is right but whose check character is not.
    pub fn new() -> Self {
        Self { validate: false }
    }

    /// Set whether to validate the check character.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

impl Default for GstinExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for GstinExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<Self::Output> = Vec::new();

        // Labeled numbers win the dedup below
        for caps in GSTIN_LABELED.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let gstin = m.as_str().to_ascii_uppercase();
            if !self.validate || validate_gstin_checksum(&gstin) {
                results.push(ExtractionMatch::new(gstin).with_position(m.start(), m.end()));
            }
        }

        for m in GSTIN_PATTERN.find_iter(text) {
            let gstin = m.as_str().to_ascii_uppercase();

            // Skip if already found with labeled pattern
            if results.iter().any(|r| r.value == gstin) {
                continue;
            }

            if !self.validate || validate_gstin_checksum(&gstin) {
                results.push(ExtractionMatch::new(gstin).with_position(m.start(), m.end()));
            }
        }

        // Keep document order so "first match" means the first one printed.
        results.sort_by_key(|r| r.position.map(|(start, _)| start).unwrap_or(usize::MAX));
        results
    }
}

/// Extract the first GSTIN-shaped token from text, upper-cased.
pub fn extract_gstin(text: &str) -> Option<String> {
    GstinExtractor::new().extract(text).map(|m| m.value)
}

/// Check whether a whole string has the GSTIN shape.
pub fn is_gstin(value: &str) -> bool {
    GSTIN_EXACT.is_match(value.trim())
}

/// Compute the check character for the first 14 characters of a GSTIN.
///
/// Characters map to 0-35 over `0-9A-Z`; odd positions are doubled and each
/// product contributes its base-36 quotient plus remainder.
pub fn gstin_check_char(gstin: &str) -> Option<char> {
    let upper = gstin.trim().to_ascii_uppercase();
    let bytes = upper.as_bytes();
    if bytes.len() < 14 {
        return None;
    }

    let mut sum = 0u32;
    for (i, b) in bytes.iter().take(14).enumerate() {
        let value = CHARSET.iter().position(|c| c == b)? as u32;
        let factor = if i % 2 == 0 { 1 } else { 2 };
        let product = value * factor;
        sum += product / 36 + product % 36;
    }

    let check = (36 - sum % 36) % 36;
    Some(CHARSET[check as usize] as char)
}

/// Validate a GSTIN's shape and check character.
pub fn validate_gstin_checksum(gstin: &str) -> bool {
    let gstin = gstin.trim().to_ascii_uppercase();
    if !is_gstin(&gstin) {
        return false;
    }
    match (gstin_check_char(&gstin), gstin.chars().last()) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => false,
    }
}
