//! Receipt structuring: OCR text in, typed record out.

mod parser;
mod prompt;
pub mod rules;

pub use parser::{NormalizeOptions, ParsePath, parse_response};
pub use prompt::{build_prompt, truncate_chars};

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::completion::CompletionClient;
use crate::models::config::{CompletionConfig, ExtractionConfig};
use crate::models::invoice::ExtractedInvoice;

/// Output of one structuring run.
#[derive(Debug, Clone, Serialize)]
pub struct Structured {
    pub invoice: ExtractedInvoice,
    /// Which parse step produced the record.
    pub path: ParsePath,
    /// Fields dropped or questioned while normalizing.
    pub warnings: Vec<String>,
}

/// Turns OCR text into an [`ExtractedInvoice`] through a language model.
///
/// Structuring never fails. A completion outage or an unusable answer both
/// end in the deterministic fallback, which keeps the registration number
/// found by pattern matching.
pub struct Structurer {
    client: Arc<dyn CompletionClient>,
    max_input_chars: usize,
    options: NormalizeOptions,
}

impl Structurer {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            max_input_chars: CompletionConfig::default().max_input_chars,
            options: NormalizeOptions::default(),
        }
    }

    pub fn from_config(
        client: Arc<dyn CompletionClient>,
        completion: &CompletionConfig,
        extraction: &ExtractionConfig,
    ) -> Self {
        Self {
            client,
            max_input_chars: completion.max_input_chars,
            options: NormalizeOptions {
                reject_bad_checksum: extraction.reject_bad_checksum,
                recover_number_from_text: extraction.recover_number_from_text,
            },
        }
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Structure a receipt's OCR text.
    pub async fn structure(&self, ocr_text: &str) -> Structured {
        let prompt = build_prompt(ocr_text, self.max_input_chars);

        match self.client.complete(&prompt).await {
            Ok(response) => self.structure_response(&response, ocr_text),
            Err(e) => {
                warn!("Completion failed, using pattern fallback: {}", e);
                let mut structured = self.fallback(ocr_text);
                structured.warnings.insert(0, format!("completion unavailable: {}", e));
                structured
            }
        }
    }

    /// Structure an already-obtained model response.
    pub fn structure_response(&self, response: &str, ocr_text: &str) -> Structured {
        let Some((path, object)) = parse_response(response) else {
            warn!("Model response held no JSON object, using pattern fallback");
            return self.fallback(ocr_text);
        };

        let mut warnings = Vec::new();
        let invoice = parser::normalize(&object, ocr_text, self.options, &mut warnings);

        info!(
            ?path,
            items = invoice.items.len(),
            has_number = invoice.registration_number.is_some(),
            "Structured receipt"
        );

        Structured {
            invoice,
            path,
            warnings,
        }
    }

    fn fallback(&self, ocr_text: &str) -> Structured {
        let mut warnings = Vec::new();
        let invoice = parser::fallback(ocr_text, self.options, &mut warnings);
        Structured {
            invoice,
            path: ParsePath::Fallback,
            warnings,
        }
    }
}
