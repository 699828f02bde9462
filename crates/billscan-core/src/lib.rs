//! Core library for receipt ingestion and GST verification.
//!
//! This crate provides:
//! - OCR over receipt photos using PaddleOCR models
//! - Language-model structuring with deterministic parsing fallbacks
//! - GSTIN, amount and date rules
//! - GST registry captcha and taxpayer lookup clients
//! - Best-effort geocoding
//! - The `ingest`/`verify` pipeline and its storage collaborator

pub mod completion;
pub mod error;
pub mod geocode;
pub mod invoice;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod registry;
pub mod store;

pub use error::{
    BillscanError, BrokerError, CompletionError, ConfigError, ExtractionError, IngestError,
    Result, StoreError, VerifyError,
};
pub use models::config::BillscanConfig;
pub use models::invoice::{Category, ExtractedInvoice, LineItem};
pub use models::records::{
    CaptchaChallenge, ExpenseRecord, GeoPoint, RegistrantDetails, RegistryEntry, RegistryResult,
    UserProfile,
};
pub use completion::{ChatCompletionClient, CompletionClient};
pub use geocode::{AddressResolver, NominatimGeocoder};
pub use invoice::{ParsePath, Structured, Structurer};
pub use ocr::TextExtractor;
#[cfg(feature = "native")]
pub use ocr::OnnxTextExtractor;
pub use pipeline::{
    IngestReport, Pipeline, PipelineBuilder, PipelineWarning, Stage, VerifyOutcome, VerifyRequest,
};
pub use registry::{CaptchaBroker, ChallengeSource, RegistryValidator, TaxRegistry};
pub use store::{ExpenseStore, JsonlStore, MemoryStore};
