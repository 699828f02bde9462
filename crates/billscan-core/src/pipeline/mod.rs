//! Pipeline orchestrator: `ingest` an image, later `verify` its GST number.
//!
//! The orchestrator holds no state between the two calls. Whatever `ingest`
//! returns (invoice, session token) comes back from the caller in the
//! [`VerifyRequest`].

mod report;

pub use report::{IngestReport, PipelineWarning, Stage, VerifyOutcome, VerifyRequest};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::completion::CompletionClient;
use crate::error::{BrokerError, ConfigError, ExtractionError, IngestError, VerifyError};
use crate::geocode::AddressResolver;
use crate::invoice::Structurer;
use crate::invoice::rules::is_gstin;
use crate::invoice::rules::patterns::CAPTCHA_ANSWER;
use crate::models::config::OcrConfig;
use crate::models::records::{
    CaptchaChallenge, ExpenseRecord, RegistryEntry, RegistryResult, prefer_registry,
};
use crate::ocr::TextExtractor;
use crate::registry::{ChallengeSource, TaxRegistry};
use crate::store::ExpenseStore;

/// The receipt pipeline.
pub struct Pipeline {
    extractor: Arc<dyn TextExtractor>,
    structurer: Structurer,
    broker: Arc<dyn ChallengeSource>,
    registry: Arc<dyn TaxRegistry>,
    geocoder: Arc<dyn AddressResolver>,
    store: Arc<dyn ExpenseStore>,
    ocr_timeout: Duration,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Build a pipeline talking to the configured services.
    #[cfg(feature = "native")]
    pub fn from_config(
        config: &crate::models::config::BillscanConfig,
        store: Arc<dyn ExpenseStore>,
    ) -> crate::error::Result<Self> {
        use crate::completion::ChatCompletionClient;
        use crate::geocode::NominatimGeocoder;
        use crate::ocr::OnnxTextExtractor;
        use crate::registry::{CaptchaBroker, RegistryValidator};

        let completion = Arc::new(ChatCompletionClient::new(&config.completion)?);
        let structurer =
            Structurer::from_config(completion, &config.completion, &config.extraction);

        Ok(Self::builder()
            .with_extractor(Arc::new(OnnxTextExtractor::new(&config.ocr)))
            .with_structurer(structurer)
            .with_broker(Arc::new(CaptchaBroker::new(&config.registry, &config.storage)?))
            .with_registry(Arc::new(RegistryValidator::new(&config.registry)?))
            .with_geocoder(Arc::new(NominatimGeocoder::new(&config.geocoder)?))
            .with_store(store)
            .with_ocr_timeout(config.ocr.timeout())
            .build()?)
    }

    /// The storage collaborator, for user lookups at the service edge.
    pub fn store(&self) -> &Arc<dyn ExpenseStore> {
        &self.store
    }

    /// Run OCR and structuring over an uploaded image.
    ///
    /// Only an OCR failure fails the call. Every later stage degrades into
    /// a warning on the report.
    pub async fn ingest(&self, image_bytes: Vec<u8>) -> Result<IngestReport, IngestError> {
        info!(stage = ?Stage::Received, bytes = image_bytes.len(), "Ingesting receipt");

        let text = self.extract_text(image_bytes).await?;
        info!(stage = ?Stage::Extracted, chars = text.chars().count(), "Text extracted");

        Ok(self.ingest_text(&text).await)
    }

    /// Run the pipeline from already extracted text.
    pub async fn ingest_text(&self, text: &str) -> IngestReport {
        let structured = self.structurer.structure(text).await;

        let mut warnings: Vec<PipelineWarning> = structured
            .warnings
            .into_iter()
            .map(|message| PipelineWarning::FieldIssue { message })
            .collect();
        if structured.path.is_degraded() {
            warnings.push(PipelineWarning::StructuringDegraded {
                path: structured.path,
            });
        }

        let invoice = structured.invoice;
        let mut stage = Stage::Structured;
        let mut captcha = None;

        if invoice.registration_number.is_some() {
            match self.broker.fetch_challenge().await {
                Ok(challenge) => {
                    stage = Stage::AwaitingCaptcha;
                    captcha = Some(challenge);
                }
                Err(e) => {
                    warn!("GST number found but captcha unavailable: {}", e);
                    stage = Stage::ReadyToPersist;
                    warnings.push(PipelineWarning::BrokerUnavailable {
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(?stage, path = ?structured.path, warnings = warnings.len(), "Ingestion finished");

        IngestReport {
            stage,
            invoice,
            parse_path: structured.path,
            captcha,
            warnings,
        }
    }

    /// Fetch a new challenge, e.g. after a rejected captcha answer.
    pub async fn refresh_captcha(&self) -> Result<CaptchaChallenge, BrokerError> {
        self.broker.fetch_challenge().await
    }

    /// Verify a GST number with a solved captcha, then persist.
    ///
    /// Nothing is written unless the registry confirms the number. A failed
    /// geocode still persists, without a location. The expense is written
    /// before the registry record, so a failed expense write stores nothing.
    pub async fn verify(
        &self,
        user_id: &str,
        request: &VerifyRequest,
    ) -> Result<VerifyOutcome, VerifyError> {
        let number = request.registration_number.trim().to_ascii_uppercase();
        let captcha = request.captcha_text.trim();
        let token = request.session_token.trim();

        if number.is_empty() || captcha.is_empty() || token.is_empty() {
            return Err(VerifyError::MissingFields);
        }
        if !is_gstin(&number) {
            return Err(VerifyError::InvalidNumber);
        }
        if !CAPTCHA_ANSWER.is_match(captcha) {
            return Err(VerifyError::InvalidCaptcha);
        }

        let registrant = match self.registry.validate(&number, captcha, token).await {
            RegistryResult::Verified(details) => details,
            RegistryResult::InvalidNumber => return Err(VerifyError::InvalidNumber),
            RegistryResult::InvalidCaptcha => return Err(VerifyError::InvalidCaptcha),
            RegistryResult::TransportError { reason } => {
                return Err(VerifyError::Transport(reason));
            }
        };

        let invoice = request.invoice.as_ref();
        let model_address = invoice.and_then(|i| i.address.as_deref());
        let address = prefer_registry(&registrant.registered_address, model_address);

        let location = match &address {
            Some(address) => self.geocoder.geocode(address).await,
            None => None,
        };

        let created_at = Utc::now();
        let expense = invoice.map(|invoice| {
            ExpenseRecord::merge(user_id, &number, invoice, &registrant, location.clone(), created_at)
        });
        let registry_entry = RegistryEntry {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            registration_number: number.clone(),
            business_name: prefer_registry(
                &registrant.legal_name,
                invoice.and_then(|i| i.store_name.as_deref()),
            ),
            address,
            location: location.clone(),
            created_at,
        };

        if let Some(record) = &expense {
            self.store.insert_expense(record).await?;
        }
        self.store.insert_registry_record(&registry_entry).await?;

        info!(
            stage = ?Stage::Persisted,
            registration_number = %number,
            expense_saved = expense.is_some(),
            geocoded = location.is_some(),
            "Verification finished"
        );

        Ok(VerifyOutcome {
            registrant,
            location,
            registry_entry,
            expense,
        })
    }

    async fn extract_text(&self, image_bytes: Vec<u8>) -> Result<String, IngestError> {
        let extractor = Arc::clone(&self.extractor);
        let task = tokio::task::spawn_blocking(move || extractor.extract(&image_bytes));

        match tokio::time::timeout(self.ocr_timeout, task).await {
            Err(_) => {
                warn!("OCR timed out after {:?}", self.ocr_timeout);
                Err(ExtractionError::Timeout(self.ocr_timeout.as_secs()).into())
            }
            Ok(Err(join_error)) => Err(IngestError::Internal(join_error.to_string())),
            Ok(Ok(Err(e))) => {
                warn!("Text extraction failed: {}", e);
                Err(e.into())
            }
            Ok(Ok(Ok(text))) => Ok(text),
        }
    }
}

/// Assembles a [`Pipeline`] from its components.
pub struct PipelineBuilder {
    extractor: Option<Arc<dyn TextExtractor>>,
    structurer: Option<Structurer>,
    broker: Option<Arc<dyn ChallengeSource>>,
    registry: Option<Arc<dyn TaxRegistry>>,
    geocoder: Option<Arc<dyn AddressResolver>>,
    store: Option<Arc<dyn ExpenseStore>>,
    ocr_timeout: Duration,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            extractor: None,
            structurer: None,
            broker: None,
            registry: None,
            geocoder: None,
            store: None,
            ocr_timeout: OcrConfig::default().timeout(),
        }
    }
}

impl PipelineBuilder {
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_structurer(mut self, structurer: Structurer) -> Self {
        self.structurer = Some(structurer);
        self
    }

    /// Use a completion client with default structuring options.
    pub fn with_completion(self, client: Arc<dyn CompletionClient>) -> Self {
        self.with_structurer(Structurer::new(client))
    }

    pub fn with_broker(mut self, broker: Arc<dyn ChallengeSource>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn TaxRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn AddressResolver>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ExpenseStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_ocr_timeout(mut self, timeout: Duration) -> Self {
        self.ocr_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Pipeline, ConfigError> {
        Ok(Pipeline {
            extractor: self
                .extractor
                .ok_or(ConfigError::MissingComponent("text extractor"))?,
            structurer: self
                .structurer
                .ok_or(ConfigError::MissingComponent("structurer"))?,
            broker: self
                .broker
                .ok_or(ConfigError::MissingComponent("captcha broker"))?,
            registry: self
                .registry
                .ok_or(ConfigError::MissingComponent("registry validator"))?,
            geocoder: self
                .geocoder
                .ok_or(ConfigError::MissingComponent("geocoder"))?,
            store: self.store.ok_or(ConfigError::MissingComponent("store"))?,
            ocr_timeout: self.ocr_timeout,
        })
    }
}
