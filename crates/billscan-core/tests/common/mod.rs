//! Shared fixtures: stub OCR/completion and in-process mock services.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};

use billscan_core::models::config::{GeocoderConfig, RegistryConfig, StorageConfig};
use billscan_core::{
    CaptchaBroker, CompletionClient, CompletionError, ExpenseRecord, ExpenseStore, ExtractionError,
    MemoryStore, NominatimGeocoder, Pipeline, RegistryEntry, RegistryValidator, StoreError,
    TextExtractor, UserProfile,
};

pub const USER: &str = "user-1";
pub const SESSION_TOKEN: &str = "tok-9f2c";

/// OCR stub returning fixed text (or a fixed failure).
pub struct FixedText {
    text: Option<String>,
    delay: Duration,
}

impl FixedText {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Some(text.to_string()),
            delay: Duration::ZERO,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            text: None,
            delay: Duration::ZERO,
        })
    }

    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            text: Some(text.to_string()),
            delay,
        })
    }
}

impl TextExtractor for FixedText {
    fn extract(&self, _image_bytes: &[u8]) -> Result<String, ExtractionError> {
        std::thread::sleep(self.delay);
        self.text
            .clone()
            .ok_or_else(|| ExtractionError::Decode("unsupported format".to_string()))
    }
}

/// Completion stub: a fixed answer, or an outage.
pub struct ScriptedCompletion {
    answer: Option<String>,
    pub calls: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(answer.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn outage() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().ok_or(CompletionError::Status {
            status: 503,
            body: "service unavailable".to_string(),
        })
    }
}

/// Counters shared with the mock services.
#[derive(Default)]
pub struct Hits {
    pub captcha: AtomicUsize,
    pub registry: AtomicUsize,
    pub geocode: AtomicUsize,
    pub geocode_queries: Mutex<Vec<String>>,
}

impl Hits {
    pub fn captcha(&self) -> usize {
        self.captcha.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> usize {
        self.registry.load(Ordering::SeqCst)
    }

    pub fn geocode(&self) -> usize {
        self.geocode.load(Ordering::SeqCst)
    }

    /// Addresses the geocoder was asked for, in order.
    pub fn geocode_queries(&self) -> Vec<String> {
        self.geocode_queries.lock().unwrap().clone()
    }
}

/// Which behavior the mock services should show.
#[derive(Clone, Copy)]
pub struct MockOptions {
    pub captcha_ok: bool,
    pub geocode_ok: bool,
    /// Registry answers with an empty principal address.
    pub blank_address: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            captcha_ok: true,
            geocode_ok: true,
            blank_address: false,
        }
    }
}

#[derive(Clone)]
struct MockState {
    hits: Arc<Hits>,
    options: MockOptions,
}

pub fn png_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::new_rgb8(4, 4)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

async fn captcha(State(state): State<MockState>) -> Response {
    state.hits.captcha.fetch_add(1, Ordering::SeqCst);
    if !state.options.captcha_ok {
        return (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response();
    }
    (
        [
            (header::SET_COOKIE, format!("CaptchaCookie={}; Path=/; HttpOnly", SESSION_TOKEN)),
            (header::CONTENT_TYPE, "image/png".to_string()),
        ],
        png_bytes(),
    )
        .into_response()
}

/// Captcha "000000" is wrong, number 27AAAAA0000A1Z9 is unknown, a wrong
/// cookie is treated as a stale session.
async fn taxpayer_details(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hits.registry.fetch_add(1, Ordering::SeqCst);

    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if cookie != format!("CaptchaCookie={}", SESSION_TOKEN) || body["captcha"] == "000000" {
        return Json(json!({"errorCode": "SWEB_9000", "message": "Invalid captcha"})).into_response();
    }
    if body["gstin"] == "27AAAAA0000A1Z9" {
        return Json(json!({"errorCode": "SWEB_9035", "message": "No records found"})).into_response();
    }

    let address = if state.options.blank_address {
        ""
    } else {
        "12, MG Road, Pune, Maharashtra, 411001"
    };
    Json(json!({
        "gstin": body["gstin"],
        "lgnm": "FRESH MART RETAIL LLP",
        "tradeNam": "FRESH MART",
        "pradr": {"adr": address}
    }))
    .into_response()
}

async fn search(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.hits.geocode.fetch_add(1, Ordering::SeqCst);
    if let Some(q) = params.get("q") {
        state.hits.geocode_queries.lock().unwrap().push(q.clone());
    }
    if !state.options.geocode_ok {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    Json(json!([{"lat": "18.5204", "lon": "73.8567", "display_name": "Pune, Maharashtra, India"}]))
        .into_response()
}

/// Start the captcha, registry and geocoder mocks on one ephemeral port.
pub async fn spawn_services(options: MockOptions) -> (String, Arc<Hits>) {
    let hits = Arc::new(Hits::default());
    let state = MockState {
        hits: hits.clone(),
        options,
    };

    let app = Router::new()
        .route("/services/captcha", get(captcha))
        .route("/services/api/search/taxpayerDetails", post(taxpayer_details))
        .route("/search", get(search))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), hits)
}

pub fn registry_config(base: &str) -> RegistryConfig {
    RegistryConfig {
        captcha_url: format!("{}/services/captcha?rnd=", base),
        details_url: format!("{}/services/api/search/taxpayerDetails", base),
        timeout_secs: 5,
        ..RegistryConfig::default()
    }
}

/// Pipeline wired to the mocks, with stubbed OCR and completion.
pub fn pipeline(
    base: &str,
    uploads: &Path,
    extractor: Arc<dyn TextExtractor>,
    completion: Arc<dyn CompletionClient>,
    store: Arc<dyn ExpenseStore>,
) -> Pipeline {
    let registry = registry_config(base);
    let storage = StorageConfig {
        uploads_dir: uploads.to_path_buf(),
        ..StorageConfig::default()
    };
    let geocoder = GeocoderConfig {
        search_url: format!("{}/search", base),
        timeout_secs: 5,
        ..GeocoderConfig::default()
    };

    Pipeline::builder()
        .with_extractor(extractor)
        .with_completion(completion)
        .with_broker(Arc::new(CaptchaBroker::new(&registry, &storage).unwrap()))
        .with_registry(Arc::new(RegistryValidator::new(&registry).unwrap()))
        .with_geocoder(Arc::new(NominatimGeocoder::new(&geocoder).unwrap()))
        .with_store(store)
        .with_ocr_timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Store whose expense writes always fail; everything else goes to memory.
pub struct FailingExpenses {
    pub inner: Arc<MemoryStore>,
}

#[async_trait]
impl ExpenseStore for FailingExpenses {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        self.inner.find_user(user_id).await
    }

    async fn insert_expense(&self, _record: &ExpenseRecord) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    async fn insert_registry_record(&self, entry: &RegistryEntry) -> Result<(), StoreError> {
        self.inner.insert_registry_record(entry).await
    }
}
