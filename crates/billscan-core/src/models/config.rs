//! Configuration structures for the receipt pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable that overrides `completion.api_key`.
pub const API_KEY_ENV: &str = "BILLSCAN_COMPLETION_API_KEY";

/// Main configuration for the billscan pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BillscanConfig {
    /// OCR configuration.
    pub ocr: OcrConfig,

    /// Language-model completion configuration.
    pub completion: CompletionConfig,

    /// Structuring rules.
    pub extraction: ExtractionConfig,

    /// Tax registry (captcha + taxpayer lookup) configuration.
    pub registry: RegistryConfig,

    /// Geocoding configuration.
    pub geocoder: GeocoderConfig,

    /// File locations.
    pub storage: StorageConfig,

    /// HTTP server configuration.
    pub server: ServerConfig,
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Replace `[UNK]` recognizer tokens with spaces.
    pub replace_unknown: bool,

    /// Upper bound for one OCR run, in seconds.
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            replace_unknown: true,
            timeout_secs: 60,
        }
    }
}

impl OcrConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,

    /// Bearer token.
    pub api_key: String,

    /// Model identifier.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Maximum number of OCR characters sent to the model.
    pub max_input_chars: usize,

    /// Request timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: String::new(),
            model: "llama3-70b-8192".to_string(),
            temperature: 0.7,
            max_input_chars: 3000,
            timeout_secs: 60,
        }
    }
}

/// Structuring rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Drop registration numbers whose check character does not match.
    /// When false a mismatch only produces a warning.
    pub reject_bad_checksum: bool,

    /// Run the pattern matcher over the OCR text when the model returns no
    /// registration number.
    pub recover_number_from_text: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            reject_bad_checksum: false,
            recover_number_from_text: true,
        }
    }
}

/// Tax registry endpoints and response codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Captcha endpoint; a random cache-busting value is appended.
    pub captcha_url: String,

    /// Taxpayer details endpoint.
    pub details_url: String,

    /// Name of the cookie that carries the captcha session.
    pub cookie_name: String,

    /// Error code for an unknown registration number.
    pub invalid_number_code: String,

    /// Error code for a wrong captcha answer.
    pub invalid_captcha_code: String,

    /// Request timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            captcha_url: "https://services.gst.gov.in/services/captcha?rnd=".to_string(),
            details_url: "https://services.gst.gov.in/services/api/search/taxpayerDetails"
                .to_string(),
            cookie_name: "CaptchaCookie".to_string(),
            invalid_number_code: "SWEB_9035".to_string(),
            invalid_captcha_code: "SWEB_9000".to_string(),
            timeout_secs: 20,
        }
    }
}

/// Nominatim-compatible geocoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Search endpoint.
    pub search_url: String,

    /// User agent (Nominatim rejects anonymous clients).
    pub user_agent: String,

    /// Request timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            search_url: "https://nominatim.openstreetmap.org/search".to_string(),
            user_agent: "ExpenseTrackerApp/1.0".to_string(),
            timeout_secs: 10,
        }
    }
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory captcha images are written to and served from.
    pub uploads_dir: PathBuf,

    /// Directory holding the JSON-lines store.
    pub data_dir: PathBuf,

    /// Captcha images older than this are purged, in seconds.
    pub captcha_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            data_dir: PathBuf::from("data"),
            captcha_ttl_secs: 600,
        }
    }
}

impl StorageConfig {
    pub fn captcha_ttl(&self) -> Duration {
        Duration::from_secs(self.captcha_ttl_secs)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl BillscanConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.completion.api_key = key.trim().to_string();
            }
        }
        self
    }
}
