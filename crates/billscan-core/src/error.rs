//! Error types for the billscan-core library.

use thiserror::Error;

/// Main error type for the billscan library.
#[derive(Error, Debug)]
pub enum BillscanError {
    /// Text extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Language-model completion error.
    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),

    /// Captcha broker error.
    #[error("captcha broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Verification error.
    #[error("verification error: {0}")]
    Verify(#[from] VerifyError),

    /// Storage collaborator error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// HTTP client construction error.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while turning an uploaded image into text.
///
/// Every variant is terminal for the ingestion attempt; the caller must
/// re-upload.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The upload could not be decoded as a still image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// Failed to load OCR models.
    #[error("failed to load OCR model: {0}")]
    ModelLoad(String),

    /// The OCR engine failed while recognizing text.
    #[error("OCR engine failed: {0}")]
    Engine(String),

    /// OCR ran but produced no text.
    #[error("no text found in image")]
    NoText,

    /// OCR did not finish within the configured bound.
    #[error("OCR timed out after {0}s")]
    Timeout(u64),

    /// Spooling the upload to a temporary file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the language-model completion endpoint.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// Network-level failure.
    #[error("completion request failed: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("completion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("malformed completion response: {0}")]
    Malformed(String),

    /// The request did not finish in time.
    #[error("completion request timed out")]
    Timeout,
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompletionError::Timeout
        } else if err.is_decode() {
            CompletionError::Malformed(err.to_string())
        } else {
            CompletionError::Transport(err.to_string())
        }
    }
}

/// Reasons a captcha challenge could not be obtained.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Network-level failure.
    #[error("captcha request failed: {0}")]
    Transport(String),

    /// The captcha endpoint answered with a non-success status.
    #[error("captcha endpoint returned {0}")]
    Status(u16),

    /// The response carried no session cookie with the expected name.
    #[error("missing {0} cookie in captcha response")]
    MissingCookie(String),

    /// The body is not a recognizable image.
    #[error("captcha body is not an image")]
    MalformedImage,

    /// The request did not finish in time.
    #[error("captcha request timed out")]
    Timeout,

    /// Writing the captcha image failed.
    #[error("failed to store captcha image: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BrokerError::Timeout
        } else {
            BrokerError::Transport(err.to_string())
        }
    }
}

/// User-facing failures of an `ingest` call.
#[derive(Error, Debug)]
pub enum IngestError {
    /// OCR failed; terminal for this upload.
    #[error("Text extraction failed")]
    Extraction(#[from] ExtractionError),

    /// Anything else that escaped a stage (worker panic, runtime shutdown).
    #[error("Processing failed")]
    Internal(String),
}

/// User-facing failures of a `verify` attempt.
///
/// The display strings are returned to the caller verbatim.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Registration number, captcha text or session token was empty.
    #[error("Missing required fields")]
    MissingFields,

    /// The registry rejected the registration number.
    #[error("Invalid GST number")]
    InvalidNumber,

    /// The registry rejected the captcha answer.
    #[error("Invalid captcha")]
    InvalidCaptcha,

    /// The registry could not be reached or answered with an unknown shape.
    #[error("GST validation failed")]
    Transport(String),

    /// Persisting the verified record failed.
    #[error("failed to save expense: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the storage collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid configuration JSON.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A pipeline was built without a required component.
    #[error("pipeline is missing a {0}")]
    MissingComponent(&'static str),
}

/// Result type for the billscan library.
pub type Result<T> = std::result::Result<T, BillscanError>;
