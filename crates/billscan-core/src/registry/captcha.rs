//! Captcha broker: fetches a registry challenge and stores its image.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::SET_COOKIE;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::BrokerError;
use crate::models::config::{RegistryConfig, StorageConfig};
use crate::models::records::CaptchaChallenge;

use super::ChallengeSource;
use super::cookie::find_cookie;

const REF_PREFIX: &str = "captcha_";
const REF_SUFFIX: &str = ".png";

/// Fetches captcha challenges from the registry.
pub struct CaptchaBroker {
    client: Client,
    captcha_url: String,
    cookie_name: String,
    uploads_dir: PathBuf,
}

impl CaptchaBroker {
    pub fn new(registry: &RegistryConfig, storage: &StorageConfig) -> Result<Self, BrokerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(registry.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            captcha_url: registry.captcha_url.clone(),
            cookie_name: registry.cookie_name.clone(),
            uploads_dir: storage.uploads_dir.clone(),
        })
    }
}

#[async_trait]
impl ChallengeSource for CaptchaBroker {
    async fn fetch_challenge(&self) -> Result<CaptchaChallenge, BrokerError> {
        // The endpoint serves a cached image unless the query value changes.
        let url = format!("{}{}", self.captcha_url, Uuid::new_v4().simple());
        debug!("Requesting captcha from {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BrokerError::Status(status.as_u16()));
        }

        let session_token = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|raw| find_cookie(raw, &self.cookie_name))
            .ok_or_else(|| BrokerError::MissingCookie(self.cookie_name.clone()))?;

        let image = response.bytes().await?.to_vec();
        if image.is_empty() || image::guess_format(&image).is_err() {
            return Err(BrokerError::MalformedImage);
        }

        tokio::fs::create_dir_all(&self.uploads_dir).await?;
        let image_ref = new_captcha_ref();
        tokio::fs::write(self.uploads_dir.join(&image_ref), &image).await?;

        info!("Stored captcha challenge {} ({} bytes)", image_ref, image.len());

        Ok(CaptchaChallenge {
            image,
            image_ref,
            session_token,
        })
    }
}

/// Fresh, unguessable file name for a challenge image.
pub fn new_captcha_ref() -> String {
    format!("{}{}{}", REF_PREFIX, Uuid::new_v4().simple(), REF_SUFFIX)
}

/// Check that a file name is one this broker could have generated.
///
/// Anything else (other uploads, path traversal) must not be served.
pub fn is_captcha_ref(name: &str) -> bool {
    name.strip_prefix(REF_PREFIX)
        .and_then(|rest| rest.strip_suffix(REF_SUFFIX))
        .is_some_and(|id| {
            id.len() == 32 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        })
}

/// Delete challenge images older than `ttl`. Returns how many were removed.
pub async fn purge_expired(dir: &Path, ttl: Duration) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let now = SystemTime::now();
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !is_captcha_ref(name) {
            continue;
        }

        let modified = entry.metadata().await?.modified()?;
        let age = now.duration_since(modified).unwrap_or_default();
        if age > ttl {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to purge {}: {}", name, e),
            }
        }
    }

    if removed > 0 {
        debug!("Purged {} expired captcha images", removed);
    }
    Ok(removed)
}
