//! GST registry access: captcha challenges and taxpayer lookups.

mod captcha;
mod cookie;
mod validator;

pub use captcha::{CaptchaBroker, is_captcha_ref, new_captcha_ref, purge_expired};
pub use cookie::find_cookie;
pub use validator::{ErrorCodes, RegistryValidator, classify_response};

use async_trait::async_trait;

use crate::error::BrokerError;
use crate::models::records::{CaptchaChallenge, RegistryResult};

/// Source of captcha challenges.
#[async_trait]
pub trait ChallengeSource: Send + Sync {
    /// Fetch a fresh challenge. Each call yields a new session token.
    async fn fetch_challenge(&self) -> Result<CaptchaChallenge, BrokerError>;
}

/// Registration-number lookup guarded by a solved captcha.
///
/// Implementations never retry: a session token is spent by one attempt.
#[async_trait]
pub trait TaxRegistry: Send + Sync {
    async fn validate(
        &self,
        registration_number: &str,
        captcha_text: &str,
        session_token: &str,
    ) -> RegistryResult;
}
