// Authentication types

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default poll interval when GitHub omits `interval`
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default device code lifetime when GitHub omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 900;

/// Authenticated session: a GitHub token scoped to one organisation.
///
/// The on-disk field name for the token is `github_token`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "github_token")]
    pub token: String,
    pub organisation: String,
    pub username: String,
}

impl Credentials {
    pub fn new(
        token: impl Into<String>,
        organisation: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            organisation: organisation.into(),
            username: username.into(),
        }
    }

    /// A session is only usable when all three fields are present
    pub fn is_complete(&self) -> bool {
        !self.token.is_empty() && !self.organisation.is_empty() && !self.username.is_empty()
    }

    /// Same token and user, different organisation
    pub fn with_organisation(&self, organisation: &str) -> Self {
        Self {
            token: self.token.clone(),
            organisation: organisation.to_string(),
            username: self.username.clone(),
        }
    }
}

// Keep the bearer secret out of logs and panic messages
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &redact(&self.token))
            .field("organisation", &self.organisation)
            .field("username", &self.username)
            .finish()
    }
}

/// Show at most the first four characters of a secret
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{}***", prefix)
}

/// GitHub device code response
#[derive(Debug, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub interval: Option<u64>,
    pub expires_in: Option<u64>,
}

/// Device authorization session, alive for one login invocation
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub poll_interval: Duration,
    pub expires_in: Duration,
}

impl From<DeviceCodeResponse> for DeviceAuthorization {
    fn from(response: DeviceCodeResponse) -> Self {
        Self {
            device_code: response.device_code,
            user_code: response.user_code,
            verification_uri: response.verification_uri,
            poll_interval: Duration::from_secs(
                response.interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            expires_in: Duration::from_secs(
                response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            ),
        }
    }
}

// device_code is never shown to the user
impl fmt::Debug for DeviceAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceAuthorization")
            .field("user_code", &self.user_code)
            .field("verification_uri", &self.verification_uri)
            .field("poll_interval", &self.poll_interval)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// GitHub token exchange response. GitHub answers 200 for both outcomes, with
/// either `access_token` or `error` set.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Classified result of one token exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Token(String),
    Pending,
    SlowDown,
    Expired,
    Denied,
    Failed(String),
}

impl From<TokenResponse> for PollOutcome {
    fn from(response: TokenResponse) -> Self {
        if let Some(token) = response.access_token.filter(|t| !t.is_empty()) {
            return PollOutcome::Token(token);
        }

        match response.error.as_deref() {
            Some("authorization_pending") => PollOutcome::Pending,
            Some("slow_down") => PollOutcome::SlowDown,
            Some("expired_token") => PollOutcome::Expired,
            Some("access_denied") => PollOutcome::Denied,
            Some(code) => PollOutcome::Failed(code.to_string()),
            None => PollOutcome::Failed(
                response
                    .error_description
                    .unwrap_or_else(|| "missing access_token".to_string()),
            ),
        }
    }
}

/// GitHub user identity
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

/// Entry in `/user/orgs`
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubOrganisation {
    pub login: String,
}
