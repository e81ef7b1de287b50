// Error handling module
// Closed error taxonomies for the auth engine and the deployment API client

use thiserror::Error;

/// Maximum length for upstream response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Errors raised by authentication, credential resolution and organisation checks
#[derive(Error, Debug)]
pub enum AuthError {
    /// No credentials could be resolved from any tier
    #[error("Not authenticated. Run 'deployment-queue-cli login' first.")]
    NotAuthenticated,

    /// GitHub rejected the token outright
    #[error("Invalid GitHub token")]
    InvalidCredential,

    /// Token is valid but not a member of the requested organisation
    #[error(
        "You are not a member of organisation '{organisation}'.\nYour organisations: {}",
        .available.join(", ")
    )]
    NotAMember {
        organisation: String,
        available: Vec<String>,
    },

    /// GitHub reported the device code as expired
    #[error("Device code expired. Please try again.")]
    Expired,

    /// The local device flow deadline passed without a terminal answer
    #[error("Authorization timed out. Please try again.")]
    TimedOut,

    /// The user declined the device authorization
    #[error("Authorization denied by user.")]
    Denied,

    /// Unrecognised error code from the identity provider
    #[error("Unexpected error: {0}")]
    Upstream(String),

    /// Device flow requested without an OAuth client ID
    #[error(
        "GitHub client ID not configured. Set DEPLOYMENT_QUEUE_CLI_GITHUB_CLIENT_ID environment variable."
    )]
    MissingClientId,

    /// Non-success HTTP status from GitHub
    #[error("GitHub API error: {status} - {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials file could not be written or removed
    #[error("Credential storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl AuthError {
    pub fn not_a_member<I>(organisation: &str, available: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut available: Vec<String> = available.into_iter().collect();
        available.sort();
        AuthError::NotAMember {
            organisation: organisation.to_string(),
            available,
        }
    }

    /// Build an error from an unexpected GitHub status
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        AuthError::UnexpectedStatus {
            status: status.as_u16(),
            body: truncate_body(body),
        }
    }
}

/// Errors raised by the deployment API client
#[derive(Error, Debug)]
pub enum ApiError {
    /// Error status from the deployment service
    #[error("API error {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Build a status error, preferring the service's JSON `detail` field
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| json.get("detail").cloned())
            .map(|detail| match detail {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_else(|| truncate_body(body));

        ApiError::Status {
            status: status.as_u16(),
            detail,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            ApiError::InvalidResponse(_) | ApiError::InvalidUrl(_) => None,
        }
    }

    /// One-line message for people: maps the common statuses to remediation text
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { status: 401, .. } => {
                "Authentication failed. Try 'deployment-queue-cli login' again.".to_string()
            }
            ApiError::Status {
                status: 403,
                detail,
            } => format!("Access denied: {}", detail),
            ApiError::Status {
                status: 404,
                detail,
            } => format!("Not found: {}", detail),
            ApiError::Status { status, detail } => format!("API error ({}): {}", status, detail),
            other => other.to_string(),
        }
    }
}

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

/// Result type alias for auth operations
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Result type alias for deployment API operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;
