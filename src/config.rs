//! Settings for the Deployment Queue CLI and MCP server.
//!
//! Everything is read once at start-up into an immutable [`Settings`] value that
//! is passed by reference into the auth engine and the API client. Values come
//! from `DEPLOYMENT_QUEUE_CLI_*` environment variables, optionally seeded from a
//! `.env` file in the working directory.

use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

/// Prefix shared by every environment variable this crate reads
pub const ENV_PREFIX: &str = "DEPLOYMENT_QUEUE_CLI_";

/// Deployment API used when `DEPLOYMENT_QUEUE_CLI_API_URL` is not set
pub const DEFAULT_API_URL: &str = "https://deployments.example.com";

/// GitHub OAuth host (device code + token exchange)
pub const DEFAULT_GITHUB_OAUTH_URL: &str = "https://github.com";

/// GitHub REST API host
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Directory under `~/.config` holding the credentials file
const APP_DIR: &str = "deployment-queue-cli";

/// Credentials file name
const CREDENTIALS_FILE: &str = "credentials.json";

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Base URLs for the identity provider. Overridable so tests can point the
/// client at a local mock server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitHubEndpoints {
    pub oauth_base_url: String,
    pub api_base_url: String,
}

impl Default for GitHubEndpoints {
    fn default() -> Self {
        Self {
            oauth_base_url: DEFAULT_GITHUB_OAUTH_URL.to_string(),
            api_base_url: DEFAULT_GITHUB_API_URL.to_string(),
        }
    }
}

impl GitHubEndpoints {
    /// Point both hosts at the same base URL (mock servers)
    pub fn single_host(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            oauth_base_url: base.clone(),
            api_base_url: base,
        }
    }

    pub fn device_code_url(&self) -> String {
        format!("{}/login/device/code", self.oauth_base_url)
    }

    pub fn access_token_url(&self) -> String {
        format!("{}/login/oauth/access_token", self.oauth_base_url)
    }

    pub fn user_url(&self) -> String {
        format!("{}/user", self.api_base_url)
    }

    pub fn user_orgs_url(&self) -> String {
        format!("{}/user/orgs", self.api_base_url)
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    // Deployment API
    pub api_url: String,

    // GitHub OAuth app used by the device flow
    pub github_client_id: Option<String>,
    pub github: GitHubEndpoints,

    // Direct credentials (highest resolution tier)
    pub github_token: Option<String>,
    pub organisation: Option<String>,
    pub username: Option<String>,

    // Credentials file
    pub credentials_file: Option<PathBuf>,
    pub default_credentials_file: PathBuf,

    // Logging
    pub log_level: String,
}

impl Settings {
    /// Load settings from `.env` (if present) and the process environment.
    ///
    /// Variables already present in the environment win over `.env` entries.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Build settings from the process environment only
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    ///
    /// `lookup` receives fully prefixed names such as
    /// `DEPLOYMENT_QUEUE_CLI_GITHUB_TOKEN`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Settings {
            api_url: var("API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            github_client_id: var("GITHUB_CLIENT_ID"),
            github: GitHubEndpoints::default(),
            github_token: var("GITHUB_TOKEN"),
            organisation: var("ORGANISATION"),
            username: var("USERNAME"),
            credentials_file: var("CREDENTIALS_FILE").map(|s| expand_tilde(&s)),
            default_credentials_file: default_credentials_path(),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    /// Replace the default credentials location (tests, alternate homes)
    pub fn with_default_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_credentials_file = path.into();
        self
    }

    pub fn with_github_endpoints(mut self, endpoints: GitHubEndpoints) -> Self {
        self.github = endpoints;
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// File that login, switch-org and logout write to: the explicit override
    /// when configured, the default location otherwise.
    pub fn writable_credentials_path(&self) -> &Path {
        self.credentials_file
            .as_deref()
            .unwrap_or(&self.default_credentials_file)
    }
}

/// `~/.config/deployment-queue-cli/credentials.json`
pub fn default_credentials_path() -> PathBuf {
    let base = dirs::home_dir()
        .map(|home| home.join(".config"))
        .or_else(dirs::config_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(APP_DIR).join(CREDENTIALS_FILE)
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Install the global tracing subscriber.
///
/// Output always goes to stderr: stdout carries command output for the CLI and
/// the JSON-RPC stream for the MCP server. `RUST_LOG` wins over the configured
/// level when set.
pub fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}
