// GitHub identity client
// User identity, organisation membership and the two device flow endpoints

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, Response, StatusCode};

use super::device_flow::TokenExchange;
use super::types::{
    DeviceAuthorization, DeviceCodeResponse, GitHubOrganisation, GitHubUser, PollOutcome,
    TokenResponse,
};
use crate::config::GitHubEndpoints;
use crate::error::{AuthError, AuthResult};

/// Per-request timeout for REST calls
const API_TIMEOUT_SECS: u64 = 10;

/// Per-request timeout for the OAuth endpoints
const OAUTH_TIMEOUT_SECS: u64 = 30;

/// Hard ceiling on `/user/orgs` pages; guarantees termination against a
/// paginated endpoint that never returns an empty page
pub const MAX_ORGANISATION_PAGES: u32 = 10;

const ORGANISATIONS_PER_PAGE: u32 = 100;

/// Scopes requested by the device flow
pub const DEVICE_FLOW_SCOPES: &str = "read:org read:user";

const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

const GITHUB_API_VERSION: &str = "2022-11-28";

const USER_AGENT: &str = concat!("deployment-queue-cli/", env!("CARGO_PKG_VERSION"));

/// Thin wrapper over the GitHub endpoints the auth engine needs
#[derive(Clone)]
pub struct GitHubClient {
    api: Client,
    oauth: Client,
    endpoints: GitHubEndpoints,
    client_id: Option<String>,
}

impl GitHubClient {
    pub fn new(endpoints: GitHubEndpoints, client_id: Option<String>) -> AuthResult<Self> {
        let api = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;
        let oauth = Client::builder()
            .timeout(Duration::from_secs(OAUTH_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            api,
            oauth,
            endpoints,
            client_id,
        })
    }

    fn api_get(&self, url: &str, token: &str) -> RequestBuilder {
        self.api
            .get(url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .bearer_auth(token)
    }

    fn client_id(&self) -> AuthResult<&str> {
        self.client_id.as_deref().ok_or(AuthError::MissingClientId)
    }

    /// Fetch the authenticated user. A 401 means the token itself is bad.
    pub async fn get_user(&self, token: &str) -> AuthResult<GitHubUser> {
        let response = self.api_get(&self.endpoints.user_url(), token).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!("GitHub rejected token on /user");
            return Err(AuthError::InvalidCredential);
        }

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Every organisation login visible to the token.
    ///
    /// Pages through `/user/orgs` until an empty page, stopping after
    /// [`MAX_ORGANISATION_PAGES`] pages regardless.
    pub async fn list_organisations(&self, token: &str) -> AuthResult<BTreeSet<String>> {
        let url = self.endpoints.user_orgs_url();
        let mut organisations = BTreeSet::new();

        for page in 1..=MAX_ORGANISATION_PAGES {
            let response = self
                .api_get(&url, token)
                .query(&[("page", page), ("per_page", ORGANISATIONS_PER_PAGE)])
                .send()
                .await?;

            let response = check_status(response).await?;
            let page_orgs: Vec<GitHubOrganisation> = response.json().await?;

            if page_orgs.is_empty() {
                break;
            }

            organisations.extend(page_orgs.into_iter().map(|org| org.login));

            if page == MAX_ORGANISATION_PAGES {
                tracing::warn!(
                    pages = MAX_ORGANISATION_PAGES,
                    "Organisation listing hit page limit, results may be incomplete"
                );
            }
        }

        tracing::debug!(count = organisations.len(), "Fetched organisations");
        Ok(organisations)
    }

    /// Case-insensitive membership check; re-fetches on every call
    pub async fn is_member(&self, token: &str, organisation: &str) -> AuthResult<bool> {
        let organisations = self.list_organisations(token).await?;
        Ok(contains_organisation(&organisations, organisation))
    }

    /// Start a device flow: ask GitHub for a device and user code
    pub async fn request_device_code(&self) -> AuthResult<DeviceAuthorization> {
        let client_id = self.client_id()?;

        let response = self
            .oauth
            .post(self.endpoints.device_code_url())
            .header(header::ACCEPT, "application/json")
            .form(&[("client_id", client_id), ("scope", DEVICE_FLOW_SCOPES)])
            .send()
            .await?;

        let response = check_status(response).await?;
        let data: DeviceCodeResponse = response.json().await?;
        Ok(DeviceAuthorization::from(data))
    }

    /// One token exchange attempt for a pending device code
    pub async fn exchange_device_code(&self, device_code: &str) -> AuthResult<PollOutcome> {
        let client_id = self.client_id()?;

        let response = self
            .oauth
            .post(self.endpoints.access_token_url())
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("client_id", client_id),
                ("device_code", device_code),
                ("grant_type", DEVICE_GRANT_TYPE),
            ])
            .send()
            .await?;

        // Pending/slow_down arrive as 200 with an `error` field; 4xx bodies use
        // the same shape, so parse before looking at the status.
        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<TokenResponse>(&body) {
            Ok(data) => Ok(PollOutcome::from(data)),
            Err(_) if !status.is_success() => Err(AuthError::from_status(status, &body)),
            Err(e) => Ok(PollOutcome::Failed(format!("invalid token response: {}", e))),
        }
    }
}

impl TokenExchange for GitHubClient {
    fn exchange(&self, device_code: &str) -> impl Future<Output = AuthResult<PollOutcome>> + Send {
        self.exchange_device_code(device_code)
    }
}

/// Case-insensitive containment over organisation logins
pub fn contains_organisation(organisations: &BTreeSet<String>, organisation: &str) -> bool {
    organisations
        .iter()
        .any(|org| org.eq_ignore_ascii_case(organisation))
}

async fn check_status(response: Response) -> AuthResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = %status, "GitHub request failed");
    Err(AuthError::from_status(status, &body))
}
