// Authentication manager
// Login, organisation switching and logout over the credential store

use super::credentials::CredentialStore;
use super::device_flow::{poll_for_token, Clock, DeviceFlow, TokioClock};
use super::github::{contains_organisation, GitHubClient};
use super::resolver::{self, CredentialSource};
use super::types::{Credentials, DeviceAuthorization};
use crate::config::Settings;
use crate::error::{AuthError, AuthResult};

/// Authentication manager
/// Orchestrates device flow and PAT logins, organisation switches and logout
/// on top of an immutable [`Settings`] value
pub struct AuthManager<C: Clock = TokioClock> {
    settings: Settings,

    /// GitHub identity + OAuth endpoints
    github: GitHubClient,

    /// Where login, switch and logout persist
    store: CredentialStore,

    /// Drives the device flow poll loop
    clock: C,
}

impl AuthManager<TokioClock> {
    pub fn new(settings: Settings) -> AuthResult<Self> {
        Self::with_clock(settings, TokioClock)
    }
}

impl<C: Clock> AuthManager<C> {
    pub fn with_clock(settings: Settings, clock: C) -> AuthResult<Self> {
        let github = GitHubClient::new(settings.github.clone(), settings.github_client_id.clone())?;
        let store = CredentialStore::new(settings.writable_credentials_path());

        Ok(Self {
            settings,
            github,
            store,
            clock,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Resolve the current session without touching the network
    pub fn resolve(&self) -> Option<Credentials> {
        resolver::resolve(&self.settings)
    }

    pub fn resolve_with_source(&self) -> Option<(Credentials, CredentialSource)> {
        resolver::resolve_with_source(&self.settings)
    }

    /// Resolve the current session or fail with `NotAuthenticated`
    pub fn require_credentials(&self) -> AuthResult<Credentials> {
        self.resolve().ok_or(AuthError::NotAuthenticated)
    }

    /// Log in with a personal access token: one identity fetch, one membership
    /// check, no retries
    pub async fn login_with_pat(&self, token: &str, organisation: &str) -> AuthResult<Credentials> {
        tracing::info!(organisation, "Verifying personal access token");
        self.verify_and_persist(token, organisation).await
    }

    /// Ask GitHub for a device code. The caller shows `user_code` and
    /// `verification_uri` to the user, then calls [`Self::complete_device_login`].
    pub async fn request_device_authorization(&self) -> AuthResult<DeviceAuthorization> {
        if self.settings.github_client_id.is_none() {
            return Err(AuthError::MissingClientId);
        }
        let authorization = self.github.request_device_code().await?;
        tracing::debug!(?authorization, "Device code issued");
        Ok(authorization)
    }

    /// Poll until the user authorizes, then verify membership and persist.
    ///
    /// Only a fully verified grant writes the credentials file.
    pub async fn complete_device_login(
        &self,
        authorization: &DeviceAuthorization,
        organisation: &str,
    ) -> AuthResult<Credentials> {
        let mut flow = DeviceFlow::new(authorization);
        let token = poll_for_token(
            &mut flow,
            &self.github,
            &self.clock,
            &authorization.device_code,
        )
        .await?;

        match self.verify_and_persist(&token, organisation).await {
            Ok(creds) => {
                flow.grant();
                Ok(creds)
            }
            Err(e) => {
                flow.fail();
                Err(e)
            }
        }
    }

    /// Full device flow; `prompt` is called once with the code to display
    pub async fn login_with_device_flow<F>(
        &self,
        organisation: &str,
        prompt: F,
    ) -> AuthResult<Credentials>
    where
        F: FnOnce(&DeviceAuthorization),
    {
        let authorization = self.request_device_authorization().await?;
        prompt(&authorization);
        self.complete_device_login(&authorization, organisation).await
    }

    async fn verify_and_persist(&self, token: &str, organisation: &str) -> AuthResult<Credentials> {
        let user = self.github.get_user(token).await?;
        self.verify_membership(token, organisation).await?;

        let creds = Credentials::new(token, organisation, user.login);
        self.persist(&creds)?;
        Ok(creds)
    }

    /// Switch the stored session to another organisation using the existing
    /// token. The file is left untouched when membership fails.
    ///
    /// Only the credentials file is consulted; environment credentials are
    /// never written to disk.
    pub async fn switch_organisation(&self, organisation: &str) -> AuthResult<Credentials> {
        let current = self.store.load().ok_or(AuthError::NotAuthenticated)?;

        self.verify_membership(&current.token, organisation).await?;

        let creds = current.with_organisation(organisation);
        self.persist(&creds)?;
        tracing::info!(from = %current.organisation, to = %organisation, "Switched organisation");
        Ok(creds)
    }

    /// Sorted organisation logins visible to the current session
    pub async fn list_available_organisations(&self) -> AuthResult<Vec<String>> {
        let creds = self.require_credentials()?;
        let organisations = self.github.list_organisations(&creds.token).await?;
        Ok(organisations.into_iter().collect())
    }

    /// Delete the credentials file. Environment credentials are unaffected.
    pub fn logout(&self) -> AuthResult<()> {
        self.store.clear()?;
        Ok(())
    }

    async fn verify_membership(&self, token: &str, organisation: &str) -> AuthResult<()> {
        let organisations = self.github.list_organisations(token).await?;
        if !contains_organisation(&organisations, organisation) {
            tracing::warn!(organisation, "Token is not a member of organisation");
            return Err(AuthError::not_a_member(organisation, organisations));
        }
        Ok(())
    }

    fn persist(&self, creds: &Credentials) -> AuthResult<()> {
        self.store.save(creds)?;
        tracing::info!(
            username = %creds.username,
            organisation = %creds.organisation,
            path = %self.store.path().display(),
            "Credentials saved"
        );
        Ok(())
    }
}
