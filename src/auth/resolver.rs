// Credential resolution
// Fixed precedence: environment > explicit credentials file > default file

use super::credentials::CredentialStore;
use super::types::Credentials;
use crate::config::Settings;

/// Username used for environment credentials when none is given
pub const ENV_USERNAME_PLACEHOLDER: &str = "env-user";

/// Which tier produced the resolved credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    OverrideFile,
    DefaultFile,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CredentialSource::Environment => "environment",
            CredentialSource::OverrideFile => "credentials file (override)",
            CredentialSource::DefaultFile => "credentials file",
        };
        f.write_str(label)
    }
}

/// Resolve the active credentials, if any
pub fn resolve(settings: &Settings) -> Option<Credentials> {
    resolve_with_source(settings).map(|(creds, _)| creds)
}

/// Resolve the active credentials and report the tier they came from.
///
/// Tiers never merge: the first applicable tier decides, including deciding
/// that there is no session.
pub fn resolve_with_source(settings: &Settings) -> Option<(Credentials, CredentialSource)> {
    if let Some(creds) = from_environment(settings) {
        tracing::debug!("Using credentials from environment");
        return Some((creds, CredentialSource::Environment));
    }

    if let Some(path) = settings.credentials_file.as_deref() {
        tracing::debug!(path = %path.display(), "Using credentials file override");
        return CredentialStore::new(path)
            .load()
            .map(|creds| (creds, CredentialSource::OverrideFile));
    }

    CredentialStore::new(&settings.default_credentials_file)
        .load()
        .map(|creds| (creds, CredentialSource::DefaultFile))
}

/// Token and organisation must both be set; username is optional
fn from_environment(settings: &Settings) -> Option<Credentials> {
    let token = settings.github_token.as_deref()?;
    let organisation = settings.organisation.as_deref()?;
    let username = settings
        .username
        .as_deref()
        .unwrap_or(ENV_USERNAME_PLACEHOLDER);

    Some(Credentials::new(token, organisation, username))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use tempfile::TempDir;

    fn settings(vars: &[(&str, String)], default_file: &Path) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (format!("DEPLOYMENT_QUEUE_CLI_{}", k), v.clone()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
            .with_default_credentials_file(default_file)
    }

    fn write_creds(path: &Path, creds: &Credentials) {
        CredentialStore::new(path).save(creds).unwrap();
    }

    #[test]
    fn test_environment_wins_over_files() {
        let dir = TempDir::new().unwrap();
        let default_file = dir.path().join("default.json");
        let override_file = dir.path().join("override.json");
        write_creds(&default_file, &Credentials::new("ghp_file", "file-org", "file-user"));
        write_creds(&override_file, &Credentials::new("ghp_a", "a-org", "a-user"));

        let settings = settings(
            &[
                ("GITHUB_TOKEN", "ghp_env_token".into()),
                ("ORGANISATION", "env-org".into()),
                ("USERNAME", "ci-bot".into()),
                ("CREDENTIALS_FILE", override_file.display().to_string()),
            ],
            &default_file,
        );

        let (creds, source) = resolve_with_source(&settings).unwrap();
        assert_eq!(creds, Credentials::new("ghp_env_token", "env-org", "ci-bot"));
        assert_eq!(source, CredentialSource::Environment);
    }

    #[test]
    fn test_environment_username_placeholder() {
        let dir = TempDir::new().unwrap();
        let settings = settings(
            &[
                ("GITHUB_TOKEN", "ghp_env_token".into()),
                ("ORGANISATION", "env-org".into()),
            ],
            &dir.path().join("missing.json"),
        );

        let creds = resolve(&settings).unwrap();
        assert_eq!(creds.username, "env-user");
    }

    #[test]
    fn test_partial_environment_falls_through() {
        let dir = TempDir::new().unwrap();
        let default_file = dir.path().join("default.json");
        let stored = Credentials::new("ghp_file", "file-org", "file-user");
        write_creds(&default_file, &stored);

        let token_only = settings(&[("GITHUB_TOKEN", "ghp_env".into())], &default_file);
        assert_eq!(resolve(&token_only), Some(stored.clone()));

        let org_only = settings(&[("ORGANISATION", "env-org".into())], &default_file);
        assert_eq!(resolve(&org_only), Some(stored));
    }

    #[test]
    fn test_override_file_wins_over_default() {
        let dir = TempDir::new().unwrap();
        let default_file = dir.path().join("b.json");
        let override_file = dir.path().join("a.json");
        write_creds(&default_file, &Credentials::new("ghp_b", "b-org", "b-user"));
        write_creds(&override_file, &Credentials::new("ghp_a", "a-org", "a-user"));

        let settings = settings(
            &[("CREDENTIALS_FILE", override_file.display().to_string())],
            &default_file,
        );

        let (creds, source) = resolve_with_source(&settings).unwrap();
        assert_eq!(creds, Credentials::new("ghp_a", "a-org", "a-user"));
        assert_eq!(source, CredentialSource::OverrideFile);
    }

    #[test]
    fn test_missing_override_does_not_fall_through() {
        let dir = TempDir::new().unwrap();
        let default_file = dir.path().join("default.json");
        write_creds(&default_file, &Credentials::new("ghp_b", "b-org", "b-user"));

        let settings = settings(
            &[(
                "CREDENTIALS_FILE",
                dir.path().join("absent.json").display().to_string(),
            )],
            &default_file,
        );

        assert_eq!(resolve(&settings), None);
    }

    #[test]
    fn test_default_file() {
        let dir = TempDir::new().unwrap();
        let default_file = dir.path().join("default.json");
        let stored = Credentials::new("ghp_b", "b-org", "b-user");
        write_creds(&default_file, &stored);

        let (creds, source) = resolve_with_source(&settings(&[], &default_file)).unwrap();
        assert_eq!(creds, stored);
        assert_eq!(source, CredentialSource::DefaultFile);
    }

    #[test]
    fn test_nothing_configured() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve(&settings(&[], &dir.path().join("none.json"))), None);
    }
}
