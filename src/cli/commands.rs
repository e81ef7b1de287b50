// Command handlers
// Each command resolves credentials, calls the auth engine or the deployment
// API, and returns the text to print

use anyhow::{bail, Context, Result};
use dialoguer::Confirm;

use super::render;
use super::{ApiArgs, Cli, Command};
use crate::auth::{AuthManager, Credentials, DeviceAuthorization};
use crate::config::Settings;
use crate::error::{ApiError, AuthError};
use crate::http_client::DeploymentClient;
use crate::models::Taxonomy;

/// Parse-independent entry point used by `main`
pub async fn run(cli: Cli, settings: Settings) -> Result<()> {
    let output = execute(cli.command, &settings).await?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

/// Execute one command and return its rendered output
pub async fn execute(command: Command, settings: &Settings) -> Result<String> {
    match command {
        Command::Login { organisation, pat } => login(settings, &organisation, pat).await,
        Command::Logout => logout(settings),
        Command::Whoami => Ok(whoami(settings)),
        Command::SwitchOrg { organisation } => {
            let creds = AuthManager::new(settings.clone())?
                .switch_organisation(&organisation)
                .await?;
            Ok(with_environment_note(
                settings,
                format!("Switched to {}", creds.organisation),
            ))
        }
        Command::ListOrgs => {
            let organisations = AuthManager::new(settings.clone())?
                .list_available_organisations()
                .await?;
            let mut lines = vec!["Available organisations:".to_string()];
            lines.extend(organisations.iter().map(|org| format!("  - {}", org)));
            Ok(lines.join("\n"))
        }
        Command::Create(args) => {
            let client = api_client(settings, &args.api)?;
            let d = client.create_deployment(&args.to_request()).await?;
            Ok([
                format!("Created deployment: {} @ {}", d.name, d.version),
                format!("  ID: {}", d.id),
                format!("  Status: {}", d.status),
                format!("  Environment: {}", d.environment.unwrap_or_default()),
            ]
            .join("\n"))
        }
        Command::List(args) => {
            let client = api_client(settings, &args.api)?;
            let deployments = client.list_deployments(&args.filter()).await?;
            if deployments.is_empty() {
                return Ok("No deployments found".to_string());
            }
            Ok(render::deployments_table(&deployments))
        }
        Command::Get { deployment_id, api } => {
            let client = api_client(settings, &api)?;
            let d = client.get_deployment(&deployment_id).await?;
            Ok(render::deployment_details(&d))
        }
        Command::Current { taxonomy, api } => {
            let client = api_client(settings, &api)?;
            match client.get_current(&taxonomy.into()).await? {
                Some(d) => Ok(render::current_summary(&d)),
                None => Ok("No deployment found for this component".to_string()),
            }
        }
        Command::History {
            taxonomy,
            limit,
            api,
        } => {
            let client = api_client(settings, &api)?;
            let taxonomy: Taxonomy = taxonomy.into();
            let deployments = client.get_history(&taxonomy, limit).await?;
            if deployments.is_empty() {
                return Ok("No deployment history found".to_string());
            }
            Ok(render::history_table(
                &taxonomy.name,
                &taxonomy.environment,
                &deployments,
            ))
        }
        Command::UpdateStatus {
            taxonomy,
            new_status,
            notes,
            deployment_uri,
            api,
        } => {
            let client = api_client(settings, &api)?;
            let d = client
                .update_status(
                    &taxonomy.into(),
                    new_status.as_str(),
                    notes.as_deref(),
                    deployment_uri.as_deref(),
                )
                .await?;
            Ok(format!("Updated {} to {}", d.name, d.status))
        }
        Command::Rollback {
            taxonomy,
            target_version,
            yes,
            api,
        } => {
            let client = api_client(settings, &api)?;
            let taxonomy: Taxonomy = taxonomy.into();
            if !yes && !confirm_rollback(&taxonomy, target_version.as_deref())? {
                return Ok("Rollback cancelled".to_string());
            }
            let d = client
                .rollback(&taxonomy, target_version.as_deref())
                .await?;
            Ok(render::rollback_summary(&d))
        }
    }
}

async fn login(settings: &Settings, organisation: &str, pat: Option<String>) -> Result<String> {
    let manager = AuthManager::new(settings.clone())?;

    let creds = match pat {
        Some(pat) => manager
            .login_with_pat(&pat, organisation)
            .await
            .context("Login failed")?,
        None => device_login(&manager, organisation).await?,
    };

    Ok(format!(
        "Logged in as {} ({})",
        creds.username, creds.organisation
    ))
}

async fn device_login(manager: &AuthManager, organisation: &str) -> Result<Credentials> {
    let authorization = manager
        .request_device_authorization()
        .await
        .context("Login failed")?;
    print_device_prompt(&authorization);

    // Dropping the login future on Ctrl+C abandons the flow before anything is saved
    tokio::select! {
        result = manager.complete_device_login(&authorization, organisation) => {
            result.context("Login failed")
        }
        _ = shutdown_signal() => {
            tracing::info!("Device flow interrupted");
            bail!("Login cancelled")
        }
    }
}

fn print_device_prompt(authorization: &DeviceAuthorization) {
    println!();
    println!("To authenticate, visit: {}", authorization.verification_uri);
    println!("   Enter code: {}", authorization.user_code);
    println!();
    println!("Waiting for authorization...");
}

fn logout(settings: &Settings) -> Result<String> {
    let manager = AuthManager::new(settings.clone())?;
    manager.logout()?;

    Ok(with_environment_note(settings, "Logged out".to_string()))
}

/// Environment credentials take precedence over anything written to disk
fn with_environment_note(settings: &Settings, mut output: String) -> String {
    if settings.github_token.is_some() && settings.organisation.is_some() {
        output.push_str("\nNote: credentials in the environment are still active");
    }
    output
}

fn whoami(settings: &Settings) -> String {
    match crate::auth::resolver::resolve_with_source(settings) {
        Some((creds, source)) => render::session(&creds, &settings.api_url, &source.to_string()),
        None => "Not logged in. Run 'deployment-queue-cli login' first.".to_string(),
    }
}

/// Build an API client for the resolved session
fn api_client(settings: &Settings, api: &ApiArgs) -> Result<DeploymentClient> {
    let creds = crate::auth::resolve(settings).ok_or(AuthError::NotAuthenticated)?;
    let base_url = api.api_url.as_deref().unwrap_or(&settings.api_url);
    Ok(DeploymentClient::new(base_url, creds)?)
}

fn confirm_rollback(taxonomy: &Taxonomy, target_version: Option<&str>) -> Result<bool> {
    let target = target_version.unwrap_or("the previous version");
    let prompt = format!(
        "Roll back {} in {} ({}/{}) to {}?",
        taxonomy.name, taxonomy.environment, taxonomy.provider, taxonomy.region, target
    );

    match Confirm::new().with_prompt(prompt).default(false).interact() {
        Ok(confirmed) => Ok(confirmed),
        Err(e) => bail!("Cannot ask for confirmation ({}). Pass --yes to skip it.", e),
    }
}

/// Message shown to the user for a failed command
pub fn report(err: &anyhow::Error) -> String {
    if let Some(api) = err.downcast_ref::<ApiError>() {
        return api.user_message();
    }
    format!("{:#}", err)
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
