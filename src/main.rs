// Deployment Queue CLI
// Entry point: settings, logging, then one command

use std::process::ExitCode;

use clap::Parser;

use deployment_queue_cli::cli::{self, Cli};
use deployment_queue_cli::config::{self, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration first (for log level)
    let settings = Settings::load();
    config::init_logging(&settings.log_level);

    tracing::debug!(
        api_url = %settings.api_url,
        credentials_file = %settings.writable_credentials_path().display(),
        "Configuration loaded"
    );

    match cli::run(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("{}", cli::commands::report(&e));
            ExitCode::FAILURE
        }
    }
}
