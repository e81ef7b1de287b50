// Command line interface
// Argument definitions for deployment-queue-cli

pub mod commands;
pub mod render;

use clap::{Args, Parser, Subcommand};

use crate::models::{
    DeploymentFilter, DeploymentStatus, NewDeployment, Taxonomy, DEFAULT_HISTORY_LIMIT,
    DEFAULT_LIST_LIMIT,
};

pub use commands::run;

#[derive(Parser, Debug)]
#[command(
    name = "deployment-queue-cli",
    author,
    version,
    about = "CLI for the Deployment Queue API",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Authenticate with GitHub (device flow unless --pat is given)
    Login {
        /// GitHub organisation
        #[arg(short = 'o', long = "org")]
        organisation: String,

        /// GitHub personal access token (skips the device flow)
        #[arg(long)]
        pat: Option<String>,
    },

    /// Clear stored credentials
    Logout,

    /// Show current authentication status
    Whoami,

    /// Switch to a different organisation
    SwitchOrg {
        /// Organisation to switch to
        organisation: String,
    },

    /// List organisations available to the current token
    ListOrgs,

    /// Create a new deployment
    Create(CreateArgs),

    /// List deployments
    List(ListArgs),

    /// Get deployment details by ID
    Get {
        /// Deployment ID
        deployment_id: String,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Get the current deployment for a component
    Current {
        #[command(flatten)]
        taxonomy: TaxonomyArgs,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Show deployment history for a component
    History {
        #[command(flatten)]
        taxonomy: TaxonomyArgs,

        /// Max results
        #[arg(short = 'n', long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Update the status of a component's current deployment
    UpdateStatus {
        #[command(flatten)]
        taxonomy: TaxonomyArgs,

        /// New status (scheduled/in_progress/deployed/failed/skipped)
        new_status: DeploymentStatus,

        #[arg(long)]
        notes: Option<String>,

        /// Link to the pipeline run that performed the deployment
        #[arg(long)]
        deployment_uri: Option<String>,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Create a rollback deployment
    Rollback {
        #[command(flatten)]
        taxonomy: TaxonomyArgs,

        /// Target version (default: previous)
        #[arg(short = 'v', long = "version")]
        target_version: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,

        #[command(flatten)]
        api: ApiArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ApiArgs {
    /// Override the deployment API URL
    #[arg(long)]
    pub api_url: Option<String>,
}

/// Component name plus the placement that identifies one deployment slot
#[derive(Args, Debug, Clone)]
pub struct TaxonomyArgs {
    /// Component name
    pub name: String,

    #[arg(short = 'e', long = "env")]
    pub environment: String,

    /// Provider (gcp/aws/azure)
    #[arg(short = 'p', long)]
    pub provider: String,

    /// Cloud account ID
    #[arg(short = 'a', long = "account")]
    pub cloud_account_id: String,

    #[arg(short = 'r', long)]
    pub region: String,

    /// Cell ID
    #[arg(long = "cell")]
    pub cell_id: Option<String>,
}

impl From<TaxonomyArgs> for Taxonomy {
    fn from(args: TaxonomyArgs) -> Self {
        Taxonomy {
            name: args.name,
            environment: args.environment,
            provider: args.provider,
            cloud_account_id: args.cloud_account_id,
            region: args.region,
            cell_id: args.cell_id,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// Component name
    pub name: String,

    /// Version to deploy
    pub version: String,

    /// Deployment type (k8s/terraform/data_pipeline)
    #[arg(short = 'T', long = "type")]
    pub deployment_type: String,

    #[arg(short = 'e', long = "env")]
    pub environment: String,

    /// Provider (gcp/aws/azure)
    #[arg(short = 'p', long)]
    pub provider: String,

    /// Cloud account ID
    #[arg(short = 'a', long = "account")]
    pub cloud_account_id: Option<String>,

    #[arg(short = 'r', long)]
    pub region: Option<String>,

    /// Cell ID
    #[arg(long = "cell")]
    pub cell_id: Option<String>,

    /// Auto-deploy when ready
    #[arg(long, overrides_with = "no_auto")]
    pub auto: bool,

    /// Wait for a manual release
    #[arg(long, overrides_with = "auto")]
    pub no_auto: bool,

    #[arg(short = 'd', long)]
    pub description: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,

    /// Git commit SHA
    #[arg(long = "commit")]
    pub commit_sha: Option<String>,

    #[arg(long)]
    pub build_uri: Option<String>,

    /// Pipeline extra params (JSON string)
    #[arg(long = "pipeline-params")]
    pub pipeline_extra_params: Option<String>,

    #[command(flatten)]
    pub api: ApiArgs,
}

impl CreateArgs {
    pub fn to_request(&self) -> NewDeployment {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

        NewDeployment {
            environment: Some(self.environment.clone()),
            auto: !self.no_auto,
            cloud_account_id: non_empty(&self.cloud_account_id),
            region: non_empty(&self.region),
            cell: non_empty(&self.cell_id),
            description: non_empty(&self.description),
            notes: non_empty(&self.notes),
            commit_sha: non_empty(&self.commit_sha),
            build_uri: non_empty(&self.build_uri),
            pipeline_extra_params: non_empty(&self.pipeline_extra_params),
            ..NewDeployment::new(
                &self.name,
                &self.version,
                &self.deployment_type,
                &self.provider,
            )
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(short = 'e', long = "env")]
    pub environment: Option<String>,

    #[arg(short = 's', long)]
    pub status: Option<String>,

    #[arg(short = 'p', long)]
    pub provider: Option<String>,

    #[arg(short = 't', long)]
    pub trigger: Option<String>,

    /// Max results
    #[arg(short = 'n', long, default_value_t = DEFAULT_LIST_LIMIT)]
    pub limit: u32,

    #[command(flatten)]
    pub api: ApiArgs,
}

impl ListArgs {
    pub fn filter(&self) -> DeploymentFilter {
        DeploymentFilter {
            environment: self.environment.clone(),
            status: self.status.clone(),
            provider: self.provider.clone(),
            trigger: self.trigger.clone(),
            limit: self.limit,
        }
    }
}
