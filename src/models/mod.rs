// Data models for the deployment API

pub mod deployment;

pub use deployment::{
    Deployment, DeploymentFilter, DeploymentStatus, DeploymentUpdate, InvalidStatus,
    NewDeployment, Taxonomy, DEFAULT_HISTORY_LIMIT, DEFAULT_LIST_LIMIT,
};
