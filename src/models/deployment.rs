use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ==================================================================================================
// Status
// ==================================================================================================

/// Lifecycle status of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Scheduled,
    InProgress,
    Deployed,
    Failed,
    Skipped,
}

impl DeploymentStatus {
    pub const ALL: [DeploymentStatus; 5] = [
        DeploymentStatus::Scheduled,
        DeploymentStatus::InProgress,
        DeploymentStatus::Deployed,
        DeploymentStatus::Failed,
        DeploymentStatus::Skipped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentStatus::Scheduled => "scheduled",
            DeploymentStatus::InProgress => "in_progress",
            DeploymentStatus::Deployed => "deployed",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Skipped => "skipped",
        }
    }

    /// Comma separated list of accepted values
    pub fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid status: {0}. Valid: {valid}", valid = DeploymentStatus::valid_values())]
pub struct InvalidStatus(pub String);

impl FromStr for DeploymentStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvalidStatus(s.to_string()))
    }
}

// ==================================================================================================
// Response Models
// ==================================================================================================

/// A deployment as returned by the service.
///
/// Status and trigger stay plain strings so that values added server-side
/// still render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deployment {
    pub id: String,
    pub name: String,
    pub version: String,
    pub status: String,
    pub trigger: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub deployment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_deployment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_from_deployment_id: Option<String>,
}

impl Deployment {
    /// The service has used both `cell` and `cell_id`
    pub fn cell(&self) -> Option<&str> {
        self.cell
            .as_deref()
            .filter(|c| !c.is_empty())
            .or(self.cell_id.as_deref().filter(|c| !c.is_empty()))
    }

    pub fn is_rollback(&self) -> bool {
        self.trigger == "rollback"
    }
}

// ==================================================================================================
// Request Models
// ==================================================================================================

/// Body of `POST /v1/deployments`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDeployment {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub deployment_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub provider: String,
    pub auto: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_extra_params: Option<String>,
}

impl NewDeployment {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        deployment_type: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            deployment_type: deployment_type.into(),
            environment: None,
            provider: provider.into(),
            auto: true,
            cloud_account_id: None,
            region: None,
            cell: None,
            description: None,
            notes: None,
            commit_sha: None,
            build_uri: None,
            pipeline_extra_params: None,
        }
    }
}

/// Body of `PATCH /v1/deployments/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeploymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DeploymentUpdate {
    pub fn status(status: DeploymentStatus) -> Self {
        Self {
            status: Some(status),
            notes: None,
        }
    }
}

// ==================================================================================================
// Query Models
// ==================================================================================================

pub const DEFAULT_LIST_LIMIT: u32 = 20;
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

/// Filters for `GET /v1/deployments`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentFilter {
    pub environment: Option<String>,
    pub status: Option<String>,
    pub provider: Option<String>,
    pub trigger: Option<String>,
    pub limit: u32,
}

impl Default for DeploymentFilter {
    fn default() -> Self {
        Self {
            environment: None,
            status: None,
            provider: None,
            trigger: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl DeploymentFilter {
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("limit", self.limit.to_string())];
        let optional = [
            ("environment", &self.environment),
            ("status", &self.status),
            ("provider", &self.provider),
            ("trigger", &self.trigger),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                query.push((key, value.to_string()));
            }
        }
        query
    }
}

/// Identifies one deployable component in one place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    pub name: String,
    pub environment: String,
    pub provider: String,
    pub cloud_account_id: String,
    pub region: String,
    pub cell_id: Option<String>,
}

impl Taxonomy {
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("name", self.name.clone()),
            ("environment", self.environment.clone()),
            ("provider", self.provider.clone()),
            ("cloud_account_id", self.cloud_account_id.clone()),
            ("region", self.region.clone()),
        ];
        if let Some(cell) = self.cell_id.as_deref().filter(|c| !c.is_empty()) {
            query.push(("cell_id", cell.to_string()));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(
            "in_progress".parse::<DeploymentStatus>().unwrap(),
            DeploymentStatus::InProgress
        );
        let err = "done".parse::<DeploymentStatus>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status: done. Valid: scheduled, in_progress, deployed, failed, skipped"
        );
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let update = DeploymentUpdate::status(DeploymentStatus::InProgress);
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "status": "in_progress" })
        );
    }

    #[test]
    fn test_deployment_tolerates_missing_fields() {
        let d: Deployment =
            serde_json::from_str(r#"{"id":"d1","name":"api","version":"1.0","status":"deployed"}"#)
                .unwrap();
        assert_eq!(d.id, "d1");
        assert_eq!(d.trigger, "");
        assert_eq!(d.provider, None);
        assert_eq!(d.cell(), None);
    }

    #[test]
    fn test_cell_falls_back_to_cell_id() {
        let d: Deployment = serde_json::from_str(r#"{"cell":"","cell_id":"c-2"}"#).unwrap();
        assert_eq!(d.cell(), Some("c-2"));
    }

    #[test]
    fn test_new_deployment_omits_unset_fields() {
        let mut new = NewDeployment::new("api", "1.2.3", "k8s", "gcp");
        new.region = Some("europe-west1".into());

        let json = serde_json::to_value(&new).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "api",
                "version": "1.2.3",
                "type": "k8s",
                "provider": "gcp",
                "auto": true,
                "region": "europe-west1",
            })
        );
    }

    #[test]
    fn test_filter_query() {
        let filter = DeploymentFilter {
            status: Some("failed".into()),
            trigger: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(
            filter.query(),
            vec![("limit", "20".to_string()), ("status", "failed".to_string())]
        );
    }

    #[test]
    fn test_taxonomy_query_cell_optional() {
        let mut taxonomy = Taxonomy {
            name: "api".into(),
            environment: "prod".into(),
            provider: "aws".into(),
            cloud_account_id: "123".into(),
            region: "us-east-1".into(),
            cell_id: None,
        };
        assert_eq!(taxonomy.query().len(), 5);

        taxonomy.cell_id = Some("cell-1".into());
        assert_eq!(
            taxonomy.query().last(),
            Some(&("cell_id", "cell-1".to_string()))
        );
    }
}
