// MCP tools
// Deployment operations exposed to agents, rendered as plain text

use serde_json::{json, Map, Value};
use thiserror::Error;

use super::protocol::{CallToolResult, Tool};
use crate::auth;
use crate::config::Settings;
use crate::error::{ApiError, AuthError};
use crate::http_client::DeploymentClient;
use crate::models::{
    Deployment, DeploymentFilter, DeploymentStatus, DeploymentUpdate, InvalidStatus,
    NewDeployment, DEFAULT_LIST_LIMIT,
};

const NOT_AVAILABLE: &str = "N/A";

/// Why a tool call produced no result
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatus),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{}", api_message(.0))]
    Api(#[from] ApiError),
}

fn api_message(err: &ApiError) -> String {
    match err {
        ApiError::Status { status, detail } => format!("API error ({}): {}", status, detail),
        other => format!("Error: {}", other),
    }
}

/// The six tools, in the order `tools/list` reports them
pub fn definitions() -> Vec<Tool> {
    let deployment_id = json!({ "type": "string", "description": "Deployment ID" });
    let statuses: Vec<&str> = DeploymentStatus::ALL.iter().map(|s| s.as_str()).collect();

    vec![
        Tool {
            name: "list_deployments",
            description: "List deployments with optional filters",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "status": { "type": "string", "description": "Filter by status" },
                    "provider": { "type": "string", "description": "Filter by provider (gcp/aws/azure)" },
                    "trigger": { "type": "string", "description": "Filter by trigger (auto/manual/rollback)" },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results (default: 20)",
                        "default": DEFAULT_LIST_LIMIT
                    }
                }
            }),
        },
        Tool {
            name: "create_deployment",
            description: "Create a new deployment",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Component name" },
                    "version": { "type": "string", "description": "Version to deploy" },
                    "type": { "type": "string", "description": "Deployment type (k8s/terraform/data_pipeline)" },
                    "provider": { "type": "string", "description": "Provider (gcp/aws/azure)" },
                    "cloud_account_id": { "type": "string", "description": "Cloud account ID" },
                    "region": { "type": "string", "description": "Cloud region" },
                    "cell": { "type": "string", "description": "Cell ID" },
                    "auto": {
                        "type": "boolean",
                        "description": "Auto-deploy when ready (default: true)",
                        "default": true
                    },
                    "description": { "type": "string", "description": "Deployment description" },
                    "notes": { "type": "string", "description": "Deployment notes" },
                    "commit_sha": { "type": "string", "description": "Git commit SHA" },
                    "build_uri": { "type": "string", "description": "Build URI" },
                    "pipeline_extra_params": { "type": "string", "description": "Pipeline extra params (JSON string)" }
                },
                "required": ["name", "version", "type", "provider"]
            }),
        },
        Tool {
            name: "get_deployment",
            description: "Get a deployment by ID",
            input_schema: json!({
                "type": "object",
                "properties": { "deployment_id": deployment_id.clone() },
                "required": ["deployment_id"]
            }),
        },
        Tool {
            name: "release_deployment",
            description: "Release a deployment (set status to in_progress)",
            input_schema: json!({
                "type": "object",
                "properties": { "deployment_id": deployment_id.clone() },
                "required": ["deployment_id"]
            }),
        },
        Tool {
            name: "update_deployment_status",
            description: "Update deployment status",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "deployment_id": deployment_id,
                    "status": {
                        "type": "string",
                        "description": "New status",
                        "enum": statuses
                    }
                },
                "required": ["deployment_id", "status"]
            }),
        },
        Tool {
            name: "rollback_deployment",
            description: "Create a rollback deployment from an existing deployment ID",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "deployment_id": { "type": "string", "description": "Deployment ID to rollback" },
                    "target_version": {
                        "type": "string",
                        "description": "Target version to rollback to (default: previous)"
                    }
                },
                "required": ["deployment_id"]
            }),
        },
    ]
}

/// Dispatches tool calls against the deployment API.
///
/// Credentials are resolved on every call so a `login` in another terminal
/// takes effect without restarting the server.
pub struct ToolRouter {
    settings: Settings,
}

impl ToolRouter {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Run a tool. Failures become error text, never protocol errors.
    pub async fn call(&self, name: &str, arguments: &Map<String, Value>) -> CallToolResult {
        tracing::info!(tool = name, "Tool call");

        match self.dispatch(name, arguments).await {
            Ok(text) => CallToolResult::text(text, false),
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "Tool call failed");
                CallToolResult::text(e.to_string(), true)
            }
        }
    }

    async fn dispatch(&self, name: &str, args: &Map<String, Value>) -> Result<String, ToolError> {
        match name {
            "list_deployments" => self.list_deployments(args).await,
            "create_deployment" => self.create_deployment(args).await,
            "get_deployment" => self.get_deployment(args).await,
            "release_deployment" => self.release_deployment(args).await,
            "update_deployment_status" => self.update_deployment_status(args).await,
            "rollback_deployment" => self.rollback_deployment(args).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    fn client(&self) -> Result<DeploymentClient, ToolError> {
        let creds = auth::resolve(&self.settings).ok_or(AuthError::NotAuthenticated)?;
        Ok(DeploymentClient::new(&self.settings.api_url, creds)?)
    }

    async fn list_deployments(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let filter = DeploymentFilter {
            environment: None,
            status: optional_str(args, "status"),
            provider: optional_str(args, "provider"),
            trigger: optional_str(args, "trigger"),
            limit: args
                .get("limit")
                .and_then(Value::as_u64)
                .and_then(|l| u32::try_from(l).ok())
                .unwrap_or(DEFAULT_LIST_LIMIT),
        };

        let deployments = self.client()?.list_deployments(&filter).await?;
        if deployments.is_empty() {
            return Ok("No deployments found".to_string());
        }

        let mut lines = vec!["Deployments:".to_string()];
        lines.extend(deployments.iter().map(|d| {
            format!(
                "- {}: {} @ {} [{}] ({})",
                d.id,
                d.name,
                d.version,
                d.status,
                or_na(d.provider.as_deref())
            )
        }));
        Ok(lines.join("\n"))
    }

    async fn create_deployment(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let mut request = NewDeployment::new(
            required_str(args, "name")?,
            required_str(args, "version")?,
            required_str(args, "type")?,
            required_str(args, "provider")?,
        );
        request.auto = args.get("auto").and_then(Value::as_bool).unwrap_or(true);
        request.cloud_account_id = optional_str(args, "cloud_account_id");
        request.region = optional_str(args, "region");
        request.cell = optional_str(args, "cell");
        request.description = optional_str(args, "description");
        request.notes = optional_str(args, "notes");
        request.commit_sha = optional_str(args, "commit_sha");
        request.build_uri = optional_str(args, "build_uri");
        request.pipeline_extra_params = optional_str(args, "pipeline_extra_params");

        let d = self.client()?.create_deployment(&request).await?;
        Ok(status_summary("Created deployment", &d))
    }

    async fn get_deployment(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let id = required_str(args, "deployment_id")?;
        let d = self.client()?.get_deployment(&id).await?;

        let lines = [
            "Deployment Details:".to_string(),
            format!("  ID: {}", d.id),
            format!("  Name: {}", d.name),
            format!("  Version: {}", d.version),
            format!("  Status: {}", d.status),
            format!("  Type: {}", or_na(d.deployment_type.as_deref())),
            format!("  Provider: {}", or_na(d.provider.as_deref())),
            format!("  Region: {}", or_na(d.region.as_deref())),
            format!("  Cloud Account: {}", or_na(d.cloud_account_id.as_deref())),
            format!("  Cell: {}", or_na(d.cell())),
            format!("  Created: {}", or_na(d.created_at.as_deref())),
        ];
        Ok(lines.join("\n"))
    }

    /// Fetch first so an unknown ID fails with the service's 404 detail
    async fn release_deployment(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let id = required_str(args, "deployment_id")?;
        let client = self.client()?;

        client.get_deployment(&id).await?;
        let d = client
            .update_deployment(&id, &DeploymentUpdate::status(DeploymentStatus::InProgress))
            .await?;
        Ok(status_summary("Released deployment", &d))
    }

    async fn update_deployment_status(
        &self,
        args: &Map<String, Value>,
    ) -> Result<String, ToolError> {
        let id = required_str(args, "deployment_id")?;
        let status: DeploymentStatus = required_str(args, "status")?.parse()?;

        let d = self
            .client()?
            .update_deployment(&id, &DeploymentUpdate::status(status))
            .await?;
        Ok(status_summary("Updated deployment", &d))
    }

    async fn rollback_deployment(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let id = required_str(args, "deployment_id")?;
        let target_version = optional_str(args, "target_version");

        let d = self
            .client()?
            .rollback_by_id(&id, target_version.as_deref())
            .await?;
        Ok([
            format!("Rollback created: {} -> {}", d.name, d.version),
            format!("ID: {}", d.id),
            format!("Source: {}", or_na(d.source_deployment_id.as_deref())),
            format!(
                "Rollback from: {}",
                or_na(d.rollback_from_deployment_id.as_deref())
            ),
        ]
        .join("\n"))
    }
}

fn status_summary(action: &str, d: &Deployment) -> String {
    format!(
        "{}: {} @ {}\nID: {}\nStatus: {}",
        action, d.name, d.version, d.id, d.status
    )
}

fn required_str(args: &Map<String, Value>, key: &'static str) -> Result<String, ToolError> {
    optional_str(args, key).ok_or(ToolError::MissingArgument(key))
}

/// Missing, null, non-string and empty values all count as absent
fn optional_str(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(NOT_AVAILABLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialStore, Credentials};
    use mockito::Matcher;
    use tempfile::TempDir;

    const DEPLOYMENT: &str = r#"{
        "id": "d-1", "name": "api", "version": "1.2.3", "status": "scheduled",
        "trigger": "manual", "type": "k8s", "provider": "gcp"
    }"#;

    fn router(dir: &TempDir, api_url: &str, logged_in: bool) -> ToolRouter {
        let path = dir.path().join("credentials.json");
        if logged_in {
            CredentialStore::new(&path)
                .save(&Credentials::new("ghp_x", "acme", "alice"))
                .unwrap();
        }
        ToolRouter::new(
            Settings::from_lookup(|_| None)
                .with_default_credentials_file(path)
                .with_api_url(api_url),
        )
    }

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("arguments must be an object"),
        }
    }

    fn text(result: &CallToolResult) -> &str {
        &result.content[0].text
    }

    #[test]
    fn test_definitions() {
        let tools = definitions();
        let names: Vec<_> = tools.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "list_deployments",
                "create_deployment",
                "get_deployment",
                "release_deployment",
                "update_deployment_status",
                "rollback_deployment",
            ]
        );
        assert_eq!(
            tools[1].input_schema["required"],
            json!(["name", "version", "type", "provider"])
        );
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let dir = TempDir::new().unwrap();
        let result = router(&dir, "http://127.0.0.1:9", true)
            .call("deploy_everything", &Map::new())
            .await;
        assert!(result.is_error);
        assert_eq!(text(&result), "Unknown tool: deploy_everything");
    }

    #[tokio::test]
    async fn test_not_authenticated() {
        let dir = TempDir::new().unwrap();
        let result = router(&dir, "http://127.0.0.1:9", false)
            .call("list_deployments", &Map::new())
            .await;
        assert!(result.is_error);
        assert_eq!(
            text(&result),
            "Not authenticated. Run 'deployment-queue-cli login' first."
        );
    }

    #[tokio::test]
    async fn test_invalid_status_rejected_before_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let result = router(&dir, &server.url(), true)
            .call(
                "update_deployment_status",
                &args(json!({ "deployment_id": "d-1", "status": "done" })),
            )
            .await;

        assert!(result.is_error);
        assert_eq!(
            text(&result),
            "Invalid status: done. Valid: scheduled, in_progress, deployed, failed, skipped"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_requires_fields() {
        let dir = TempDir::new().unwrap();
        let result = router(&dir, "http://127.0.0.1:9", true)
            .call(
                "create_deployment",
                &args(json!({ "name": "api", "version": "1.0", "type": "k8s" })),
            )
            .await;
        assert_eq!(text(&result), "Missing required argument: provider");
    }

    #[tokio::test]
    async fn test_create_defaults_auto_true() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/deployments")
            .match_header("x-organisation", "acme")
            .match_body(Matcher::Json(json!({
                "name": "api",
                "version": "1.2.3",
                "type": "k8s",
                "provider": "gcp",
                "auto": true,
                "region": "europe-west1"
            })))
            .with_status(201)
            .with_body(DEPLOYMENT)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let result = router(&dir, &server.url(), true)
            .call(
                "create_deployment",
                &args(json!({
                    "name": "api",
                    "version": "1.2.3",
                    "type": "k8s",
                    "provider": "gcp",
                    "region": "europe-west1",
                    "notes": ""
                })),
            )
            .await;

        assert!(!result.is_error);
        assert_eq!(
            text(&result),
            "Created deployment: api @ 1.2.3\nID: d-1\nStatus: scheduled"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_deployments_format() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/deployments")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "3".into()),
                Matcher::UrlEncoded("status".into(), "failed".into()),
            ]))
            .with_body(
                r#"[{"id":"d-1","name":"api","version":"1.0","status":"failed","provider":"aws"},
                    {"id":"d-2","name":"web","version":"2.0","status":"failed"}]"#,
            )
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let result = router(&dir, &server.url(), true)
            .call("list_deployments", &args(json!({ "status": "failed", "limit": 3 })))
            .await;

        assert_eq!(
            text(&result),
            "Deployments:\n- d-1: api @ 1.0 [failed] (aws)\n- d-2: web @ 2.0 [failed] (N/A)"
        );
    }

    #[tokio::test]
    async fn test_list_deployments_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/deployments")
            .match_query(Matcher::Any)
            .with_body("[]")
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let result = router(&dir, &server.url(), true)
            .call("list_deployments", &Map::new())
            .await;
        assert_eq!(text(&result), "No deployments found");
    }

    #[tokio::test]
    async fn test_release_sets_in_progress() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/deployments/d-1")
            .with_body(DEPLOYMENT)
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", "/v1/deployments/d-1")
            .match_body(Matcher::Json(json!({ "status": "in_progress" })))
            .with_body(DEPLOYMENT.replace("scheduled", "in_progress"))
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let result = router(&dir, &server.url(), true)
            .call("release_deployment", &args(json!({ "deployment_id": "d-1" })))
            .await;

        assert_eq!(
            text(&result),
            "Released deployment: api @ 1.2.3\nID: d-1\nStatus: in_progress"
        );
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/deployments/missing")
            .with_status(404)
            .with_body(r#"{"detail":"Deployment not found"}"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let result = router(&dir, &server.url(), true)
            .call("get_deployment", &args(json!({ "deployment_id": "missing" })))
            .await;

        assert!(result.is_error);
        assert_eq!(text(&result), "API error (404): Deployment not found");
    }

    #[tokio::test]
    async fn test_rollback_by_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/deployments/d-1/rollback")
            .match_query(Matcher::UrlEncoded("target_version".into(), "1.0.0".into()))
            .with_body(
                r#"{"id":"d-9","name":"api","version":"1.0.0","status":"scheduled",
                    "trigger":"rollback","source_deployment_id":"d-0","rollback_from_deployment_id":"d-1"}"#,
            )
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let result = router(&dir, &server.url(), true)
            .call(
                "rollback_deployment",
                &args(json!({ "deployment_id": "d-1", "target_version": "1.0.0" })),
            )
            .await;

        assert_eq!(
            text(&result),
            "Rollback created: api -> 1.0.0\nID: d-9\nSource: d-0\nRollback from: d-1"
        );
        mock.assert_async().await;
    }
}
