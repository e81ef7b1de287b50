// Deployment API client
// Authenticated JSON calls against the deployment queue service

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::auth::Credentials;
use crate::error::{ApiError, ApiResult};
use crate::models::{Deployment, DeploymentFilter, DeploymentUpdate, NewDeployment, Taxonomy};

/// Per-request timeout for deployment API calls
const REQUEST_TIMEOUT_SECS: u64 = 30;

const ORGANISATION_HEADER: &str = "X-Organisation";

const USER_AGENT: &str = concat!("deployment-queue-cli/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the deployment queue API
pub struct DeploymentClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Base URL without trailing slash
    base_url: String,

    /// `base_url` parsed once; endpoint paths are appended as segments
    endpoint_base: Url,

    credentials: Credentials,
}

impl DeploymentClient {
    /// Create a new client for `base_url` acting as `credentials`
    pub fn new(base_url: &str, credentials: Credentials) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let endpoint_base = Url::parse(&base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if endpoint_base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url));
        }

        Ok(Self {
            client,
            base_url,
            endpoint_base,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Endpoint URL; each segment is percent-encoded, so ids cannot add path
    /// components, queries or fragments
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.client
            .request(method, self.endpoint(segments))
            .bearer_auth(&self.credentials.token)
            .header(ORGANISATION_HEADER, &self.credentials.organisation)
            .header(header::CONTENT_TYPE, "application/json")
    }

    /// Send a request and decode the JSON body.
    ///
    /// Returns `Ok(None)` only when `absent_on_404` is set and the service
    /// answered 404.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        absent_on_404: bool,
    ) -> ApiResult<Option<T>> {
        let request = request.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(method = %method, url = %url, "Sending HTTP request");

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    error_kind = error_kind(&e),
                    error = %e,
                    url = %url,
                    "HTTP request error"
                );
                return Err(e.into());
            }
        };

        let status = response.status();
        tracing::debug!(status = %status, "Received HTTP response");

        if absent_on_404 && status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.text().await?;

        if status.is_client_error() || status.is_server_error() {
            tracing::warn!(
                status = status.as_u16(),
                url = %url,
                "HTTP request failed with error response"
            );
            return Err(ApiError::from_status(status, &body));
        }

        decode(status, &body).map(Some)
    }

    async fn send_required<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        self.send(request, false)
            .await?
            .ok_or_else(|| ApiError::InvalidResponse("empty response".to_string()))
    }

    // ==================================================================================================
    // Deployments
    // ==================================================================================================

    pub async fn list_deployments(&self, filter: &DeploymentFilter) -> ApiResult<Vec<Deployment>> {
        let request = self
            .request(Method::GET, &["v1", "deployments"])
            .query(&filter.query());
        self.send_required(request).await
    }

    pub async fn get_deployment(&self, id: &str) -> ApiResult<Deployment> {
        let request = self.request(Method::GET, &["v1", "deployments", id]);
        self.send_required(request).await
    }

    pub async fn create_deployment(&self, deployment: &NewDeployment) -> ApiResult<Deployment> {
        let request = self.request(Method::POST, &["v1", "deployments"]).json(deployment);
        self.send_required(request).await
    }

    pub async fn update_deployment(
        &self,
        id: &str,
        update: &DeploymentUpdate,
    ) -> ApiResult<Deployment> {
        let request = self
            .request(Method::PATCH, &["v1", "deployments", id])
            .json(update);
        self.send_required(request).await
    }

    /// Create a rollback of an existing deployment
    pub async fn rollback_by_id(
        &self,
        id: &str,
        target_version: Option<&str>,
    ) -> ApiResult<Deployment> {
        let mut request = self.request(Method::POST, &["v1", "deployments", id, "rollback"]);
        if let Some(version) = target_version.filter(|v| !v.is_empty()) {
            request = request.query(&[("target_version", version)]);
        }
        self.send_required(request).await
    }

    // ==================================================================================================
    // Taxonomy-based operations
    // ==================================================================================================

    /// Current deployment for a component, `None` if the service has none
    pub async fn get_current(&self, taxonomy: &Taxonomy) -> ApiResult<Option<Deployment>> {
        let request = self
            .request(Method::GET, &["v1", "deployments", "current"])
            .query(&taxonomy.query());
        self.send(request, true).await
    }

    pub async fn get_history(&self, taxonomy: &Taxonomy, limit: u32) -> ApiResult<Vec<Deployment>> {
        let mut query = taxonomy.query();
        query.push(("limit", limit.to_string()));

        let request = self
            .request(Method::GET, &["v1", "deployments", "history"])
            .query(&query);
        self.send_required(request).await
    }

    pub async fn update_status(
        &self,
        taxonomy: &Taxonomy,
        new_status: &str,
        notes: Option<&str>,
        deployment_uri: Option<&str>,
    ) -> ApiResult<Deployment> {
        let mut query = taxonomy.query();
        query.push(("new_status", new_status.to_string()));
        if let Some(notes) = notes.filter(|n| !n.is_empty()) {
            query.push(("notes", notes.to_string()));
        }
        if let Some(uri) = deployment_uri.filter(|u| !u.is_empty()) {
            query.push(("deployment_uri", uri.to_string()));
        }

        let request = self
            .request(Method::PATCH, &["v1", "deployments", "current", "status"])
            .query(&query);
        self.send_required(request).await
    }

    /// Create a rollback deployment for a component
    pub async fn rollback(
        &self,
        taxonomy: &Taxonomy,
        target_version: Option<&str>,
    ) -> ApiResult<Deployment> {
        let mut query = taxonomy.query();
        if let Some(version) = target_version.filter(|v| !v.is_empty()) {
            query.push(("target_version", version.to_string()));
        }

        let request = self
            .request(Method::POST, &["v1", "deployments", "rollback"])
            .query(&query);
        self.send_required(request).await
    }
}

/// 204 and empty bodies decode as an empty JSON object
fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> ApiResult<T> {
    let body = if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
        "{}"
    } else {
        body
    };
    serde_json::from_str(body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

fn error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection_failed"
    } else if e.is_request() {
        "request_error"
    } else if e.is_body() {
        "body_error"
    } else if e.is_decode() {
        "decode_error"
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeploymentStatus;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> DeploymentClient {
        DeploymentClient::new(
            &format!("{}/", server.url()),
            Credentials::new("ghp_test", "acme", "alice"),
        )
        .unwrap()
    }

    fn taxonomy() -> Taxonomy {
        Taxonomy {
            name: "api".into(),
            environment: "prod".into(),
            provider: "gcp".into(),
            cloud_account_id: "proj-1".into(),
            region: "europe-west1".into(),
            cell_id: None,
        }
    }

    const DEPLOYMENT: &str = r#"{
        "id": "d-1", "name": "api", "version": "1.2.3", "status": "scheduled",
        "trigger": "manual", "environment": "prod", "provider": "gcp",
        "created_at": "2024-05-01T10:20:30.123456Z"
    }"#;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = DeploymentClient::new(
            "https://deployments.example.com///",
            Credentials::new("t", "o", "u"),
        )
        .unwrap();
        assert_eq!(client.base_url(), "https://deployments.example.com");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = DeploymentClient::new("not a url", Credentials::new("t", "o", "u"))
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[test]
    fn test_base_url_path_prefix_kept() {
        let client = DeploymentClient::new(
            "https://gateway.example.com/queue/",
            Credentials::new("t", "o", "u"),
        )
        .unwrap();
        assert_eq!(
            client.endpoint(&["v1", "deployments", "d-1"]).as_str(),
            "https://gateway.example.com/queue/v1/deployments/d-1"
        );
    }

    #[tokio::test]
    async fn test_deployment_id_is_one_path_segment() {
        let mut server = mockito::Server::new_async().await;
        let escaped = server
            .mock("GET", "/v1/deployments/..%2Fcurrent%3Fname=x%23frag")
            .with_body(DEPLOYMENT)
            .create_async()
            .await;

        client(&server)
            .get_deployment("../current?name=x#frag")
            .await
            .unwrap();
        escaped.assert_async().await;
    }

    #[tokio::test]
    async fn test_requests_carry_auth_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/deployments/d-1")
            .match_header("authorization", "Bearer ghp_test")
            .match_header("x-organisation", "acme")
            .match_header("content-type", "application/json")
            .with_body(DEPLOYMENT)
            .create_async()
            .await;

        let deployment = client(&server).get_deployment("d-1").await.unwrap();
        assert_eq!(deployment.version, "1.2.3");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_deployments_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/deployments")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "5".into()),
                Matcher::UrlEncoded("provider".into(), "aws".into()),
            ]))
            .with_body(format!("[{}]", DEPLOYMENT))
            .create_async()
            .await;

        let filter = DeploymentFilter {
            provider: Some("aws".into()),
            limit: 5,
            ..Default::default()
        };
        let deployments = client(&server).list_deployments(&filter).await.unwrap();
        assert_eq!(deployments.len(), 1);
        assert_eq!(deployments[0].id, "d-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_sends_json_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/deployments")
            .match_body(Matcher::Json(serde_json::json!({
                "name": "api",
                "version": "1.2.3",
                "type": "k8s",
                "provider": "gcp",
                "auto": false,
            })))
            .with_status(201)
            .with_body(DEPLOYMENT)
            .create_async()
            .await;

        let mut new = NewDeployment::new("api", "1.2.3", "k8s", "gcp");
        new.auto = false;
        let created = client(&server).create_deployment(&new).await.unwrap();
        assert_eq!(created.status, "scheduled");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_deployment_patch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/v1/deployments/d-1")
            .match_body(Matcher::Json(serde_json::json!({ "status": "in_progress" })))
            .with_body(DEPLOYMENT.replace("scheduled", "in_progress"))
            .create_async()
            .await;

        let updated = client(&server)
            .update_deployment("d-1", &DeploymentUpdate::status(DeploymentStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(updated.status, "in_progress");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_current_404_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/deployments/current")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"detail":"No deployment"}"#)
            .create_async()
            .await;

        let current = client(&server).get_current(&taxonomy()).await.unwrap();
        assert_eq!(current, None);
    }

    #[tokio::test]
    async fn test_get_404_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/deployments/missing")
            .with_status(404)
            .with_body(r#"{"detail":"Deployment not found"}"#)
            .create_async()
            .await;

        let err = client(&server).get_deployment("missing").await.unwrap_err();
        match err {
            ApiError::Status { status, detail } => {
                assert_eq!(status, 404);
                assert_eq!(detail, "Deployment not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_without_detail_uses_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/deployments/d-1")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let err = client(&server).get_deployment("d-1").await.unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[tokio::test]
    async fn test_no_content_decodes_empty_object() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", "/v1/deployments/d-1")
            .with_status(204)
            .create_async()
            .await;

        let updated = client(&server)
            .update_deployment("d-1", &DeploymentUpdate::default())
            .await
            .unwrap();
        assert_eq!(updated, Deployment::default());
    }

    #[tokio::test]
    async fn test_history_query_includes_limit_and_cell() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/deployments/history")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("name".into(), "api".into()),
                Matcher::UrlEncoded("cloud_account_id".into(), "proj-1".into()),
                Matcher::UrlEncoded("cell_id".into(), "c-1".into()),
                Matcher::UrlEncoded("limit".into(), "10".into()),
            ]))
            .with_body("[]")
            .create_async()
            .await;

        let mut taxonomy = taxonomy();
        taxonomy.cell_id = Some("c-1".into());
        let history = client(&server).get_history(&taxonomy, 10).await.unwrap();
        assert!(history.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_status_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/v1/deployments/current/status")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("new_status".into(), "deployed".into()),
                Matcher::UrlEncoded("notes".into(), "done".into()),
                Matcher::UrlEncoded("region".into(), "europe-west1".into()),
            ]))
            .with_body(DEPLOYMENT.replace("scheduled", "deployed"))
            .create_async()
            .await;

        let d = client(&server)
            .update_status(&taxonomy(), "deployed", Some("done"), None)
            .await
            .unwrap();
        assert_eq!(d.status, "deployed");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rollback_variants() {
        let mut server = mockito::Server::new_async().await;
        let by_taxonomy = server
            .mock("POST", "/v1/deployments/rollback")
            .match_query(Matcher::UrlEncoded("target_version".into(), "1.0.0".into()))
            .with_body(DEPLOYMENT)
            .create_async()
            .await;
        let by_id = server
            .mock("POST", "/v1/deployments/d-1/rollback")
            .with_body(DEPLOYMENT)
            .create_async()
            .await;

        let client = client(&server);
        client.rollback(&taxonomy(), Some("1.0.0")).await.unwrap();
        client.rollback_by_id("d-1", None).await.unwrap();

        by_taxonomy.assert_async().await;
        by_id.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_json_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/deployments")
            .match_query(Matcher::Any)
            .with_body("not json")
            .create_async()
            .await;

        let err = client(&server)
            .list_deployments(&DeploymentFilter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }
}
