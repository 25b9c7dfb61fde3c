use async_trait::async_trait;
use geoweave_core::error::{GeoweaveError, Result};
use geoweave_core::models::{
    NewProject, PlotData, ProjectDict, ProjectId, ProjectListOptions, ProjectListing,
    ProjectUpdate, ProvenanceEntry, ResultDescriptor, SessionToken, SpatialReference,
    SpatialReferenceSpecification, Workflow, WorkflowId,
};
use geoweave_core::ports::{Backend, PlotQuery};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// Backend reached over HTTP, every request authorized with the session's bearer token
pub struct HttpBackend {
    /// Base URL of the REST API (e.g., "http://localhost:3030/api")
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn url_with_query(
        &self,
        operation: &str,
        path: &str,
        pairs: &[(&'static str, String)],
    ) -> Result<Url> {
        Url::parse_with_params(&self.url(path), pairs)
            .map_err(|e| GeoweaveError::backend(operation, format!("Invalid request URL: {}", e)))
    }

    async fn send(
        &self,
        operation: &str,
        request: RequestBuilder,
        token: &SessionToken,
    ) -> Result<reqwest::Response> {
        debug!(operation, "Sending backend request");
        let response = request
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| {
                GeoweaveError::backend(
                    operation,
                    format!("Failed to connect to the backend: {}", e),
                )
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(operation, status, &body))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
        token: &SessionToken,
    ) -> Result<T> {
        self.send(operation, request, token)
            .await?
            .json()
            .await
            .map_err(|e| {
                GeoweaveError::backend(
                    operation,
                    format!("Failed to parse backend response: {}", e),
                )
            })
    }
}

/// Map an unsuccessful response to an error
fn status_error(operation: &str, status: StatusCode, body: &str) -> GeoweaveError {
    if status == StatusCode::UNAUTHORIZED {
        return GeoweaveError::Unauthorized {
            operation: operation.to_string(),
        };
    }

    let message = error_message(body).unwrap_or_else(|| body.trim().to_string());
    if message.is_empty() {
        GeoweaveError::backend(operation, format!("Backend API error ({})", status))
    } else {
        GeoweaveError::backend(operation, format!("Backend API error ({}): {}", status, message))
    }
}

/// The backend reports failures as `{"error": ..., "message": ...}`
fn error_message(body: &str) -> Option<String> {
    let error: ErrorResponse = serde_json::from_str(body).ok()?;
    match (error.error, error.message) {
        (Some(error), Some(message)) => Some(format!("{}: {}", error, message)),
        (Some(text), None) | (None, Some(text)) => Some(text),
        (None, None) => None,
    }
}

/// Response body for error responses
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    message: Option<String>,
}

/// Response body for requests that create a resource
#[derive(Debug, Deserialize)]
struct IdResponse<T> {
    id: T,
}

#[async_trait]
impl Backend for HttpBackend {
    async fn create_project(
        &self,
        project: &NewProject,
        token: &SessionToken,
    ) -> Result<ProjectId> {
        let request = self.client.post(self.url("/project")).json(project);
        let response: IdResponse<ProjectId> =
            self.send_json("create_project", request, token).await?;
        Ok(response.id)
    }

    async fn update_project(&self, update: &ProjectUpdate, token: &SessionToken) -> Result<()> {
        let request = self
            .client
            .patch(self.url(&format!("/project/{}", update.id)))
            .json(update);
        self.send("update_project", request, token).await?;
        Ok(())
    }

    async fn load_project(&self, id: ProjectId, token: &SessionToken) -> Result<ProjectDict> {
        let request = self.client.get(self.url(&format!("/project/{}", id)));
        self.send_json("load_project", request, token).await
    }

    async fn list_projects(
        &self,
        options: &ProjectListOptions,
        token: &SessionToken,
    ) -> Result<Vec<ProjectListing>> {
        let url = self.url_with_query("list_projects", "/projects", &options.to_query_pairs())?;
        self.send_json("list_projects", self.client.get(url), token)
            .await
    }

    async fn delete_project(&self, id: ProjectId, token: &SessionToken) -> Result<()> {
        let request = self.client.delete(self.url(&format!("/project/{}", id)));
        self.send("delete_project", request, token).await?;
        Ok(())
    }

    async fn set_session_project(&self, id: ProjectId, token: &SessionToken) -> Result<()> {
        let request = self
            .client
            .post(self.url(&format!("/session/project/{}", id)));
        self.send("set_session_project", request, token).await?;
        Ok(())
    }

    async fn register_workflow(
        &self,
        workflow: &Workflow,
        token: &SessionToken,
    ) -> Result<WorkflowId> {
        let request = self.client.post(self.url("/workflow")).json(workflow);
        let response: IdResponse<WorkflowId> =
            self.send_json("register_workflow", request, token).await?;
        Ok(response.id)
    }

    async fn get_workflow(&self, id: WorkflowId, token: &SessionToken) -> Result<Workflow> {
        let request = self.client.get(self.url(&format!("/workflow/{}", id)));
        self.send_json("get_workflow", request, token).await
    }

    async fn get_workflow_metadata(
        &self,
        id: WorkflowId,
        token: &SessionToken,
    ) -> Result<ResultDescriptor> {
        let request = self
            .client
            .get(self.url(&format!("/workflow/{}/metadata", id)));
        self.send_json("get_workflow_metadata", request, token)
            .await
    }

    async fn get_workflow_provenance(
        &self,
        id: WorkflowId,
        token: &SessionToken,
    ) -> Result<Vec<ProvenanceEntry>> {
        let request = self
            .client
            .get(self.url(&format!("/workflow/{}/provenance", id)));
        self.send_json("get_workflow_provenance", request, token)
            .await
    }

    async fn get_plot_data(
        &self,
        id: WorkflowId,
        query: &PlotQuery,
        token: &SessionToken,
    ) -> Result<PlotData> {
        let url = self.url_with_query(
            "get_plot_data",
            &format!("/plot/{}", id),
            &query.to_query_pairs(),
        )?;
        self.send_json("get_plot_data", self.client.get(url), token)
            .await
    }

    async fn get_spatial_reference_specification(
        &self,
        spatial_reference: &SpatialReference,
        token: &SessionToken,
    ) -> Result<SpatialReferenceSpecification> {
        let request = self.client.get(self.url(&format!(
            "/spatialReferenceSpecification/{}",
            spatial_reference.srs_string()
        )));
        self.send_json("get_spatial_reference_specification", request, token)
            .await
    }
}
