use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    BoundingBox2D, NewProject, PlotData, ProjectDict, ProjectId, ProjectListOptions,
    ProjectListing, ProjectUpdate, ProvenanceEntry, ResultDescriptor, SessionToken,
    SpatialReference, SpatialReferenceSpecification, TimeInterval, Workflow, WorkflowId,
};
use crate::models::workflow::SpatialResolution;

/// Spatio-temporal query for computing plot data
#[derive(Debug, Clone, PartialEq)]
pub struct PlotQuery {
    pub bbox: BoundingBox2D,
    pub spatial_reference: SpatialReference,
    pub time: TimeInterval,
    pub spatial_resolution: SpatialResolution,
}

impl PlotQuery {
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("bbox", self.bbox.as_bbox_string()),
            ("crs", self.spatial_reference.srs_string()),
            ("time", self.time.as_request_string()),
            (
                "spatialResolution",
                format!("{},{}", self.spatial_resolution.x, self.spatial_resolution.y),
            ),
        ]
    }
}

/// Port for the remote workflow backend
///
/// Every call is authorized by the given session token.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Create a project and return its id
    async fn create_project(&self, project: &NewProject, token: &SessionToken)
        -> Result<ProjectId>;

    /// Apply a partial update to a stored project
    async fn update_project(&self, update: &ProjectUpdate, token: &SessionToken) -> Result<()>;

    /// Load the latest version of a project
    async fn load_project(&self, id: ProjectId, token: &SessionToken) -> Result<ProjectDict>;

    /// List projects visible to the session
    async fn list_projects(
        &self,
        options: &ProjectListOptions,
        token: &SessionToken,
    ) -> Result<Vec<ProjectListing>>;

    async fn delete_project(&self, id: ProjectId, token: &SessionToken) -> Result<()>;

    /// Remember the project as the session's current project
    async fn set_session_project(&self, id: ProjectId, token: &SessionToken) -> Result<()>;

    async fn register_workflow(&self, workflow: &Workflow, token: &SessionToken)
        -> Result<WorkflowId>;

    async fn get_workflow(&self, id: WorkflowId, token: &SessionToken) -> Result<Workflow>;

    async fn get_workflow_metadata(
        &self,
        id: WorkflowId,
        token: &SessionToken,
    ) -> Result<ResultDescriptor>;

    async fn get_workflow_provenance(
        &self,
        id: WorkflowId,
        token: &SessionToken,
    ) -> Result<Vec<ProvenanceEntry>>;

    /// Compute the data of a plot workflow
    async fn get_plot_data(
        &self,
        id: WorkflowId,
        query: &PlotQuery,
        token: &SessionToken,
    ) -> Result<PlotData>;

    async fn get_spatial_reference_specification(
        &self,
        spatial_reference: &SpatialReference,
        token: &SessionToken,
    ) -> Result<SpatialReferenceSpecification>;
}
