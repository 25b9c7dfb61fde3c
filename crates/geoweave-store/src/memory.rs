//! In-memory backend and storage implementations for development and testing.

use async_trait::async_trait;
use geoweave_core::error::{GeoweaveError, Result};
use geoweave_core::models::{
    NewProject, PlotData, ProjectDict, ProjectId, ProjectListOptions, ProjectListing,
    ProjectOrder, ProjectUpdate, ProjectVersion, ProvenanceEntry, ResultDescriptor, SessionToken,
    SpatialReference, SpatialReferenceSpecification, Workflow, WorkflowId,
};
use geoweave_core::models::{BoundingBox2D, ProjectFilter};
use geoweave_core::ports::{Backend, PlotQuery, StorageProvider};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
struct StoredProject {
    dict: ProjectDict,
    /// Monotonic change counter used for date ordering
    changed: u64,
}

/// In-memory implementation of the Backend port
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    projects: Arc<RwLock<HashMap<ProjectId, StoredProject>>>,
    workflows: Arc<RwLock<HashMap<WorkflowId, Workflow>>>,
    metadata: Arc<RwLock<HashMap<WorkflowId, ResultDescriptor>>>,
    provenance: Arc<RwLock<HashMap<WorkflowId, Vec<ProvenanceEntry>>>>,
    plot_data: Arc<RwLock<HashMap<WorkflowId, PlotData>>>,
    spatial_references: Arc<RwLock<HashMap<String, SpatialReferenceSpecification>>>,
    session_projects: Arc<RwLock<HashMap<String, ProjectId>>>,
    load_delays: Arc<RwLock<HashMap<ProjectId, Duration>>>,
    update_delay: Arc<RwLock<Option<Duration>>>,
    calls: Arc<RwLock<HashMap<&'static str, usize>>>,
    clock: Arc<AtomicU64>,
    fail_updates: Arc<AtomicBool>,
}

impl MemoryBackend {
    /// Create a backend that knows the WGS 84 spatial reference
    pub fn new() -> Self {
        let backend = Self::default();
        backend.insert_spatial_reference(SpatialReferenceSpecification {
            name: "WGS 84".to_string(),
            spatial_reference: SpatialReference::wgs84(),
            proj_string: "+proj=longlat +datum=WGS84 +no_defs +type=crs".to_string(),
            extent: BoundingBox2D::world(),
            axis_labels: Some(("longitude".to_string(), "latitude".to_string())),
        });
        backend
    }

    pub fn insert_spatial_reference(&self, specification: SpatialReferenceSpecification) {
        write(&self.spatial_references)
            .insert(specification.spatial_reference.srs_string(), specification);
    }

    /// Store a project as if it had been created earlier
    pub fn insert_project(&self, dict: ProjectDict) {
        let changed = self.tick();
        write(&self.projects).insert(dict.id, StoredProject { dict, changed });
    }

    /// The stored version of a project
    pub fn stored_project(&self, id: ProjectId) -> Option<ProjectDict> {
        read(&self.projects).get(&id).map(|stored| stored.dict.clone())
    }

    /// Register a workflow with a known id and result descriptor
    pub fn insert_workflow(&self, id: WorkflowId, workflow: Workflow, descriptor: ResultDescriptor) {
        write(&self.workflows).insert(id, workflow);
        write(&self.metadata).insert(id, descriptor);
    }

    pub fn set_workflow_metadata(&self, id: WorkflowId, descriptor: ResultDescriptor) {
        write(&self.metadata).insert(id, descriptor);
    }

    pub fn set_provenance(&self, id: WorkflowId, entries: Vec<ProvenanceEntry>) {
        write(&self.provenance).insert(id, entries);
    }

    pub fn set_plot_data(&self, id: WorkflowId, data: PlotData) {
        write(&self.plot_data).insert(id, data);
    }

    /// Delay loading the given project, e.g. to provoke out-of-order responses
    pub fn set_load_delay(&self, id: ProjectId, delay: Duration) {
        write(&self.load_delays).insert(id, delay);
    }

    /// Delay every project update, e.g. to hold the caller's mutation open
    pub fn set_update_delay(&self, delay: Duration) {
        *write(&self.update_delay) = Some(delay);
    }

    /// Let every project update fail until reset
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// The project the session with the given token worked on last
    pub fn session_project(&self, token: &SessionToken) -> Option<ProjectId> {
        read(&self.session_projects).get(token.as_str()).copied()
    }

    /// Number of calls to a backend operation, named like the trait method
    pub fn call_count(&self, operation: &str) -> usize {
        read(&self.calls).get(operation).copied().unwrap_or(0)
    }

    fn record(&self, operation: &'static str) {
        *write(&self.calls).entry(operation).or_insert(0) += 1;
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    fn new_version() -> ProjectVersion {
        ProjectVersion {
            id: uuid::Uuid::new_v4(),
            changed: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn create_project(
        &self,
        project: &NewProject,
        _token: &SessionToken,
    ) -> Result<ProjectId> {
        self.record("create_project");
        let id = ProjectId::new();
        self.insert_project(ProjectDict {
            id,
            name: project.name.clone(),
            description: project.description.clone(),
            version: Some(Self::new_version()),
            bounds: project.bounds.clone(),
            layers: Vec::new(),
            plots: Vec::new(),
            time_step: project.time_step,
        });
        Ok(id)
    }

    async fn update_project(&self, update: &ProjectUpdate, _token: &SessionToken) -> Result<()> {
        self.record("update_project");
        let delay = *read(&self.update_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(GeoweaveError::backend("update_project", "service unavailable"));
        }

        let changed = self.tick();
        let mut projects = write(&self.projects);
        let stored = projects.get_mut(&update.id).ok_or_else(|| {
            GeoweaveError::backend("update_project", format!("unknown project {}", update.id))
        })?;
        update.apply_to(&mut stored.dict);
        stored.dict.version = Some(Self::new_version());
        stored.changed = changed;
        Ok(())
    }

    async fn load_project(&self, id: ProjectId, _token: &SessionToken) -> Result<ProjectDict> {
        self.record("load_project");
        let delay = read(&self.load_delays).get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.stored_project(id)
            .ok_or_else(|| GeoweaveError::backend("load_project", format!("unknown project {}", id)))
    }

    async fn list_projects(
        &self,
        options: &ProjectListOptions,
        _token: &SessionToken,
    ) -> Result<Vec<ProjectListing>> {
        self.record("list_projects");
        let projects = read(&self.projects);

        let mut matching: Vec<&StoredProject> = projects
            .values()
            .filter(|stored| match &options.filter {
                ProjectFilter::None => true,
                ProjectFilter::Name { term } => stored.dict.name.contains(term.as_str()),
                ProjectFilter::Description { term } => {
                    stored.dict.description.contains(term.as_str())
                }
            })
            .collect();

        match options.order {
            ProjectOrder::DateAsc => matching.sort_by_key(|stored| stored.changed),
            ProjectOrder::DateDesc => {
                matching.sort_by_key(|stored| std::cmp::Reverse(stored.changed))
            }
            ProjectOrder::NameAsc => matching.sort_by(|a, b| a.dict.name.cmp(&b.dict.name)),
            ProjectOrder::NameDesc => matching.sort_by(|a, b| b.dict.name.cmp(&a.dict.name)),
        }

        Ok(matching
            .into_iter()
            .skip(options.offset as usize)
            .take(options.limit as usize)
            .map(|stored| ProjectListing {
                id: stored.dict.id,
                name: stored.dict.name.clone(),
                description: stored.dict.description.clone(),
                layer_names: stored.dict.layers.iter().map(|l| l.name.clone()).collect(),
                changed: stored
                    .dict
                    .version
                    .as_ref()
                    .map(|version| version.changed.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn delete_project(&self, id: ProjectId, _token: &SessionToken) -> Result<()> {
        self.record("delete_project");
        write(&self.projects).remove(&id);
        Ok(())
    }

    async fn set_session_project(&self, id: ProjectId, token: &SessionToken) -> Result<()> {
        self.record("set_session_project");
        write(&self.session_projects).insert(token.as_str().to_string(), id);
        Ok(())
    }

    async fn register_workflow(
        &self,
        workflow: &Workflow,
        _token: &SessionToken,
    ) -> Result<WorkflowId> {
        self.record("register_workflow");
        let id = WorkflowId::new();
        write(&self.workflows).insert(id, workflow.clone());
        Ok(id)
    }

    async fn get_workflow(&self, id: WorkflowId, _token: &SessionToken) -> Result<Workflow> {
        self.record("get_workflow");
        read(&self.workflows)
            .get(&id)
            .cloned()
            .ok_or_else(|| GeoweaveError::backend("get_workflow", format!("unknown workflow {}", id)))
    }

    async fn get_workflow_metadata(
        &self,
        id: WorkflowId,
        _token: &SessionToken,
    ) -> Result<ResultDescriptor> {
        self.record("get_workflow_metadata");
        read(&self.metadata).get(&id).cloned().ok_or_else(|| {
            GeoweaveError::backend("get_workflow_metadata", format!("unknown workflow {}", id))
        })
    }

    async fn get_workflow_provenance(
        &self,
        id: WorkflowId,
        _token: &SessionToken,
    ) -> Result<Vec<ProvenanceEntry>> {
        self.record("get_workflow_provenance");
        if !read(&self.workflows).contains_key(&id) {
            return Err(GeoweaveError::backend(
                "get_workflow_provenance",
                format!("unknown workflow {}", id),
            ));
        }
        Ok(read(&self.provenance).get(&id).cloned().unwrap_or_default())
    }

    async fn get_plot_data(
        &self,
        id: WorkflowId,
        _query: &PlotQuery,
        _token: &SessionToken,
    ) -> Result<PlotData> {
        self.record("get_plot_data");
        read(&self.plot_data)
            .get(&id)
            .cloned()
            .ok_or_else(|| GeoweaveError::backend("get_plot_data", format!("unknown plot {}", id)))
    }

    async fn get_spatial_reference_specification(
        &self,
        spatial_reference: &SpatialReference,
        _token: &SessionToken,
    ) -> Result<SpatialReferenceSpecification> {
        self.record("get_spatial_reference_specification");
        read(&self.spatial_references)
            .get(&spatial_reference.srs_string())
            .cloned()
            .ok_or_else(|| {
                GeoweaveError::backend(
                    "get_spatial_reference_specification",
                    format!("unknown spatial reference {}", spatial_reference),
                )
            })
    }
}

/// In-memory implementation of StorageProvider
#[derive(Debug, Clone, Default)]
pub struct MemoryStorageProvider {
    project: Arc<RwLock<Option<ProjectDict>>>,
    layout: Arc<RwLock<Option<Value>>>,
    project_saves: Arc<AtomicU64>,
    layout_saves: Arc<AtomicU64>,
}

impl MemoryStorageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that already holds a stored project
    pub fn with_project(project: ProjectDict) -> Self {
        let provider = Self::default();
        *write(&provider.project) = Some(project);
        provider
    }

    pub fn with_layout_settings(self, settings: Value) -> Self {
        *write(&self.layout) = Some(settings);
        self
    }

    pub fn stored_project(&self) -> Option<ProjectDict> {
        read(&self.project).clone()
    }

    pub fn stored_layout_settings(&self) -> Option<Value> {
        read(&self.layout).clone()
    }

    pub fn project_saves(&self) -> u64 {
        self.project_saves.load(Ordering::SeqCst)
    }

    pub fn layout_saves(&self) -> u64 {
        self.layout_saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageProvider for MemoryStorageProvider {
    async fn load_project(&self) -> Result<Option<ProjectDict>> {
        Ok(self.stored_project())
    }

    async fn save_project(&self, project: &ProjectDict) -> Result<()> {
        *write(&self.project) = Some(project.clone());
        self.project_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_layout_settings(&self) -> Result<Option<Value>> {
        Ok(self.stored_layout_settings())
    }

    async fn save_layout_settings(&self, settings: &Value) -> Result<()> {
        *write(&self.layout) = Some(settings.clone());
        self.layout_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
