//! The reactive project store.
//!
//! [`ProjectService`] is the single source of truth for the active project.
//! Every mutation is a transform of the current project that is pushed to
//! the backend first and emitted only after the backend accepted it, so a
//! failed request leaves the observable state untouched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::try_join_all;
use futures::stream::{BoxStream, StreamExt};
use geoweave_core::config::LayeredConfig;
use geoweave_core::error::{GeoweaveError, Result};
use geoweave_core::models::{
    FeatureSelection, Layer, LayerChanges, LayerId, NewProject, Operator, Plot, PlotData, PlotId,
    Project, ProjectBounds, ProjectChanges, ProjectId, ProjectListOptions, ProjectUpdate,
    ProvenanceEntry, ResultDescriptor, SessionToken, SpatialReference, SpatialResolution,
    TimeInterval, TimeStep, VecUpdate, Workflow, WorkflowId,
};
use geoweave_core::ports::{Backend, PlotQuery, SessionTokenProvider};
use geoweave_core::reactive::{distinct_until_changed, Subject};
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Settings for newly created projects
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDefaults {
    pub name: String,
    pub time: TimeInterval,
    pub time_step: TimeStep,
    pub spatial_reference: SpatialReference,
}

impl ProjectDefaults {
    pub fn from_config(config: &LayeredConfig) -> Self {
        Self {
            name: config.project_name.value.clone(),
            time: config.project_time.value,
            time_step: config.project_time_step.value,
            spatial_reference: config.project_projection.value.clone(),
        }
    }
}

impl Default for ProjectDefaults {
    fn default() -> Self {
        Self::from_config(&LayeredConfig::with_defaults())
    }
}

pub struct ProjectService {
    backend: Arc<dyn Backend>,
    session: Arc<dyn SessionTokenProvider>,
    defaults: ProjectDefaults,

    project: Subject<Project>,
    /// Serializes read-modify-write cycles on the project
    mutation: tokio::sync::Mutex<()>,
    layer_changes: Mutex<HashMap<LayerId, Subject<Layer>>>,
    new_layer: Subject<Layer>,
    new_plot: Subject<Plot>,
    selected_feature: Subject<FeatureSelection>,

    registered_workflows: tokio::sync::Mutex<HashMap<String, WorkflowId>>,
    workflows: Mutex<HashMap<WorkflowId, Workflow>>,
    workflow_metadata: Mutex<HashMap<WorkflowId, ResultDescriptor>>,
    workflow_provenance: Mutex<HashMap<WorkflowId, Vec<ProvenanceEntry>>>,
    plot_data: Mutex<HashMap<PlotId, PlotData>>,

    generation: AtomicU64,
    project_request: AtomicU64,
    plot_requests: Mutex<HashMap<PlotId, u64>>,
}

impl ProjectService {
    pub fn new(
        backend: Arc<dyn Backend>,
        session: Arc<dyn SessionTokenProvider>,
        defaults: ProjectDefaults,
    ) -> Self {
        Self {
            backend,
            session,
            defaults,
            project: Subject::replay(),
            mutation: tokio::sync::Mutex::new(()),
            layer_changes: Mutex::new(HashMap::new()),
            new_layer: Subject::event(),
            new_plot: Subject::event(),
            selected_feature: Subject::new(FeatureSelection::default()),
            registered_workflows: tokio::sync::Mutex::new(HashMap::new()),
            workflows: Mutex::new(HashMap::new()),
            workflow_metadata: Mutex::new(HashMap::new()),
            workflow_provenance: Mutex::new(HashMap::new()),
            plot_data: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            project_request: AtomicU64::new(0),
            plot_requests: Mutex::new(HashMap::new()),
        }
    }

    pub fn defaults(&self) -> &ProjectDefaults {
        &self.defaults
    }

    async fn token(&self) -> Result<SessionToken> {
        self.session.session_token_for_request().await
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    // Project

    /// Replace the project wholesale, invalidating pending project loads
    pub async fn set_project(&self, project: Project) {
        let _guard = self.mutation.lock().await;
        self.project_request
            .store(self.next_generation(), Ordering::SeqCst);
        self.replace_project(project);
    }

    fn replace_project(&self, project: Project) {
        {
            let mut streams = lock(&self.layer_changes);
            for (_, stream) in streams.drain() {
                stream.complete();
            }
            for layer in &project.layers {
                streams.insert(layer.id, Subject::new(layer.clone()));
            }
        }
        lock(&self.plot_data).clear();

        info!(project = %project.id, name = %project.name, "Switched project");
        self.project.next(project);
    }

    pub fn project_stream(&self) -> BoxStream<'static, Project> {
        self.project.subscribe().boxed()
    }

    /// The current project
    pub fn project_once(&self) -> Result<Project> {
        self.project.get().ok_or(GeoweaveError::NoActiveProject)
    }

    pub fn has_project(&self) -> bool {
        self.project.get().is_some()
    }

    /// Apply a transform to the current project, push it to the backend and emit it.
    ///
    /// Returns the previous and the new project, or `None` if the transform
    /// produced no changes.
    async fn change_project<F>(&self, transform: F) -> Result<Option<(Project, Project)>>
    where
        F: FnOnce(&Project) -> Result<Option<ProjectChanges>> + Send,
    {
        self.change_project_then(transform, |_, _| {}).await
    }

    /// Like [`Self::change_project`], running `on_commit` after the emission
    /// while the mutation lock is still held
    async fn change_project_then<F, C>(
        &self,
        transform: F,
        on_commit: C,
    ) -> Result<Option<(Project, Project)>>
    where
        F: FnOnce(&Project) -> Result<Option<ProjectChanges>> + Send,
        C: FnOnce(&Project, &Project) + Send,
    {
        let _guard = self.mutation.lock().await;
        let old = self.project_once()?;

        let changes = match transform(&old)? {
            Some(changes) if !changes.is_empty() => changes,
            _ => return Ok(None),
        };

        let new = old.update_fields(changes.clone());
        let update = ProjectUpdate::from_changes(&old, &new, &changes);

        let token = self.token().await?;
        self.backend.update_project(&update, &token).await?;

        debug!(project = %new.id, "Project changed");
        self.project.next(new.clone());
        self.sync_layer_streams(&old, &new);
        on_commit(&old, &new);
        Ok(Some((old, new)))
    }

    /// End the streams of removed layers, emit changed layers and open streams for new ones
    fn sync_layer_streams(&self, old: &Project, new: &Project) {
        if old.layers == new.layers {
            return;
        }

        let mut streams = lock(&self.layer_changes);
        for layer in &old.layers {
            if new.layer(layer.id).is_none() {
                if let Some(stream) = streams.remove(&layer.id) {
                    debug!(layer = %layer.id, "Removed layer");
                    stream.complete();
                }
            }
        }
        for layer in &new.layers {
            match streams.get(&layer.id) {
                Some(stream) => {
                    if stream.get().as_ref() != Some(layer) {
                        stream.next(layer.clone());
                    }
                }
                None => {
                    streams.insert(layer.id, Subject::new(layer.clone()));
                }
            }
        }
    }

    /// Create a project on the backend and return it without activating it
    pub async fn create_project(&self, project: NewProject) -> Result<Project> {
        let token = self.token().await?;
        let id = self.backend.create_project(&project, &token).await?;
        let dict = self.backend.load_project(id, &token).await?;
        info!(project = %id, name = %project.name, "Created project");
        Ok(Project::from_dict(dict))
    }

    /// Create a project from the configured defaults
    pub async fn create_default_project(&self) -> Result<Project> {
        let token = self.token().await?;
        let specification = self
            .backend
            .get_spatial_reference_specification(&self.defaults.spatial_reference, &token)
            .await?;

        self.create_project(NewProject {
            name: self.defaults.name.clone(),
            description: "Default project".to_string(),
            bounds: ProjectBounds {
                spatial_reference: specification.spatial_reference,
                bounding_box: specification.extent,
                time_interval: self.defaults.time,
            },
            time_step: self.defaults.time_step,
        })
        .await
    }

    /// Copy the current project under a new name and activate the copy
    pub async fn clone_project(&self, name: impl Into<String>) -> Result<Project> {
        let current = self.project_once()?;
        let token = self.token().await?;

        let id = self
            .backend
            .create_project(
                &NewProject {
                    name: name.into(),
                    description: current.description.clone(),
                    bounds: current.bounds(),
                    time_step: current.time_step,
                },
                &token,
            )
            .await?;

        let dict = current.to_dict();
        let update = ProjectUpdate {
            id,
            name: None,
            description: None,
            layers: Some(dict.layers.into_iter().map(VecUpdate::Content).collect()),
            plots: Some(dict.plots.into_iter().map(VecUpdate::Content).collect()),
            bounds: None,
            time_step: None,
        };
        self.backend.update_project(&update, &token).await?;

        self.load_and_set_project(id)
            .await?
            .ok_or(GeoweaveError::NoActiveProject)
    }

    /// Load a project from the backend and activate it.
    ///
    /// Returns `None` if another project was set or loaded in the meantime;
    /// the stale result is discarded.
    pub async fn load_and_set_project(&self, id: ProjectId) -> Result<Option<Project>> {
        let request = self.next_generation();
        self.project_request.store(request, Ordering::SeqCst);

        let token = self.token().await?;
        let dict = self.backend.load_project(id, &token).await?;

        let _guard = self.mutation.lock().await;
        if self.project_request.load(Ordering::SeqCst) != request {
            debug!(project = %id, "Discarding superseded project load");
            return Ok(None);
        }
        self.backend.set_session_project(id, &token).await?;

        let project = Project::from_dict(dict);
        self.replace_project(project.clone());
        Ok(Some(project))
    }

    /// Activate the session's last project, the newest owned project or a new default project
    pub async fn load_most_recent_project(&self) -> Result<Project> {
        let session = self.session.current_session().await?;

        if let Some(id) = session.project {
            match self.load_and_set_project(id).await {
                Ok(Some(project)) => return Ok(project),
                Ok(None) => return self.project_once(),
                Err(e) => warn!(project = %id, "Could not load the session project: {}", e),
            }
        }

        let token = self.token().await?;
        let listing = self
            .backend
            .list_projects(&ProjectListOptions::most_recent(), &token)
            .await?;

        let project = match listing.first() {
            Some(newest) => {
                let dict = self.backend.load_project(newest.id, &token).await?;
                Project::from_dict(dict)
            }
            None => self.create_default_project().await?,
        };

        self.backend.set_session_project(project.id, &token).await?;
        self.set_project(project.clone()).await;
        Ok(project)
    }

    pub async fn set_name(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.change_project(move |project| {
            Ok((project.name != name).then(|| ProjectChanges {
                name: Some(name),
                ..Default::default()
            }))
        })
        .await?;
        Ok(())
    }

    // Time

    /// Set the project time; equal times are ignored
    pub async fn set_time(&self, time: TimeInterval) -> Result<()> {
        self.change_time(move |_| time).await
    }

    /// Atomically derive the new project time from the current one
    pub async fn change_time<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(TimeInterval) -> TimeInterval + Send,
    {
        self.change_project(move |project| {
            let time = f(project.time);
            Ok((time != project.time).then(|| ProjectChanges {
                time: Some(time),
                ..Default::default()
            }))
        })
        .await?;
        Ok(())
    }

    pub async fn set_time_step(&self, time_step: TimeStep) -> Result<()> {
        self.change_project(move |project| {
            Ok((project.time_step != time_step).then(|| ProjectChanges {
                time_step: Some(time_step),
                ..Default::default()
            }))
        })
        .await?;
        Ok(())
    }

    pub fn time_stream(&self) -> BoxStream<'static, TimeInterval> {
        self.project.select(|project| project.time)
    }

    pub fn time_once(&self) -> Result<TimeInterval> {
        Ok(self.project_once()?.time)
    }

    pub fn time_step_stream(&self) -> BoxStream<'static, TimeStep> {
        self.project.select(|project| project.time_step)
    }

    // Spatial reference

    /// Switch the spatial reference; the extent becomes the new reference's extent
    pub async fn set_spatial_reference(&self, spatial_reference: SpatialReference) -> Result<()> {
        if self.project_once()?.spatial_reference == spatial_reference {
            return Ok(());
        }

        let token = self.token().await?;
        let specification = self
            .backend
            .get_spatial_reference_specification(&spatial_reference, &token)
            .await?;

        self.change_project(move |project| {
            if project.spatial_reference == spatial_reference {
                return Ok(None);
            }
            Ok(Some(ProjectChanges {
                spatial_reference: Some(spatial_reference),
                bbox: Some(specification.extent),
                ..Default::default()
            }))
        })
        .await?;
        Ok(())
    }

    pub fn spatial_reference_stream(&self) -> BoxStream<'static, SpatialReference> {
        self.project
            .select(|project| project.spatial_reference.clone())
    }

    // Layers

    /// Insert a layer at the top of the layer list
    pub async fn add_layer(&self, layer: Layer) -> Result<()> {
        self.add_layers(vec![layer]).await
    }

    /// Insert layers at the top of the layer list; the last given layer ends on top
    pub async fn add_layers(&self, layers: Vec<Layer>) -> Result<()> {
        if layers.is_empty() {
            return Ok(());
        }

        let added = layers.clone();
        self.change_project_then(
            move |project| {
                let mut new_layers: Vec<Layer> = layers.into_iter().rev().collect();
                new_layers.extend(project.layers.iter().cloned());
                Ok(Some(ProjectChanges {
                    layers: Some(new_layers),
                    ..Default::default()
                }))
            },
            |_, _| {
                for layer in added {
                    debug!(layer = %layer.id, name = %layer.name, "Added layer");
                    self.new_layer.next(layer);
                }
            },
        )
        .await?;
        Ok(())
    }

    /// Remove a layer; removing an absent layer is a no-op
    pub async fn remove_layer(&self, layer_id: LayerId) -> Result<()> {
        self.change_project(move |project| {
            if project.layer(layer_id).is_none() {
                return Ok(None);
            }
            Ok(Some(ProjectChanges {
                layers: Some(
                    project
                        .layers
                        .iter()
                        .filter(|layer| layer.id != layer_id)
                        .cloned()
                        .collect(),
                ),
                ..Default::default()
            }))
        })
        .await?;
        Ok(())
    }

    /// Replace a layer by an updated value in the same position
    pub async fn change_layer(&self, layer_id: LayerId, changes: LayerChanges) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        self.update_layer(layer_id, move |_| changes).await
    }

    pub async fn toggle_legend(&self, layer_id: LayerId) -> Result<()> {
        self.update_layer(layer_id, |layer| {
            LayerChanges::default().legend_visible(!layer.is_legend_visible)
        })
        .await
    }

    async fn update_layer<F>(&self, layer_id: LayerId, f: F) -> Result<()>
    where
        F: FnOnce(&Layer) -> LayerChanges + Send,
    {
        self.change_project(move |project| {
            let index = project
                .layers
                .iter()
                .position(|layer| layer.id == layer_id)
                .ok_or(GeoweaveError::LayerNotFound { id: layer_id.0 })?;

            let old = &project.layers[index];
            let new = old.update_fields(f(old));
            if &new == old {
                return Ok(None);
            }

            let mut layers = project.layers.clone();
            layers[index] = new;
            Ok(Some(ProjectChanges {
                layers: Some(layers),
                ..Default::default()
            }))
        })
        .await?;
        Ok(())
    }

    /// Replace the layer list, keeping the given order
    pub async fn set_layers(&self, layers: Vec<Layer>) -> Result<()> {
        self.change_project(move |project| {
            Ok((project.layers != layers).then(|| ProjectChanges {
                layers: Some(layers),
                ..Default::default()
            }))
        })
        .await?;
        Ok(())
    }

    pub async fn clear_layers(&self) -> Result<()> {
        self.set_layers(Vec::new()).await
    }

    pub fn layer_stream(&self) -> BoxStream<'static, Vec<Layer>> {
        self.project.select(|project| project.layers.clone())
    }

    pub fn layers_once(&self) -> Result<Vec<Layer>> {
        Ok(self.project_once()?.layers)
    }

    /// Updates of a single layer; the stream ends when the layer is removed
    pub fn layer_changes_stream(&self, layer_id: LayerId) -> Result<BoxStream<'static, Layer>> {
        lock(&self.layer_changes)
            .get(&layer_id)
            .map(|stream| stream.subscribe().boxed())
            .ok_or(GeoweaveError::LayerNotFound { id: layer_id.0 })
    }

    /// Layers added after subscribing
    pub fn new_layer_stream(&self) -> BoxStream<'static, Layer> {
        self.new_layer.subscribe().boxed()
    }

    // Plots

    /// Insert a plot at the top of the plot list
    pub async fn add_plot(&self, plot: Plot) -> Result<()> {
        let added = plot.clone();
        self.change_project_then(
            move |project| {
                let mut plots = vec![plot];
                plots.extend(project.plots.iter().cloned());
                Ok(Some(ProjectChanges {
                    plots: Some(plots),
                    ..Default::default()
                }))
            },
            |_, _| {
                debug!(plot = %added.id, name = %added.name, "Added plot");
                self.new_plot.next(added);
            },
        )
        .await?;
        Ok(())
    }

    /// Remove a plot; removing an absent plot is a no-op
    pub async fn remove_plot(&self, plot_id: PlotId) -> Result<()> {
        let removed = self
            .change_project(move |project| {
                if !project.plots.iter().any(|plot| plot.id == plot_id) {
                    return Ok(None);
                }
                Ok(Some(ProjectChanges {
                    plots: Some(
                        project
                            .plots
                            .iter()
                            .filter(|plot| plot.id != plot_id)
                            .cloned()
                            .collect(),
                    ),
                    ..Default::default()
                }))
            })
            .await?;

        if removed.is_some() {
            lock(&self.plot_data).remove(&plot_id);
            lock(&self.plot_requests).remove(&plot_id);
        }
        Ok(())
    }

    pub async fn clear_plots(&self) -> Result<()> {
        self.change_project(|project| {
            Ok((!project.plots.is_empty()).then(|| ProjectChanges {
                plots: Some(Vec::new()),
                ..Default::default()
            }))
        })
        .await?;
        lock(&self.plot_data).clear();
        Ok(())
    }

    pub fn plot_stream(&self) -> BoxStream<'static, Vec<Plot>> {
        self.project.select(|project| project.plots.clone())
    }

    /// Plots added after subscribing
    pub fn new_plot_stream(&self) -> BoxStream<'static, Plot> {
        self.new_plot.subscribe().boxed()
    }

    /// Compute a plot for the current project bounds.
    ///
    /// Returns `None` if a newer request for the same plot superseded this one.
    pub async fn plot_data(
        &self,
        plot_id: PlotId,
        spatial_resolution: SpatialResolution,
    ) -> Result<Option<PlotData>> {
        let project = self.project_once()?;
        let plot = project
            .plots
            .iter()
            .find(|plot| plot.id == plot_id)
            .ok_or(GeoweaveError::PlotNotFound { id: plot_id.0 })?;

        let request = self.next_generation();
        lock(&self.plot_requests).insert(plot_id, request);

        let query = PlotQuery {
            bbox: project.bbox,
            spatial_reference: project.spatial_reference.clone(),
            time: project.time,
            spatial_resolution,
        };
        let token = self.token().await?;
        let data = self
            .backend
            .get_plot_data(plot.workflow_id, &query, &token)
            .await?;

        if lock(&self.plot_requests).get(&plot_id) != Some(&request) {
            debug!(plot = %plot_id, "Discarding superseded plot data");
            return Ok(None);
        }

        lock(&self.plot_data).insert(plot_id, data.clone());
        Ok(Some(data))
    }

    /// The last computed data of a plot
    pub fn cached_plot_data(&self, plot_id: PlotId) -> Option<PlotData> {
        lock(&self.plot_data).get(&plot_id).cloned()
    }

    // Workflows

    /// Register a workflow; identical workflows are registered once per session
    pub async fn register_workflow(&self, workflow: Workflow) -> Result<WorkflowId> {
        let key = workflow.content_key()?;
        let mut registered = self.registered_workflows.lock().await;
        if let Some(id) = registered.get(&key) {
            debug!(workflow = %id, "Reusing registered workflow");
            return Ok(*id);
        }

        let token = self.token().await?;
        let id = self.backend.register_workflow(&workflow, &token).await?;
        registered.insert(key, id);
        lock(&self.workflows).insert(id, workflow);
        Ok(id)
    }

    pub async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow> {
        if let Some(workflow) = lock(&self.workflows).get(&id).cloned() {
            return Ok(workflow);
        }
        let token = self.token().await?;
        let workflow = self.backend.get_workflow(id, &token).await?;
        lock(&self.workflows).insert(id, workflow.clone());
        Ok(workflow)
    }

    pub async fn get_workflow_metadata(&self, id: WorkflowId) -> Result<ResultDescriptor> {
        if let Some(descriptor) = lock(&self.workflow_metadata).get(&id).cloned() {
            return Ok(descriptor);
        }
        let token = self.token().await?;
        let descriptor = self.backend.get_workflow_metadata(id, &token).await?;
        lock(&self.workflow_metadata).insert(id, descriptor.clone());
        Ok(descriptor)
    }

    pub async fn get_workflow_provenance(&self, id: WorkflowId) -> Result<Vec<ProvenanceEntry>> {
        if let Some(provenance) = lock(&self.workflow_provenance).get(&id).cloned() {
            return Ok(provenance);
        }
        let token = self.token().await?;
        let provenance = self.backend.get_workflow_provenance(id, &token).await?;
        lock(&self.workflow_provenance).insert(id, provenance.clone());
        Ok(provenance)
    }

    /// The operators of the given layers, reprojected into their most common spatial reference.
    ///
    /// Ties are resolved in favor of the reference that occurs first.
    pub async fn automatically_projected_operators(
        &self,
        layers: &[Layer],
    ) -> Result<Vec<Operator>> {
        let resolved = try_join_all(layers.iter().map(|layer| async move {
            let workflow = self.get_workflow(layer.workflow_id).await?;
            let descriptor = self.get_workflow_metadata(layer.workflow_id).await?;
            Ok::<_, GeoweaveError>((workflow.operator, descriptor))
        }))
        .await?;

        let references: Vec<&SpatialReference> = resolved
            .iter()
            .filter_map(|(_, descriptor)| descriptor.spatial_reference())
            .collect();
        let Some(target) = projection_target(&references) else {
            return Ok(resolved.into_iter().map(|(operator, _)| operator).collect());
        };

        Ok(resolved
            .into_iter()
            .map(|(operator, descriptor)| match descriptor.spatial_reference() {
                Some(reference) if reference != &target => {
                    Operator::reprojection(&target, operator)
                }
                _ => operator,
            })
            .collect())
    }

    // Feature selection

    pub fn set_selected_feature(&self, selection: FeatureSelection) {
        if self.selected_feature.get().as_ref() != Some(&selection) {
            self.selected_feature.next(selection);
        }
    }

    pub fn selected_feature(&self) -> FeatureSelection {
        self.selected_feature.get().unwrap_or_default()
    }

    pub fn selected_feature_stream(&self) -> BoxStream<'static, FeatureSelection> {
        distinct_until_changed(self.selected_feature.subscribe()).boxed()
    }
}

/// The most frequent reference, ties going to the one seen first
fn projection_target(references: &[&SpatialReference]) -> Option<SpatialReference> {
    let mut counts: Vec<(&SpatialReference, usize)> = Vec::new();
    for reference in references {
        match counts.iter_mut().find(|(seen, _)| seen == reference) {
            Some((_, count)) => *count += 1,
            None => counts.push((reference, 1)),
        }
    }

    let mut best: Option<(&SpatialReference, usize)> = None;
    for (reference, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((reference, count));
        }
    }
    best.map(|(reference, _)| reference.clone())
}
