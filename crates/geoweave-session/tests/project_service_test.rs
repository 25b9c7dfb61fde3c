//! Integration tests for the project store
//!
//! This test suite verifies that:
//! - Projects are restored from the session, the newest project or created from defaults
//! - Layer and plot mutations reach the backend before they are emitted
//! - Failed backend updates leave the observable project untouched
//! - Concurrent mutations and workflow registrations do not race
//! - Superseded project loads are discarded
//! - Layer change streams and the time stream follow project switches

use futures::{FutureExt, StreamExt};
use geoweave_core::models::*;
use geoweave_core::ports::StaticSession;
use geoweave_core::GeoweaveError;
use geoweave_session::{ProjectDefaults, ProjectService};
use geoweave_store::MemoryBackend;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const TOKEN: &str = "test-token";

fn project_dict(name: &str) -> ProjectDict {
    ProjectDict {
        id: ProjectId::new(),
        name: name.to_string(),
        description: String::new(),
        version: None,
        bounds: ProjectBounds {
            spatial_reference: SpatialReference::wgs84(),
            bounding_box: BoundingBox2D::world(),
            time_interval: TimeInterval::from_millis(0, 0).unwrap(),
        },
        layers: Vec::new(),
        plots: Vec::new(),
        time_step: TimeStep::default(),
    }
}

fn service(backend: &MemoryBackend, session: StaticSession) -> Arc<ProjectService> {
    Arc::new(ProjectService::new(
        Arc::new(backend.clone()),
        Arc::new(session),
        ProjectDefaults::default(),
    ))
}

async fn service_with_project(backend: &MemoryBackend) -> (Arc<ProjectService>, ProjectId) {
    let dict = project_dict("Working");
    let id = dict.id;
    backend.insert_project(dict);

    let service = service(
        backend,
        StaticSession::with_project(SessionToken::new(TOKEN), id),
    );
    service.load_most_recent_project().await.unwrap();
    (service, id)
}

fn layer(name: &str) -> Layer {
    Layer::new(name, WorkflowId::new(), Symbology::default_line())
}

fn names(layers: &[Layer]) -> Vec<&str> {
    layers.iter().map(|layer| layer.name.as_str()).collect()
}

fn raster_descriptor(spatial_reference: SpatialReference) -> ResultDescriptor {
    ResultDescriptor::Raster {
        data_type: "U8".to_string(),
        spatial_reference,
        time: None,
        bbox: None,
        resolution: None,
        bands: Vec::new(),
    }
}

#[tokio::test]
async fn test_without_projects_a_default_project_is_created() {
    let backend = MemoryBackend::new();
    let service = service(&backend, StaticSession::new(SessionToken::new(TOKEN)));
    assert!(matches!(
        service.project_once(),
        Err(GeoweaveError::NoActiveProject)
    ));

    let project = service.load_most_recent_project().await.unwrap();

    assert_eq!(project.name, "Default");
    assert_eq!(project.bbox, BoundingBox2D::world());
    assert_eq!(project.time.to_string(), "2000-01-01T00:00:00+00:00");
    assert_eq!(backend.call_count("create_project"), 1);
    assert_eq!(
        backend.session_project(&SessionToken::new(TOKEN)),
        Some(project.id)
    );
}

#[tokio::test]
async fn test_session_project_is_preferred() {
    let backend = MemoryBackend::new();
    backend.insert_project(project_dict("Other"));
    let (service, id) = service_with_project(&backend).await;

    assert_eq!(service.project_once().unwrap().id, id);
    assert_eq!(backend.call_count("list_projects"), 0);
}

#[tokio::test]
async fn test_newest_project_is_used_without_session_project() {
    let backend = MemoryBackend::new();
    let newest = project_dict("Newest");
    backend.insert_project(project_dict("Older"));
    backend.insert_project(newest.clone());

    let service = service(&backend, StaticSession::new(SessionToken::new(TOKEN)));
    let project = service.load_most_recent_project().await.unwrap();

    assert_eq!(project.id, newest.id);
    assert_eq!(backend.call_count("create_project"), 0);
}

#[tokio::test]
async fn test_layers_are_inserted_at_the_top() {
    let backend = MemoryBackend::new();
    let (service, id) = service_with_project(&backend).await;
    let mut added = service.new_layer_stream();

    service.add_layer(layer("A")).await.unwrap();
    service
        .add_layers(vec![layer("B"), layer("C")])
        .await
        .unwrap();

    let project = service.project_once().unwrap();
    assert_eq!(names(&project.layers), vec!["C", "B", "A"]);
    assert_eq!(added.next().await.unwrap().name, "A");
    assert_eq!(added.next().await.unwrap().name, "B");
    assert_eq!(added.next().await.unwrap().name, "C");

    let stored = backend.stored_project(id).unwrap();
    let stored_names: Vec<&str> = stored.layers.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(stored_names, vec!["C", "B", "A"]);
}

#[tokio::test]
async fn test_failed_update_leaves_project_unchanged() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    service.add_layer(layer("Kept")).await.unwrap();
    let before = service.project_once().unwrap();

    backend.fail_updates(true);
    let failed = layer("Lost");
    let failed_id = failed.id;
    let result = service.add_layer(failed).await;

    assert!(result.unwrap_err().is_backend());
    assert_eq!(service.project_once().unwrap(), before);
    assert!(matches!(
        service.layer_changes_stream(failed_id),
        Err(GeoweaveError::LayerNotFound { .. })
    ));
}

#[tokio::test]
async fn test_removing_absent_layer_is_a_no_op() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    let updates = backend.call_count("update_project");

    service.remove_layer(LayerId::next()).await.unwrap();
    service.remove_plot(PlotId::next()).await.unwrap();

    assert_eq!(backend.call_count("update_project"), updates);
}

#[tokio::test]
async fn test_layer_changes_stream_follows_the_layer() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    let rivers = layer("Rivers");
    let id = rivers.id;
    service.add_layer(rivers).await.unwrap();

    let changes = service.layer_changes_stream(id).unwrap();
    service
        .change_layer(id, LayerChanges::default().name("Streams"))
        .await
        .unwrap();
    service.toggle_legend(id).await.unwrap();
    service.remove_layer(id).await.unwrap();

    let seen: Vec<Layer> = changes.collect().await;
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].name, "Rivers");
    assert_eq!(seen[1].name, "Streams");
    assert!(seen[2].is_legend_visible);
    assert!(seen.iter().all(|layer| layer.id == id));
    assert!(service.project_once().unwrap().layers.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_layer_added_during_project_switch_keeps_its_change_stream() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    let second = project_dict("Second");
    backend.insert_project(second.clone());
    backend.set_update_delay(Duration::from_millis(50));

    let rivers = layer("Rivers");
    let id = rivers.id;
    // the rename holds the mutation while the switch and the insert queue behind it
    let (renamed, (), added) = tokio::join!(
        service.set_name("Renamed"),
        service.set_project(Project::from_dict(second.clone())),
        service.add_layer(rivers)
    );
    renamed.unwrap();
    added.unwrap();

    let project = service.project_once().unwrap();
    assert_eq!(project.id, second.id);
    assert_eq!(names(&project.layers), vec!["Rivers"]);

    let mut changes = service.layer_changes_stream(id).unwrap();
    service
        .change_layer(id, LayerChanges::default().name("Streams"))
        .await
        .unwrap();
    assert_eq!(changes.next().await.unwrap().name, "Rivers");
    assert_eq!(changes.next().await.unwrap().name, "Streams");
}

#[tokio::test]
async fn test_time_stream_follows_set_project() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    let first_time = service.time_once().unwrap();
    let mut before = service.time_stream();
    assert_eq!(before.next().await, Some(first_time));

    let mut dict = project_dict("Second");
    dict.bounds.time_interval = TimeInterval::from_millis(1_000, 2_000).unwrap();
    let second = Project::from_dict(dict);
    service.set_project(second.clone()).await;

    let mut after = service.time_stream();
    assert_eq!(after.next().await, Some(second.time));
    assert_eq!(before.next().await, Some(second.time));
    assert!(before.next().now_or_never().is_none());
}

#[tokio::test]
async fn test_changing_unknown_layer_fails() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;

    let result = service
        .change_layer(LayerId::next(), LayerChanges::default().visible(false))
        .await;
    assert!(matches!(result, Err(GeoweaveError::LayerNotFound { .. })));
}

#[tokio::test]
async fn test_set_layers_replaces_order() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    service
        .add_layers(vec![layer("A"), layer("B")])
        .await
        .unwrap();

    let mut reordered = service.layers_once().unwrap();
    reordered.reverse();
    service.set_layers(reordered).await.unwrap();
    assert_eq!(names(&service.layers_once().unwrap()), vec!["A", "B"]);

    let updates = backend.call_count("update_project");
    service
        .set_layers(service.layers_once().unwrap())
        .await
        .unwrap();
    assert_eq!(backend.call_count("update_project"), updates);

    service.clear_layers().await.unwrap();
    assert!(service.layers_once().unwrap().is_empty());
}

#[tokio::test]
async fn test_equal_time_is_not_sent() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    let mut times = service.time_stream();
    let updates = backend.call_count("update_project");

    let time = service.time_once().unwrap();
    service.set_time(time).await.unwrap();
    assert_eq!(backend.call_count("update_project"), updates);

    let later = TimeInterval::from_millis(1000, 2000).unwrap();
    service.set_time(later).await.unwrap();
    assert_eq!(times.next().await, Some(time));
    assert_eq!(times.next().await, Some(later));
}

#[tokio::test]
async fn test_concurrent_time_changes_are_atomic() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    let step = TimeStep::new(1, TimeGranularity::Days);
    let start = service.time_once().unwrap();

    let first = service.change_time(move |time| time.shifted_by(step).unwrap());
    let second = service.change_time(move |time| time.shifted_by(step).unwrap());
    let (first, second) = tokio::join!(first, second);
    first.unwrap();
    second.unwrap();

    let expected = start.shifted_by(step).unwrap().shifted_by(step).unwrap();
    assert_eq!(service.time_once().unwrap(), expected);
}

#[tokio::test]
async fn test_identical_workflows_are_registered_once() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    let workflow = Workflow::new(
        WorkflowKind::Raster,
        Operator::new("GdalSource").with_param("data", json!("ndvi")),
    );

    let (a, b) = tokio::join!(
        service.register_workflow(workflow.clone()),
        service.register_workflow(workflow.clone())
    );
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(backend.call_count("register_workflow"), 1);

    let other = Workflow::new(WorkflowKind::Raster, Operator::new("GdalSource"));
    service.register_workflow(other).await.unwrap();
    assert_eq!(backend.call_count("register_workflow"), 2);
}

#[tokio::test]
async fn test_workflow_reads_are_cached() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    let id = WorkflowId::new();
    backend.insert_workflow(
        id,
        Workflow::new(WorkflowKind::Raster, Operator::new("GdalSource")),
        raster_descriptor(SpatialReference::wgs84()),
    );

    for _ in 0..3 {
        service.get_workflow(id).await.unwrap();
        service.get_workflow_metadata(id).await.unwrap();
        service.get_workflow_provenance(id).await.unwrap();
    }
    assert_eq!(backend.call_count("get_workflow"), 1);
    assert_eq!(backend.call_count("get_workflow_metadata"), 1);
    assert_eq!(backend.call_count("get_workflow_provenance"), 1);

    assert!(service.get_workflow(WorkflowId::new()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_superseded_project_load_is_discarded() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    let slow = project_dict("Slow");
    let fast = project_dict("Fast");
    backend.set_load_delay(slow.id, Duration::from_millis(200));
    backend.insert_project(slow.clone());
    backend.insert_project(fast.clone());

    let (slow_result, fast_result) = tokio::join!(
        service.load_and_set_project(slow.id),
        service.load_and_set_project(fast.id)
    );

    assert_eq!(slow_result.unwrap(), None);
    assert_eq!(fast_result.unwrap().unwrap().id, fast.id);
    assert_eq!(service.project_once().unwrap().id, fast.id);
    assert_eq!(
        backend.session_project(&SessionToken::new(TOKEN)),
        Some(fast.id)
    );
}

#[tokio::test]
async fn test_spatial_reference_change_resets_extent() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    let utm = SpatialReference::new("EPSG", 32632);
    let extent = BoundingBox2D::from_bounds(166_021.44, 0.0, 833_978.56, 9_329_005.18).unwrap();
    backend.insert_spatial_reference(SpatialReferenceSpecification {
        name: "WGS 84 / UTM zone 32N".to_string(),
        spatial_reference: utm.clone(),
        proj_string: String::new(),
        extent,
        axis_labels: None,
    });

    service.set_spatial_reference(utm.clone()).await.unwrap();
    let project = service.project_once().unwrap();
    assert_eq!(project.spatial_reference, utm);
    assert_eq!(project.bbox, extent);

    let unknown = SpatialReference::new("EPSG", 1);
    assert!(service.set_spatial_reference(unknown).await.is_err());
    assert_eq!(service.project_once().unwrap().spatial_reference, utm);
}

#[tokio::test]
async fn test_layers_are_projected_into_majority_reference() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    let utm = SpatialReference::new("EPSG", 32632);

    let mut layers = Vec::new();
    for (name, reference) in [
        ("a", SpatialReference::wgs84()),
        ("b", utm.clone()),
        ("c", SpatialReference::wgs84()),
    ] {
        let id = WorkflowId::new();
        backend.insert_workflow(
            id,
            Workflow::new(WorkflowKind::Raster, Operator::new(name)),
            raster_descriptor(reference),
        );
        layers.push(Layer::new(name, id, Symbology::default_raster()));
    }

    let operators = service
        .automatically_projected_operators(&layers)
        .await
        .unwrap();

    assert_eq!(operators[0].operator_type, "a");
    assert_eq!(operators[1].operator_type, "Reprojection");
    assert_eq!(operators[1].sources["source"].operators()[0].operator_type, "b");
    assert_eq!(operators[2].operator_type, "c");
}

#[tokio::test]
async fn test_clone_project_copies_layers_and_plots() {
    let backend = MemoryBackend::new();
    let (service, original) = service_with_project(&backend).await;
    service.add_layer(layer("Rivers")).await.unwrap();
    service
        .add_plot(Plot::new("Histogram", WorkflowId::new()))
        .await
        .unwrap();

    let clone = service.clone_project("Copy").await.unwrap();

    assert_ne!(clone.id, original);
    assert_eq!(clone.name, "Copy");
    assert_eq!(names(&clone.layers), vec!["Rivers"]);
    assert_eq!(clone.plots[0].name, "Histogram");
    assert_eq!(service.project_once().unwrap().id, clone.id);
    assert_eq!(backend.stored_project(original).unwrap().name, "Working");
}

#[tokio::test]
async fn test_plot_data_is_cached_per_plot() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    let workflow = WorkflowId::new();
    let data = PlotData {
        plot_type: "Histogram".to_string(),
        output_format: PlotOutputFormat::JsonVega,
        data: json!({"vega": {}}),
    };
    backend.set_plot_data(workflow, data.clone());

    let plot = Plot::new("Histogram", workflow);
    let plot_id = plot.id;
    let mut added = service.new_plot_stream();
    service.add_plot(plot).await.unwrap();
    assert_eq!(added.next().await.unwrap().id, plot_id);

    let resolution = SpatialResolution { x: 0.1, y: 0.1 };
    assert_eq!(
        service.plot_data(plot_id, resolution).await.unwrap(),
        Some(data.clone())
    );
    assert_eq!(service.cached_plot_data(plot_id), Some(data));

    service.clear_plots().await.unwrap();
    assert_eq!(service.cached_plot_data(plot_id), None);
    assert!(matches!(
        service.plot_data(plot_id, resolution).await,
        Err(GeoweaveError::PlotNotFound { .. })
    ));
}

#[tokio::test]
async fn test_selected_feature_stream_is_distinct() {
    let backend = MemoryBackend::new();
    let (service, _) = service_with_project(&backend).await;
    let mut selections = service.selected_feature_stream();

    service.set_selected_feature(FeatureSelection::feature("f1"));
    service.set_selected_feature(FeatureSelection::feature("f1"));
    service.set_selected_feature(FeatureSelection::default());

    assert!(selections.next().await.unwrap().is_empty());
    assert_eq!(
        selections.next().await.unwrap().feature.as_deref(),
        Some("f1")
    );
    assert!(selections.next().await.unwrap().is_empty());
    assert!(service.selected_feature().is_empty());
}
