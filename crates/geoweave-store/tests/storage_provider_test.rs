//! Integration tests for the storage providers
//!
//! This test suite verifies that:
//! - The file provider round-trips projects and layout settings
//! - Missing files mean "nothing stored" rather than an error
//! - The backend provider writes saves through to the backend

use geoweave_core::models::*;
use geoweave_core::ports::{Backend, StaticSession, StorageProvider};
use geoweave_store::{BackendStorageProvider, FileStorageProvider, MemoryBackend};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn project_dict() -> ProjectDict {
    ProjectDict {
        id: ProjectId::new(),
        name: "Stored".to_string(),
        description: String::new(),
        version: None,
        bounds: ProjectBounds {
            spatial_reference: SpatialReference::wgs84(),
            bounding_box: BoundingBox2D::world(),
            time_interval: TimeInterval::from_millis(0, 86_400_000).unwrap(),
        },
        layers: vec![ProjectLayerDict {
            workflow: WorkflowId::new(),
            name: "Rivers".to_string(),
            visibility: LayerVisibility {
                data: true,
                legend: false,
            },
            symbology: Symbology::default_line(),
        }],
        plots: Vec::new(),
        time_step: TimeStep::new(1, TimeGranularity::Days),
    }
}

#[tokio::test]
async fn test_file_provider_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let provider = FileStorageProvider::new(temp_dir.path().join("state"));

    assert!(provider.load_project().await.unwrap().is_none());
    assert!(provider.load_layout_settings().await.unwrap().is_none());

    let project = project_dict();
    provider.save_project(&project).await.unwrap();
    provider
        .save_layout_settings(&json!({"layerDetailViewHeightPercentage": 0.5}))
        .await
        .unwrap();

    assert_eq!(provider.load_project().await.unwrap(), Some(project));
    assert_eq!(
        provider.load_layout_settings().await.unwrap().unwrap()["layerDetailViewHeightPercentage"],
        0.5
    );
    assert!(!temp_dir.path().join("state").join("project.json.tmp").exists());
}

#[tokio::test]
async fn test_file_provider_rejects_corrupt_project() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("project.json"), "{not json").unwrap();

    let provider = FileStorageProvider::new(temp_dir.path());
    assert!(provider.load_project().await.is_err());
}

#[tokio::test]
async fn test_backend_provider_writes_through() {
    let backend = Arc::new(MemoryBackend::new());
    let session = Arc::new(StaticSession::new(SessionToken::new("token")));
    let mut project = project_dict();
    backend.insert_project(project.clone());

    let provider = BackendStorageProvider::new(backend.clone(), session, Some(project.id));
    assert_eq!(provider.load_project().await.unwrap().unwrap().name, "Stored");

    project.name = "Renamed".to_string();
    project.layers.clear();
    provider.save_project(&project).await.unwrap();

    let stored = backend.stored_project(project.id).unwrap();
    assert_eq!(stored.name, "Renamed");
    assert!(stored.layers.is_empty());
    assert_eq!(
        backend.session_project(&SessionToken::new("token")),
        Some(project.id)
    );
    assert_eq!(backend.call_count("update_project"), 1);
}

#[tokio::test]
async fn test_backend_provider_without_project_loads_nothing() {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let session = Arc::new(StaticSession::new(SessionToken::new("token")));
    let provider = BackendStorageProvider::new(backend, session, None);

    assert!(provider.load_project().await.unwrap().is_none());
}
