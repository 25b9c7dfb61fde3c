//! Project command implementation

use crate::cli::ProjectArgs;
use crate::output::OutputWriter;
use crate::output_types::{LayerInfo, ProjectOutput};
use anyhow::{Context, Result};
use geoweave_core::config::LayeredConfig;
use geoweave_core::models::SessionToken;
use geoweave_core::ports::{Backend, SessionTokenProvider, StaticSession, StorageProvider};
use geoweave_session::{LayoutService, ProjectDefaults, ProjectService, StorageSync};
use geoweave_store::{FileStorageProvider, MemoryBackend};
use std::sync::Arc;
use tabled::Tabled;

pub async fn execute(
    args: ProjectArgs,
    config: &LayeredConfig,
    token: Option<String>,
    output: &OutputWriter,
) -> Result<()> {
    let provider = Arc::new(FileStorageProvider::new(&args.state_dir));
    let stored = provider
        .load_project()
        .await
        .with_context(|| format!("Failed to read stored project in {}", args.state_dir.display()))?;

    let (backend, session): (Arc<dyn Backend>, Arc<dyn SessionTokenProvider>) = if args.offline {
        let backend = MemoryBackend::new();
        if let Some(dict) = &stored {
            backend.insert_project(dict.clone());
        }
        let token = SessionToken::new(token.unwrap_or_else(|| "offline".to_string()));
        (Arc::new(backend), Arc::new(StaticSession::new(token)))
    } else {
        let (backend, session) = super::connect(&config.api_url.value, token)?;
        (backend, session as Arc<dyn SessionTokenProvider>)
    };

    let project_service = Arc::new(ProjectService::new(
        backend,
        session,
        ProjectDefaults::from_config(config),
    ));
    let layout_service = Arc::new(LayoutService::default());
    let sync = StorageSync::start(
        Arc::clone(&project_service),
        layout_service,
        provider,
        config.storage_debounce(),
    )
    .await
    .context("Failed to restore the project")?;

    if let Some(name) = args.rename {
        project_service
            .set_name(name)
            .await
            .context("Failed to rename the project")?;
    }

    let project = project_service.project_once()?;
    let saved = sync.flush_pending().await;
    if !saved && sync.has_pending() {
        output.warning(format!(
            "The project could not be stored in {}",
            args.state_dir.display()
        ));
    }

    let summary = ProjectOutput {
        id: project.id.to_string(),
        name: project.name.clone(),
        spatial_reference: project.spatial_reference.srs_string(),
        time: project.time.to_string(),
        time_step: project.time_step.to_string(),
        layers: project
            .layers
            .iter()
            .map(|layer| LayerInfo {
                name: layer.name.clone(),
                kind: format!("{:?}", layer.kind()),
                workflow: layer.workflow_id.to_string(),
                visible: layer.is_visible,
            })
            .collect(),
        plot_count: project.plots.len(),
        saved,
    };

    if output.is_json() {
        output.result(summary)?;
        return Ok(());
    }

    #[derive(Tabled)]
    struct LayerRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Kind")]
        kind: String,
        #[tabled(rename = "Workflow")]
        workflow: String,
        #[tabled(rename = "Visible")]
        visible: bool,
    }

    output.fields(
        "Project",
        &[
            ("Id", summary.id.clone()),
            ("Name", summary.name.clone()),
            ("Spatial reference", summary.spatial_reference.clone()),
            ("Time", summary.time.clone()),
            ("Time step", summary.time_step.clone()),
            ("Plots", summary.plot_count.to_string()),
        ],
    );
    output.table(
        "Layers",
        summary
            .layers
            .into_iter()
            .map(|layer| LayerRow {
                name: layer.name,
                kind: layer.kind,
                workflow: layer.workflow,
                visible: layer.visible,
            })
            .collect(),
    );

    if summary.saved {
        output.success(format!("Project stored in {}", args.state_dir.display()));
    }

    Ok(())
}
