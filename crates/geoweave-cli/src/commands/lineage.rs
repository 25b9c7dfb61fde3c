//! Lineage command implementation

use crate::cli::{LineageArgs, LineageFormat};
use crate::output::OutputWriter;
use crate::output_types::{LineageEdgeInfo, LineageNodeInfo, LineageOutput};
use anyhow::{bail, Context, Result};
use geoweave_core::config::LayeredConfig;
use geoweave_core::models::{Layer, Operator, Symbology, WorkflowId, WorkflowKind};
use geoweave_core::ports::SessionTokenProvider;
use geoweave_lineage::{render_svg, LayeredLayout, LineageGraph, LineageView, ViewportBounds};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tabled::Tabled;

pub async fn execute(
    args: LineageArgs,
    config: &LayeredConfig,
    token: Option<String>,
    output: &OutputWriter,
) -> Result<()> {
    let (operator, kind, workflow_id) = match (&args.file, &args.workflow) {
        (Some(path), _) => {
            let (operator, kind) = read_workflow_file(path)?;
            (operator, kind, WorkflowId::new())
        }
        (None, Some(id)) => {
            let id: WorkflowId = id
                .parse()
                .with_context(|| format!("Invalid workflow id: {}", id))?;
            let (backend, session) = super::connect(&config.api_url.value, token)?;
            let token = session.session_token_for_request().await?;
            let workflow = backend
                .get_workflow(id, &token)
                .await
                .with_context(|| format!("Failed to load workflow {}", id))?;
            (workflow.operator, workflow.kind, id)
        }
        (None, None) => bail!("Pass a workflow file or --workflow <ID>"),
    };

    let layer = Layer::new(args.layer_name.clone(), workflow_id, symbology_for(kind));
    let bounds = ViewportBounds::for_dialog(args.width, args.height, args.rem);
    let graph = LineageGraph::build(&operator, &layer);
    let mut view = LineageView::new(graph, &LayeredLayout::default(), bounds);

    let selection = match &args.select {
        Some(key) => Some(
            view.click(key)
                .with_context(|| format!("'{}' is not an operator node of the graph", key))?,
        ),
        None => None,
    };

    if args.format == LineageFormat::Svg {
        let svg = render_svg(&view, &bounds);
        match &args.output {
            Some(path) => {
                fs::write(path, svg)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                output.success(format!("Lineage drawing written to {}", path.display()));
            }
            None => output.raw(svg),
        }
        return Ok(());
    }
    if args.output.is_some() {
        output.warning("--output only applies to --format svg");
    }

    let graph = view.graph();
    let (width, height) = graph.size.unwrap_or_default();
    let nodes: Vec<LineageNodeInfo> = graph
        .nodes()
        .map(|node| {
            let position = node.position.unwrap_or_default();
            LineageNodeInfo {
                key: node.key.clone(),
                title: node.title().to_string(),
                operator: node.is_operator(),
                x: position.x,
                y: position.y,
            }
        })
        .collect();
    let edges: Vec<LineageEdgeInfo> = graph
        .edges()
        .into_iter()
        .map(|edge| LineageEdgeInfo {
            from: edge.from,
            to: edge.to,
            label: edge.label,
        })
        .collect();

    if output.is_json() {
        output.result(LineageOutput {
            layer: layer.name.clone(),
            operator_count: graph.operator_count(),
            width,
            height,
            transform: view.transform().to_css(),
            nodes,
            edges,
            selection,
        })?;
        return Ok(());
    }

    #[derive(Tabled)]
    struct NodeRow {
        #[tabled(rename = "Node")]
        key: String,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Position")]
        position: String,
    }

    #[derive(Tabled)]
    struct EdgeRow {
        #[tabled(rename = "From")]
        from: String,
        #[tabled(rename = "To")]
        to: String,
        #[tabled(rename = "Slot")]
        label: String,
    }

    #[derive(Tabled)]
    struct ParameterRow {
        #[tabled(rename = "Parameter")]
        key: String,
        #[tabled(rename = "Value")]
        value: String,
    }

    output.fields(
        "Lineage",
        &[
            ("Layer", layer.name.clone()),
            ("Operators", graph.operator_count().to_string()),
            ("Size", format!("{:.0} x {:.0}", width, height)),
            ("Transform", view.transform().to_string()),
        ],
    );
    output.table(
        "Nodes",
        nodes
            .into_iter()
            .map(|node| NodeRow {
                key: node.key,
                title: node.title,
                position: format!("{:.0}, {:.0}", node.x, node.y),
            })
            .collect(),
    );

    output.table(
        "Edges",
        edges
            .into_iter()
            .map(|edge| EdgeRow {
                from: edge.from,
                to: edge.to,
                label: edge.label,
            })
            .collect(),
    );

    if let Some(selection) = selection {
        output.table(
            format!("Selected operator: {}", selection.operator.operator_type),
            selection
                .parameters
                .into_iter()
                .map(|entry| ParameterRow {
                    key: entry.key,
                    value: entry.value,
                })
                .collect(),
        );
    }

    Ok(())
}

/// Read a workflow document, or a bare operator which is taken as a raster workflow
fn read_workflow_file(path: &Path) -> Result<(Operator, WorkflowKind)> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse workflow file {}", path.display()))?;

    match value.get("operator") {
        Some(operator) => {
            let kind = match value.get("type") {
                Some(kind) => serde_json::from_value(kind.clone())
                    .context("Unknown workflow type, expected Raster, Vector or Plot")?,
                None => WorkflowKind::Raster,
            };
            Ok((Operator::from_value(operator)?, kind))
        }
        None => Ok((Operator::from_value(&value)?, WorkflowKind::Raster)),
    }
}

fn symbology_for(kind: WorkflowKind) -> Symbology {
    match kind {
        WorkflowKind::Vector => Symbology::default_point(),
        WorkflowKind::Raster | WorkflowKind::Plot => Symbology::default_raster(),
    }
}
