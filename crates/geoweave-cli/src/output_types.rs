use geoweave_lineage::OperatorSelection;
use serde::Serialize;

/// Output for lineage command
#[derive(Debug, Serialize)]
pub struct LineageOutput {
    pub layer: String,
    pub operator_count: usize,
    pub width: f64,
    pub height: f64,
    pub transform: String,
    pub nodes: Vec<LineageNodeInfo>,
    pub edges: Vec<LineageEdgeInfo>,
    pub selection: Option<OperatorSelection>,
}

#[derive(Debug, Serialize)]
pub struct LineageNodeInfo {
    pub key: String,
    pub title: String,
    pub operator: bool,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Serialize)]
pub struct LineageEdgeInfo {
    pub from: String,
    pub to: String,
    pub label: String,
}

/// Output for heights command
#[derive(Debug, Serialize)]
pub struct HeightsOutput {
    pub total_height: u32,
    pub detail_view_height: u32,
    pub map_height: u32,
    pub min_bar_height: u32,
    pub toolbar_height: u32,
    pub detail_view_visible: bool,
    pub percentage: f64,
}

/// Output for project command
#[derive(Debug, Serialize)]
pub struct ProjectOutput {
    pub id: String,
    pub name: String,
    pub spatial_reference: String,
    pub time: String,
    pub time_step: String,
    pub layers: Vec<LayerInfo>,
    pub plot_count: usize,
    pub saved: bool,
}

#[derive(Debug, Serialize)]
pub struct LayerInfo {
    pub name: String,
    pub kind: String,
    pub workflow: String,
    pub visible: bool,
}

/// Output for config command
#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    pub values: Vec<ConfigEntry>,
}

#[derive(Debug, Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub source: String,
}
