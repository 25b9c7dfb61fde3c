use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Geoweave - Compose and inspect geoprocessing workflows
#[derive(Parser, Debug)]
#[command(name = "geoweave")]
#[command(about = "Compose and inspect geoprocessing workflows", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to ./geoweave.toml if present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Backend API URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Session token for backend requests
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the operator graph behind a workflow
    Lineage(LineageArgs),

    /// Compute the map and detail view heights of the layout
    Heights(HeightsArgs),

    /// Restore the stored project and show it
    Project(ProjectArgs),

    /// Show configuration values and where they come from
    Config,
}

/// Lineage output selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LineageFormat {
    /// Node and edge tables
    Table,
    /// SVG drawing of the laid out graph
    Svg,
}

#[derive(Parser, Debug)]
pub struct LineageArgs {
    /// Workflow JSON file, either a workflow or a bare operator
    #[arg(required_unless_present = "workflow", conflicts_with = "workflow")]
    pub file: Option<PathBuf>,

    /// Id of a workflow registered on the backend
    #[arg(long, value_name = "ID")]
    pub workflow: Option<String>,

    /// Name of the layer the workflow feeds
    #[arg(long, default_value = "Layer")]
    pub layer_name: String,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: LineageFormat,

    /// Node key of an operator to select, e.g. operator_1
    #[arg(long, value_name = "KEY")]
    pub select: Option<String>,

    /// Width of the dialog the graph is shown in
    #[arg(long, default_value = "1200")]
    pub width: f64,

    /// Height of the window the dialog is shown in
    #[arg(long, default_value = "800")]
    pub height: f64,

    /// Root font size in pixels
    #[arg(long, default_value = "16")]
    pub rem: f64,

    /// Write the SVG to this file instead of stdout
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Viewport classes of the layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Viewport {
    Desktop,
    HandsetPortrait,
    HandsetLandscape,
}

#[derive(Parser, Debug)]
pub struct HeightsArgs {
    /// Total height available to map and detail view, in pixels
    #[arg(long)]
    pub total: u32,

    /// Share of the total height taken by the detail view (0 to 1)
    #[arg(long)]
    pub percentage: Option<f64>,

    /// Viewport class deciding the minimal bar height
    #[arg(long, default_value = "desktop")]
    pub viewport: Viewport,

    /// Compute the heights with the detail view hidden
    #[arg(long)]
    pub detail_hidden: bool,

    /// Root font size in pixels
    #[arg(long, default_value = "16")]
    pub rem: f64,
}

#[derive(Parser, Debug)]
pub struct ProjectArgs {
    /// Directory holding the stored project and layout
    #[arg(long, default_value = ".geoweave")]
    pub state_dir: PathBuf,

    /// Rename the project and store the change
    #[arg(long)]
    pub rename: Option<String>,

    /// Work against an in-memory backend instead of the API
    #[arg(long)]
    pub offline: bool,
}
