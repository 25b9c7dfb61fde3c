//! Geoweave Lineage - Operator lineage graphs
//!
//! This crate turns the operator tree behind a layer into a graph, lays it
//! out top to bottom and renders it as SVG with pan, zoom and per-operator
//! parameter inspection.

pub mod graph;
pub mod icon;
pub mod layout;
pub mod render;
pub mod style;
pub mod view;
pub mod viewport;

pub use graph::{EdgeView, LineageEdge, LineageGraph, LineageNode, NodeKind, Point};
pub use icon::create_icon_data_url;
pub use layout::{fix_label_positions, LayeredLayout, LayoutEngine};
pub use render::render_svg;
pub use style::{GraphStyle, ViewportBounds};
pub use view::{parameters_display_list, LineageView, OperatorSelection, ParameterEntry};
pub use viewport::{PanZoom, ZoomTransform};
