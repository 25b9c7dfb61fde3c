//! Box sizes of the lineage graph and the space it is drawn into.

use crate::graph::NodeKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphStyle {
    /// Width of every node
    pub width: f64,
    /// Height of a layer node and of the header of an operator node
    pub header_height: f64,
    pub margin: f64,
    pub operator_height: f64,
    pub border_height: f64,
    /// Margin kept free around the graph inside the viewport
    pub surrounding_margin: f64,
    /// Width of the operator detail panel next to the graph
    pub detail_component_width: f64,
    /// Share of the dialog width used by the svg
    pub svg_ratio: f64,
}

impl Default for GraphStyle {
    fn default() -> Self {
        Self {
            width: 200.0,
            header_height: 48.0,
            margin: 5.0,
            operator_height: 136.0,
            border_height: 1.0,
            surrounding_margin: 40.0,
            detail_component_width: 200.0,
            svg_ratio: 0.7,
        }
    }
}

impl GraphStyle {
    /// Box size of a node of the given kind
    pub fn node_size(&self, kind: &NodeKind) -> (f64, f64) {
        match kind {
            NodeKind::Operator { .. } => (self.width, self.operator_height),
            NodeKind::Layer { .. } => (self.width, self.header_height),
        }
    }
}

/// The bounds of the dialog the graph is shown in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportBounds {
    pub max_width: f64,
    pub max_height: f64,
}

impl ViewportBounds {
    /// Bounds for a dialog of `max_width` in a window of `window_height`
    pub fn for_dialog(max_width: f64, window_height: f64, rem_px: f64) -> Self {
        Self {
            max_width: max_width - 2.0 * rem_px,
            max_height: window_height * 0.8,
        }
    }

    pub fn svg_width(&self, style: &GraphStyle) -> f64 {
        (style.svg_ratio * self.max_width).ceil()
    }

    pub fn svg_height(&self) -> f64 {
        self.max_height
    }

    /// The area used to fit a graph of `graph_width`
    pub fn fit_area(&self, style: &GraphStyle, graph_width: f64) -> (f64, f64) {
        let width = (self.max_width - style.detail_component_width - style.surrounding_margin)
            .min(graph_width);
        (width, self.max_height)
    }
}
