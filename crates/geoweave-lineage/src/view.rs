//! Interactive state of a drawn lineage graph.

use futures::stream::{BoxStream, StreamExt};
use geoweave_core::models::Operator;
use geoweave_core::reactive::Subject;
use serde::Serialize;
use tracing::debug;

use crate::graph::LineageGraph;
use crate::icon::create_icon_data_url;
use crate::layout::{fix_label_positions, LayoutEngine};
use crate::style::ViewportBounds;
use crate::viewport::{PanZoom, ZoomTransform};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterEntry {
    pub key: String,
    pub value: String,
}

/// Published when an operator node is clicked
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorSelection {
    pub operator: Operator,
    pub icon: String,
    pub parameters: Vec<ParameterEntry>,
}

/// The parameters of an operator as pretty printed JSON, bare strings without quotes
pub fn parameters_display_list(operator: &Operator) -> Vec<ParameterEntry> {
    let Some(params) = &operator.params else {
        return Vec::new();
    };

    params
        .iter()
        .map(|(key, value)| {
            let mut value = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                value = value[1..value.len() - 1].to_string();
            }
            ParameterEntry {
                key: key.clone(),
                value,
            }
        })
        .collect()
}

pub struct LineageView {
    graph: LineageGraph,
    highlighted: Option<String>,
    selection: Subject<OperatorSelection>,
    pan_zoom: PanZoom,
}

impl LineageView {
    /// Lay out `graph` and fit it into `bounds`
    pub fn new(mut graph: LineageGraph, layout: &dyn LayoutEngine, bounds: ViewportBounds) -> Self {
        let size = layout.layout(&mut graph);
        fix_label_positions(&mut graph);

        let style = *graph.style();
        let area = bounds.fit_area(&style, size.0);
        let initial = ZoomTransform::fit(area, size, style.surrounding_margin);
        debug!(width = size.0, height = size.1, scale = initial.k, "Fitted lineage graph");

        Self {
            graph,
            highlighted: None,
            selection: Subject::replay(),
            pan_zoom: PanZoom::new(initial),
        }
    }

    pub fn graph(&self) -> &LineageGraph {
        &self.graph
    }

    pub fn pan_zoom(&mut self) -> &mut PanZoom {
        &mut self.pan_zoom
    }

    pub fn transform(&self) -> ZoomTransform {
        self.pan_zoom.transform()
    }

    /// Select the operator behind `node_key`; clicks on the layer node are ignored
    pub fn click(&mut self, node_key: &str) -> Option<OperatorSelection> {
        let operator = self.graph.node(node_key)?.operator()?.clone();

        let selection = OperatorSelection {
            icon: create_icon_data_url(&operator.operator_type),
            parameters: parameters_display_list(&operator),
            operator,
        };
        self.highlighted = Some(node_key.to_string());
        self.selection.next(selection.clone());
        Some(selection)
    }

    pub fn highlighted(&self) -> Option<&str> {
        self.highlighted.as_deref()
    }

    pub fn is_highlighted(&self, node_key: &str) -> bool {
        self.highlighted.as_deref() == Some(node_key)
    }

    pub fn selection(&self) -> Option<OperatorSelection> {
        self.selection.get()
    }

    pub fn selection_stream(&self) -> BoxStream<'static, OperatorSelection> {
        self.selection.subscribe().boxed()
    }
}
