//! Building the lineage graph of a layer.
//!
//! The operator tree is walked depth first with an explicit stack. Every
//! operator gets the next free id in the order it is discovered, so the
//! root is `operator_0`. Children are pushed in source slot order and popped
//! last-in first-out, which only affects the node order, not the edge set.
//! An operator referenced twice shows up twice.

use std::collections::HashMap;

use geoweave_core::error::Result;
use geoweave_core::models::{Layer, Operator, WorkflowId};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde_json::Value;
use tracing::debug;

use crate::style::GraphStyle;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Operator { id: usize, operator: Operator },
    Layer { name: String, workflow_id: WorkflowId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineageNode {
    pub key: String,
    pub kind: NodeKind,
    pub width: f64,
    pub height: f64,
    /// Center of the node, set by a layout engine
    pub position: Option<Point>,
    /// Offset of the label box relative to the node center
    pub label_offset: Point,
}

impl LineageNode {
    fn new(key: String, kind: NodeKind, style: &GraphStyle) -> Self {
        let (width, height) = style.node_size(&kind);
        Self {
            key,
            kind,
            width,
            height,
            position: None,
            label_offset: Point::default(),
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(self.kind, NodeKind::Operator { .. })
    }

    pub fn operator(&self) -> Option<&Operator> {
        match &self.kind {
            NodeKind::Operator { operator, .. } => Some(operator),
            NodeKind::Layer { .. } => None,
        }
    }

    /// Type name of an operator node, name of a layer node
    pub fn title(&self) -> &str {
        match &self.kind {
            NodeKind::Operator { operator, .. } => &operator.operator_type,
            NodeKind::Layer { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineageEdge {
    /// From a source operator into the slot of its consumer
    Source { slot: String },
    /// From the root operator into the layer
    Layer,
}

impl LineageEdge {
    pub fn label(&self) -> &str {
        match self {
            Self::Source { slot } => slot,
            Self::Layer => "",
        }
    }
}

/// An edge by node keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeView {
    pub from: String,
    pub to: String,
    pub label: String,
}

pub struct LineageGraph {
    graph: DiGraph<LineageNode, LineageEdge>,
    keys: HashMap<String, NodeIndex>,
    style: GraphStyle,
    /// Size of the laid out graph
    pub size: Option<(f64, f64)>,
}

pub fn operator_key(id: usize) -> String {
    format!("operator_{}", id)
}

pub fn layer_key(workflow_id: WorkflowId) -> String {
    format!("layer_{}", workflow_id)
}

impl LineageGraph {
    pub fn build(root: &Operator, layer: &Layer) -> Self {
        Self::build_with_style(root, layer, GraphStyle::default())
    }

    pub fn build_with_style(root: &Operator, layer: &Layer, style: GraphStyle) -> Self {
        let mut lineage = Self {
            graph: DiGraph::new(),
            keys: HashMap::new(),
            style,
            size: None,
        };

        let mut next_id = 0;
        let mut stack: Vec<(usize, &Operator)> = vec![(next_id, root)];
        next_id += 1;
        let mut edges: Vec<(usize, usize, String)> = Vec::new();

        while let Some((id, operator)) = stack.pop() {
            lineage.add_node(
                operator_key(id),
                NodeKind::Operator {
                    id,
                    operator: operator.clone(),
                },
            );

            for (slot, source) in &operator.sources {
                for child in source.operators() {
                    let child_id = next_id;
                    next_id += 1;
                    stack.push((child_id, child));
                    edges.push((child_id, id, slot.clone()));
                }
            }
        }

        for (child, parent, slot) in edges {
            lineage.add_edge(&operator_key(child), &operator_key(parent), LineageEdge::Source { slot });
        }

        let layer_node = layer_key(layer.workflow_id);
        lineage.add_node(
            layer_node.clone(),
            NodeKind::Layer {
                name: layer.name.clone(),
                workflow_id: layer.workflow_id,
            },
        );
        lineage.add_edge(&operator_key(0), &layer_node, LineageEdge::Layer);

        debug!(
            layer = %layer.name,
            operators = next_id,
            "Built lineage graph"
        );
        lineage
    }

    /// Build from the JSON operator tree of a workflow
    pub fn from_json(root: &Value, layer: &Layer) -> Result<Self> {
        let operator = Operator::from_value(root)?;
        Ok(Self::build(&operator, layer))
    }

    fn add_node(&mut self, key: String, kind: NodeKind) {
        let node = LineageNode::new(key.clone(), kind, &self.style);
        let index = self.graph.add_node(node);
        self.keys.insert(key, index);
    }

    fn add_edge(&mut self, from: &str, to: &str, edge: LineageEdge) {
        if let (Some(&from), Some(&to)) = (self.keys.get(from), self.keys.get(to)) {
            self.graph.add_edge(from, to, edge);
        }
    }

    pub fn style(&self) -> &GraphStyle {
        &self.style
    }

    pub fn node(&self, key: &str) -> Option<&LineageNode> {
        self.keys.get(key).map(|&index| &self.graph[index])
    }

    pub fn node_mut(&mut self, key: &str) -> Option<&mut LineageNode> {
        let index = *self.keys.get(key)?;
        Some(&mut self.graph[index])
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &LineageNode> {
        self.graph.node_weights()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut LineageNode> {
        self.graph.node_weights_mut()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn operator_count(&self) -> usize {
        self.nodes().filter(|node| node.is_operator()).count()
    }

    pub fn edges(&self) -> Vec<EdgeView> {
        self.graph
            .edge_references()
            .map(|edge| EdgeView {
                from: self.graph[edge.source()].key.clone(),
                to: self.graph[edge.target()].key.clone(),
                label: edge.weight().label().to_string(),
            })
            .collect()
    }

    /// Keys of the nodes with an edge into `key`
    pub fn sources_of(&self, key: &str) -> Vec<&str> {
        let Some(&index) = self.keys.get(key) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(index, Direction::Incoming)
            .map(|source| self.graph[source].key.as_str())
            .collect()
    }

    pub(crate) fn petgraph(&self) -> &DiGraph<LineageNode, LineageEdge> {
        &self.graph
    }

    pub(crate) fn petgraph_mut(&mut self) -> &mut DiGraph<LineageNode, LineageEdge> {
        &mut self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoweave_core::models::Symbology;
    use serde_json::json;

    fn layer() -> Layer {
        Layer::new("NDVI", WorkflowId::new(), Symbology::default_raster())
    }

    #[test]
    fn test_source_operator_only() {
        let layer = layer();
        let graph = LineageGraph::build(&Operator::new("GdalSource"), &layer);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(
            graph.edges(),
            vec![EdgeView {
                from: "operator_0".to_string(),
                to: layer_key(layer.workflow_id),
                label: String::new(),
            }]
        );
    }

    #[test]
    fn test_ids_follow_discovery_order() {
        let root = Operator::new("Expression")
            .with_source("a", Operator::new("A").with_source("raster", Operator::new("A1")))
            .with_source("b", Operator::new("B"));
        let graph = LineageGraph::build(&root, &layer());

        // root 0; a=1, b=2 discovered with the root; B is popped first, then A, whose child gets 3
        let keys: Vec<&str> = graph.nodes().map(|node| node.key.as_str()).collect();
        assert_eq!(keys[..4], ["operator_0", "operator_2", "operator_1", "operator_3"]);
        assert_eq!(graph.node("operator_3").unwrap().title(), "A1");

        let edges = graph.edges();
        assert!(edges.contains(&EdgeView {
            from: "operator_3".to_string(),
            to: "operator_1".to_string(),
            label: "raster".to_string(),
        }));
        assert_eq!(graph.sources_of("operator_0"), vec!["operator_2", "operator_1"]);
    }

    #[test]
    fn test_from_json_reports_malformed_path() {
        let json = json!({
            "type": "Expression",
            "params": {"expression": "A + B"},
            "sources": {"rasters": [{"type": "GdalSource"}, {"params": {}}]}
        });
        let error = LineageGraph::from_json(&json, &layer()).err().unwrap();
        assert!(error.to_string().contains("$.sources.rasters[1]"));
    }

    #[test]
    fn test_node_sizes_follow_style() {
        let graph = LineageGraph::build(&Operator::new("GdalSource"), &layer());
        let operator = graph.node("operator_0").unwrap();
        assert_eq!((operator.width, operator.height), (200.0, 136.0));

        let layer_node = graph.nodes().find(|node| !node.is_operator()).unwrap();
        assert_eq!((layer_node.width, layer_node.height), (200.0, 48.0));
        assert_eq!(layer_node.title(), "NDVI");
    }
}
