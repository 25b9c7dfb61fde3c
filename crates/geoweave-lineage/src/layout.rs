//! Top-to-bottom layered layout.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use tracing::warn;

use crate::graph::{LineageGraph, Point};

/// Assigns node centers and the overall graph size
pub trait LayoutEngine {
    fn layout(&self, graph: &mut LineageGraph) -> (f64, f64);
}

/// Ranks nodes by their longest path from a source operator and orders each
/// rank by the barycenter of its predecessors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayeredLayout {
    pub node_separation: f64,
    pub rank_separation: f64,
    pub margin: f64,
    pub ordering_sweeps: usize,
}

impl Default for LayeredLayout {
    fn default() -> Self {
        Self {
            node_separation: 50.0,
            rank_separation: 50.0,
            margin: 0.0,
            ordering_sweeps: 4,
        }
    }
}

impl LayeredLayout {
    fn ranks(graph: &LineageGraph) -> HashMap<NodeIndex, usize> {
        let g = graph.petgraph();
        let order = match toposort(g, None) {
            Ok(order) => order,
            Err(cycle) => {
                warn!(node = ?cycle.node_id(), "Lineage graph has a cycle, using a single rank");
                return g.node_indices().map(|index| (index, 0)).collect();
            }
        };

        let mut ranks = HashMap::new();
        for index in order {
            let rank = g
                .neighbors_directed(index, Direction::Incoming)
                .filter_map(|source| ranks.get(&source))
                .map(|rank| rank + 1)
                .max()
                .unwrap_or(0);
            ranks.insert(index, rank);
        }
        ranks
    }

    fn order_ranks(&self, graph: &LineageGraph, ranks: &HashMap<NodeIndex, usize>) -> Vec<Vec<NodeIndex>> {
        let g = graph.petgraph();
        let rank_count = ranks.values().max().map_or(0, |max| max + 1);
        let mut layers: Vec<Vec<NodeIndex>> = vec![Vec::new(); rank_count];
        for index in g.node_indices() {
            layers[ranks[&index]].push(index);
        }

        for sweep in 0..self.ordering_sweeps {
            let downward = sweep % 2 == 0;
            let (direction, rank_order): (Direction, Vec<usize>) = if downward {
                (Direction::Incoming, (1..rank_count).collect())
            } else {
                (Direction::Outgoing, (0..rank_count.saturating_sub(1)).rev().collect())
            };

            for rank in rank_order {
                let neighbor_rank = if downward { rank - 1 } else { rank + 1 };
                let positions: HashMap<NodeIndex, usize> = layers[neighbor_rank]
                    .iter()
                    .enumerate()
                    .map(|(position, &index)| (index, position))
                    .collect();

                let mut keyed: Vec<(f64, usize, NodeIndex)> = layers[rank]
                    .iter()
                    .enumerate()
                    .map(|(current, &index)| {
                        let neighbors: Vec<usize> = g
                            .neighbors_directed(index, direction)
                            .filter_map(|neighbor| positions.get(&neighbor).copied())
                            .collect();
                        let barycenter = if neighbors.is_empty() {
                            current as f64
                        } else {
                            neighbors.iter().sum::<usize>() as f64 / neighbors.len() as f64
                        };
                        (barycenter, current, index)
                    })
                    .collect();
                keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                layers[rank] = keyed.into_iter().map(|(_, _, index)| index).collect();
            }
        }
        layers
    }
}

impl LayoutEngine for LayeredLayout {
    fn layout(&self, graph: &mut LineageGraph) -> (f64, f64) {
        let ranks = Self::ranks(graph);
        let layers = self.order_ranks(graph, &ranks);

        let (row_widths, row_heights): (Vec<f64>, Vec<f64>) = {
            let g = graph.petgraph();
            layers
                .iter()
                .map(|layer| {
                    let width = layer.iter().map(|&index| g[index].width).sum::<f64>()
                        + self.node_separation * layer.len().saturating_sub(1) as f64;
                    let height = layer
                        .iter()
                        .map(|&index| g[index].height)
                        .fold(0.0, f64::max);
                    (width, height)
                })
                .unzip()
        };

        let content_width = row_widths.iter().copied().fold(0.0, f64::max);
        let g = graph.petgraph_mut();
        let mut y = self.margin;
        for (rank, layer) in layers.iter().enumerate() {
            let mut x = self.margin + (content_width - row_widths[rank]) / 2.0;
            let center_y = y + row_heights[rank] / 2.0;
            for &index in layer {
                let node = &mut g[index];
                node.position = Some(Point::new(x + node.width / 2.0, center_y));
                x += node.width + self.node_separation;
            }
            y += row_heights[rank] + self.rank_separation;
        }

        let content_height = row_heights.iter().sum::<f64>()
            + self.rank_separation * layers.len().saturating_sub(1) as f64;
        let size = (
            content_width + 2.0 * self.margin,
            content_height + 2.0 * self.margin,
        );
        graph.size = Some(size);
        size
    }
}

/// Move every label box from the node center to the top-left corner of its node box
pub fn fix_label_positions(graph: &mut LineageGraph) {
    let style = *graph.style();
    for node in graph.nodes_mut() {
        let (width, height) = style.node_size(&node.kind);
        node.label_offset = Point::new(-width / 2.0, -height / 2.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoweave_core::models::{Layer, Operator, Symbology, WorkflowId};

    fn layer() -> Layer {
        Layer::new("Out", WorkflowId::new(), Symbology::default_raster())
    }

    #[test]
    fn test_sources_above_consumers() {
        let root = Operator::new("Expression")
            .with_source("a", Operator::new("A"))
            .with_source("b", Operator::new("B"));
        let mut graph = LineageGraph::build(&root, &layer());
        let (width, height) = LayeredLayout::default().layout(&mut graph);

        let y = |key: &str| graph.node(key).unwrap().position.unwrap().y;
        assert!(y("operator_1") < y("operator_0"));
        assert_eq!(y("operator_1"), y("operator_2"));

        let layer_node = graph.nodes().find(|node| !node.is_operator()).unwrap();
        assert!(layer_node.position.unwrap().y > y("operator_0"));

        assert_eq!(width, 450.0);
        assert_eq!(height, 136.0 + 50.0 + 136.0 + 50.0 + 48.0);
        assert_eq!(graph.size, Some((width, height)));
    }

    #[test]
    fn test_single_node_row_is_centered() {
        let root = Operator::new("Expression")
            .with_source("a", Operator::new("A"))
            .with_source("b", Operator::new("B"));
        let mut graph = LineageGraph::build(&root, &layer());
        LayeredLayout::default().layout(&mut graph);

        let root_x = graph.node("operator_0").unwrap().position.unwrap().x;
        assert_eq!(root_x, 225.0);
    }

    #[test]
    fn test_fix_label_positions_uses_node_box() {
        let mut graph = LineageGraph::build(&Operator::new("GdalSource"), &layer());
        fix_label_positions(&mut graph);

        let operator = graph.node("operator_0").unwrap();
        assert_eq!(operator.label_offset, Point::new(-100.0, -68.0));
        let layer_node = graph.nodes().find(|node| !node.is_operator()).unwrap();
        assert_eq!(layer_node.label_offset, Point::new(-100.0, -24.0));
    }
}
