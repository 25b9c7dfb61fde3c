//! SVG output of a laid out lineage graph.

use std::fmt::Write;

use quick_xml::escape::escape;

use crate::graph::{LineageNode, NodeKind, Point};
use crate::icon::create_icon_data_url;
use crate::style::ViewportBounds;
use crate::view::{parameters_display_list, LineageView};

fn label_html(node: &LineageNode) -> String {
    match &node.kind {
        NodeKind::Operator { operator, .. } => {
            let rows: Vec<String> = parameters_display_list(operator)
                .iter()
                .map(|entry| {
                    format!(
                        "<td class=\"key\">{}</td><td class=\"value\">{}</td>",
                        escape(&entry.key),
                        escape(&entry.value)
                    )
                })
                .collect();
            format!(
                "<div class=\"header\"><img src=\"{}\" class=\"icon\" alt=\"{}\"/>{}</div>\
                 <div class=\"parameters\"><table><tr>{}</tr></table></div>",
                escape(&create_icon_data_url(&operator.operator_type)),
                escape(&operator.operator_type),
                escape(&operator.operator_type),
                rows.join("</tr><tr>")
            )
        }
        NodeKind::Layer { name, .. } => format!("<div class=\"header\">{}</div>", escape(name)),
    }
}

fn node_classes(node: &LineageNode, highlighted: bool) -> String {
    let mut classes = match node.kind {
        NodeKind::Operator { .. } => format!("node operator {}", node.key),
        NodeKind::Layer { .. } => "node layer".to_string(),
    };
    if highlighted {
        classes.push_str(" highlight");
    }
    classes
}

/// Draw the view's graph with its current transform and highlight
pub fn render_svg(view: &LineageView, bounds: &ViewportBounds) -> String {
    let graph = view.graph();
    let style = graph.style();
    let position = |key: &str| {
        graph
            .node(key)
            .and_then(|node| node.position.map(|p| (p, node.height)))
    };

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\">",
        bounds.svg_width(style),
        bounds.svg_height()
    );
    svg.push_str(
        "<defs><marker id=\"arrowhead\" viewBox=\"0 0 10 10\" refX=\"9\" refY=\"5\" \
         markerWidth=\"8\" markerHeight=\"6\" orient=\"auto\"><path d=\"M0,0L10,5L0,10z\"/></marker></defs>",
    );
    let _ = write!(svg, "<g transform=\"{}\">", view.transform().to_css());

    svg.push_str("<g class=\"edgePaths\">");
    for edge in graph.edges() {
        let (Some((from, from_height)), Some((to, to_height))) =
            (position(&edge.from), position(&edge.to))
        else {
            continue;
        };
        let start = Point::new(from.x, from.y + from_height / 2.0);
        let end = Point::new(to.x, to.y - to_height / 2.0);
        let class = if edge.label.is_empty() {
            "edgePath layer-edge"
        } else {
            "edgePath"
        };
        let _ = write!(
            svg,
            "<g class=\"{}\"><path d=\"M{},{}L{},{}\" marker-end=\"url(#arrowhead)\"/>",
            class, start.x, start.y, end.x, end.y
        );
        if !edge.label.is_empty() {
            let _ = write!(
                svg,
                "<text class=\"edgeLabel\" x=\"{}\" y=\"{}\">{}</text>",
                (start.x + end.x) / 2.0,
                (start.y + end.y) / 2.0,
                escape(&edge.label)
            );
        }
        svg.push_str("</g>");
    }
    svg.push_str("</g>");

    svg.push_str("<g class=\"nodes\">");
    for node in graph.nodes() {
        let Some(center) = node.position else {
            continue;
        };
        let _ = write!(
            svg,
            "<g class=\"{}\" id=\"{}\" transform=\"translate({},{})\">",
            node_classes(node, view.is_highlighted(&node.key)),
            escape(&node.key),
            center.x,
            center.y
        );
        let _ = write!(
            svg,
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"/>",
            -node.width / 2.0,
            -node.height / 2.0,
            node.width,
            node.height
        );
        let _ = write!(
            svg,
            "<g class=\"label\"><foreignObject x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\">{}</foreignObject></g></g>",
            node.label_offset.x,
            node.label_offset.y,
            node.width,
            node.height,
            label_html(node)
        );
    }
    svg.push_str("</g></g></svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LineageGraph;
    use crate::layout::LayeredLayout;
    use geoweave_core::models::{Layer, Operator, Symbology, WorkflowId};
    use serde_json::json;

    fn view() -> LineageView {
        let root = Operator::new("Expression")
            .with_param("expression", json!("A < B && B > 0"))
            .with_source("raster", Operator::new("GdalSource"));
        let layer = Layer::new("Rivers & Lakes", WorkflowId::new(), Symbology::default_raster());
        LineageView::new(
            LineageGraph::build(&root, &layer),
            &LayeredLayout::default(),
            ViewportBounds {
                max_width: 1000.0,
                max_height: 600.0,
            },
        )
    }

    #[test]
    fn test_svg_contains_nodes_edges_and_labels() {
        let svg = render_svg(&view(), &ViewportBounds {
            max_width: 1000.0,
            max_height: 600.0,
        });

        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("id=\"operator_0\""));
        assert!(svg.contains("id=\"operator_1\""));
        assert!(svg.contains("class=\"edgeLabel\""));
        assert!(svg.contains(">raster</text>"));
        assert!(svg.contains("layer-edge"));
        assert!(svg.contains("width=\"700\""));
    }

    #[test]
    fn test_svg_escapes_text() {
        let svg = render_svg(&view(), &ViewportBounds {
            max_width: 1000.0,
            max_height: 600.0,
        });
        assert!(svg.contains("A &lt; B &amp;&amp; B &gt; 0"));
        assert!(svg.contains("Rivers &amp; Lakes"));
        assert!(!svg.contains("Rivers & Lakes"));
    }

    #[test]
    fn test_svg_marks_highlight() {
        let mut view = view();
        view.click("operator_1");
        let svg = render_svg(&view, &ViewportBounds {
            max_width: 1000.0,
            max_height: 600.0,
        });
        assert!(svg.contains("class=\"node operator operator_1 highlight\""));
        assert!(svg.contains("class=\"node operator operator_0\""));
    }
}
