//! SVG rendering of placed diagrams.

use svg::{self, node::element as svg_element};

use viewsync_core::layout::{Diagram, PlacedEdge, PlacedNode};

const ARROW_MARKER_ID: &str = "arrow-head";
const TITLE_HEIGHT: f32 = 24.0;

fn arrow_marker_definitions() -> svg_element::Definitions {
    let head = svg_element::Path::new()
        .set("d", "M 0 0 L 10 5 L 0 10 z")
        .set("fill", "#333333");
    let marker = svg_element::Marker::new()
        .set("id", ARROW_MARKER_ID)
        .set("viewBox", "0 0 10 10")
        .set("refX", 10)
        .set("refY", 5)
        .set("markerWidth", 8)
        .set("markerHeight", 8)
        .set("orient", "auto")
        .add(head);
    svg_element::Definitions::new().add(marker)
}

fn render_node(node: &PlacedNode) -> svg_element::Group {
    let bounds = node.bounds();
    let size = bounds.to_size();
    let center = bounds.center();

    let rect = svg_element::Rectangle::new()
        .set("x", bounds.min_point().x())
        .set("y", bounds.min_point().y())
        .set("width", size.width())
        .set("height", size.height())
        .set("rx", 6)
        .set("fill", "#ffffff")
        .set("stroke", "#333333")
        .set("stroke-width", 1.5);

    let text = svg_element::Text::new(node.title())
        .set("x", center.x())
        .set("y", center.y())
        .set("text-anchor", "middle")
        .set("dominant-baseline", "middle")
        .set("font-family", "sans-serif")
        .set("font-size", 14);

    svg_element::Group::new()
        .set("class", format!("node {}", node.kind()))
        .add(rect)
        .add(text)
}

fn render_edge(edge: &PlacedEdge) -> svg_element::Group {
    let mut path_data = String::new();
    for (i, point) in edge.points().iter().enumerate() {
        let command = if i == 0 { 'M' } else { 'L' };
        path_data.push_str(&format!("{command} {} {} ", point.x(), point.y()));
    }

    let path = svg_element::Path::new()
        .set("d", path_data.trim_end())
        .set("fill", "none")
        .set("stroke", "#333333")
        .set("stroke-width", 1.2)
        .set("marker-end", format!("url(#{ARROW_MARKER_ID})"));

    let mut group = svg_element::Group::new().set("class", "edge").add(path);

    if let (Some(label), Some(first), Some(last)) =
        (edge.label(), edge.points().first(), edge.points().last())
    {
        let middle = first.midpoint(*last);
        let text = svg_element::Text::new(label)
            .set("x", middle.x())
            .set("y", middle.y() - 6.0)
            .set("text-anchor", "middle")
            .set("font-family", "sans-serif")
            .set("font-size", 12);
        group = group.add(text);
    }

    group
}

/// Renders `diagram` to a standalone SVG document.
pub fn render(diagram: &Diagram) -> String {
    let width = diagram.width();
    let height = diagram.height() + TITLE_HEIGHT;

    let doc = svg::Document::new()
        .set("viewBox", format!("0 0 {width} {height}"))
        .set("width", width)
        .set("height", height)
        .add(arrow_marker_definitions());

    let title = svg_element::Text::new(diagram.title())
        .set("x", width / 2.0)
        .set("y", TITLE_HEIGHT / 2.0 + 4.0)
        .set("text-anchor", "middle")
        .set("font-family", "sans-serif")
        .set("font-size", 16)
        .set("font-weight", "bold");

    let mut content = svg_element::Group::new().set("transform", format!("translate(0, {TITLE_HEIGHT})"));
    for edge in diagram.edges() {
        content = content.add(render_edge(edge));
    }
    for node in diagram.nodes() {
        content = content.add(render_node(node));
    }

    doc.add(title).add(content).to_string()
}
