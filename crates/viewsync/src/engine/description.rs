//! DOT-like textual form of a placed diagram.
//!
//! The description carries everything that affects rendering and nothing
//! else. In particular it omits the view id, so two views with the same
//! content share a description and therefore a rendering.
//!
//! ```text
//! digraph {
//!   graph [label="Landscape", bb="0,0,460,170"];
//!   "api" [label="API", kind="system", pos="40,40", size="180,90"];
//!   "api" -> "db" [label="reads", pos="220,85 260,85"];
//! }
//! ```

use std::fmt::Write;

use viewsync_core::{geometry::Point, layout::Diagram};

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn points(points: &[Point]) -> String {
    points
        .iter()
        .map(|point| format!("{},{}", point.x(), point.y()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes the description of `diagram`.
pub fn describe(diagram: &Diagram) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "digraph {{");
    let _ = writeln!(
        out,
        "  graph [label={}, bb=\"0,0,{},{}\"];",
        quote(diagram.title()),
        diagram.width(),
        diagram.height()
    );

    for node in diagram.nodes() {
        let bounds = node.bounds();
        let size = bounds.to_size();
        let _ = writeln!(
            out,
            "  {} [label={}, kind={}, pos=\"{},{}\", size=\"{},{}\"];",
            quote(&node.id().to_string()),
            quote(node.title()),
            quote(node.kind()),
            bounds.min_point().x(),
            bounds.min_point().y(),
            size.width(),
            size.height()
        );
    }

    for edge in diagram.edges() {
        let mut attributes = Vec::new();
        if let Some(label) = edge.label() {
            attributes.push(format!("label={}", quote(label)));
        }
        attributes.push(format!("pos=\"{}\"", points(edge.points())));
        let _ = writeln!(
            out,
            "  {} -> {} [{}];",
            quote(&edge.source().to_string()),
            quote(&edge.target().to_string()),
            attributes.join(", ")
        );
    }

    out.push('}');
    out.push('\n');
    out
}
