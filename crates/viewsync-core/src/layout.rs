//! Layout output types.
//!
//! A [`LayoutResult`] is what a layout engine produces for one [`View`]: the
//! placed geometry ([`Diagram`]) and the textual layout description that a
//! renderer consumes. A [`RenderedOutput`] pairs that description with the
//! final presentation text.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    geometry::{Bounds, Point},
    identifier::{Id, ViewId},
    model::View,
};

/// A view node placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedNode {
    id: Id,
    title: String,
    kind: String,
    bounds: Bounds,
}

impl PlacedNode {
    /// Creates a placed node.
    pub fn new(id: Id, title: impl Into<String>, kind: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            id,
            title: title.into(),
            kind: kind.into(),
            bounds,
        }
    }

    /// Returns the node identifier.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the display title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the node kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the node rectangle.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
}

/// A view edge routed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedEdge {
    id: Id,
    source: Id,
    target: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    points: Vec<Point>,
}

impl PlacedEdge {
    /// Creates a routed edge.
    pub fn new(
        id: Id,
        source: Id,
        target: Id,
        label: Option<String>,
        points: Vec<Point>,
    ) -> Self {
        Self {
            id,
            source,
            target,
            label,
            points,
        }
    }

    /// Returns the edge identifier.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the source node.
    pub fn source(&self) -> Id {
        self.source
    }

    /// Returns the target node.
    pub fn target(&self) -> Id {
        self.target
    }

    /// Returns the label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Returns the polyline of the route.
    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

/// Laid out geometry of one view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    id: ViewId,
    title: String,
    width: f32,
    height: f32,
    nodes: Vec<PlacedNode>,
    edges: Vec<PlacedEdge>,
}

impl Diagram {
    /// Creates a diagram.
    pub fn new(
        id: ViewId,
        title: impl Into<String>,
        width: f32,
        height: f32,
        nodes: Vec<PlacedNode>,
        edges: Vec<PlacedEdge>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            width,
            height,
            nodes,
            edges,
        }
    }

    /// Returns the id of the view this diagram was laid out from.
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// Returns the diagram title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the canvas width.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Returns the canvas height.
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Returns the placed nodes.
    pub fn nodes(&self) -> &[PlacedNode] {
        &self.nodes
    }

    /// Returns the routed edges.
    pub fn edges(&self) -> &[PlacedEdge] {
        &self.edges
    }
}

/// Output of a layout engine for one view.
///
/// Shared read-only between caches and consumers behind an [`Arc`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutResult {
    view: Arc<View>,
    layout_description: String,
    diagram: Diagram,
}

impl LayoutResult {
    /// Creates a layout result.
    pub fn new(view: Arc<View>, layout_description: impl Into<String>, diagram: Diagram) -> Self {
        Self {
            view,
            layout_description: layout_description.into(),
            diagram,
        }
    }

    /// Returns the view that was laid out.
    pub fn view(&self) -> &Arc<View> {
        &self.view
    }

    /// Returns the renderer-input description of the layout.
    pub fn layout_description(&self) -> &str {
        &self.layout_description
    }

    /// Returns the placed geometry.
    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }
}

/// Final presentation form of one laid out view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedOutput {
    id: ViewId,
    layout_description: String,
    rendered_text: Arc<str>,
}

impl RenderedOutput {
    /// Creates a rendered output.
    pub fn new(id: ViewId, layout_description: impl Into<String>, rendered_text: Arc<str>) -> Self {
        Self {
            id,
            layout_description: layout_description.into(),
            rendered_text,
        }
    }

    /// Returns the view identifier.
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// Returns the layout description the text was rendered from.
    pub fn layout_description(&self) -> &str {
        &self.layout_description
    }

    /// Returns the rendered text.
    pub fn rendered_text(&self) -> &Arc<str> {
        &self.rendered_text
    }
}
