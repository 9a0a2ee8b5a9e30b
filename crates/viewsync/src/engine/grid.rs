//! Square grid placement.

use std::{collections::HashMap, fmt, sync::Arc};

use futures::future::{self, BoxFuture, FutureExt};
use log::trace;

use viewsync_core::{
    geometry::{Bounds, Point, Size},
    identifier::Id,
    layout::{Diagram, LayoutResult, PlacedEdge, PlacedNode},
    model::View,
};

use super::{description, render};
use crate::{
    config::LayoutConfig,
    error::{Result, ViewsyncError},
    services::LayoutEngine,
};

/// Places the nodes of a view on a grid of equal cells, row by row.
///
/// A view with `n` nodes gets `ceil(sqrt(n))` columns. Edges run straight
/// from the border of the source cell to the border of the target cell.
#[derive(Clone)]
pub struct GridLayoutEngine {
    cell: Size,
    spacing: f32,
}

impl GridLayoutEngine {
    /// Creates an engine with the given cell size and spacing.
    pub fn new(cell: Size, spacing: f32) -> Self {
        Self { cell, spacing }
    }

    /// Creates an engine using the grid geometry from `config`.
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::new(
            Size::new(config.cell_width(), config.cell_height()),
            config.spacing(),
        )
    }

    fn columns(count: usize) -> usize {
        let mut columns = 0;
        while columns * columns < count {
            columns += 1;
        }
        columns
    }

    /// Computes the placed geometry of `view`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewsyncError::Layout`] if an edge references a node the view
    /// does not contain.
    pub fn place(&self, view: &View) -> Result<Diagram> {
        let count = view.nodes().len();
        let columns = Self::columns(count);
        let rows = if columns == 0 { 0 } else { count.div_ceil(columns) };
        let pitch_x = self.cell.width() + self.spacing;
        let pitch_y = self.cell.height() + self.spacing;

        let nodes: Vec<PlacedNode> = view
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let column = (i % columns) as f32;
                let row = (i / columns) as f32;
                let top_left = Point::new(
                    self.spacing + column * pitch_x,
                    self.spacing + row * pitch_y,
                );
                PlacedNode::new(
                    node.id(),
                    node.title(),
                    node.kind(),
                    Bounds::new_from_top_left(top_left, self.cell),
                )
            })
            .collect();

        let bounds_by_id: HashMap<Id, Bounds> =
            nodes.iter().map(|node| (node.id(), node.bounds())).collect();
        let lookup = |id: Id| {
            bounds_by_id.get(&id).copied().ok_or_else(|| {
                ViewsyncError::new_layout_error(
                    view.id(),
                    format!("edge references unknown node `{id}`"),
                )
            })
        };

        let edges = view
            .edges()
            .iter()
            .map(|edge| {
                let source = lookup(edge.source())?;
                let target = lookup(edge.target())?;
                let points = vec![
                    border_point(source, target.center()),
                    border_point(target, source.center()),
                ];
                Ok(PlacedEdge::new(
                    edge.id(),
                    edge.source(),
                    edge.target(),
                    edge.label().map(str::to_string),
                    points,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let width = self.spacing + columns as f32 * pitch_x;
        let height = self.spacing + rows as f32 * pitch_y;

        trace!(view_id:% = view.id(), nodes = nodes.len(), edges = edges.len(); "Placed view on grid");
        Ok(Diagram::new(view.id(), view.title(), width, height, nodes, edges))
    }
}

/// Returns where the segment from the center of `bounds` toward `toward`
/// leaves `bounds`.
fn border_point(bounds: Bounds, toward: Point) -> Point {
    let center = bounds.center();
    let dx = toward.x() - center.x();
    let dy = toward.y() - center.y();
    if dx == 0.0 && dy == 0.0 {
        return center;
    }

    let size = bounds.to_size();
    let scale_x = if dx == 0.0 {
        f32::INFINITY
    } else {
        (size.width() / 2.0) / dx.abs()
    };
    let scale_y = if dy == 0.0 {
        f32::INFINITY
    } else {
        (size.height() / 2.0) / dy.abs()
    };
    let scale = scale_x.min(scale_y);

    Point::new(center.x() + dx * scale, center.y() + dy * scale)
}

impl Default for GridLayoutEngine {
    fn default() -> Self {
        Self::from_config(&LayoutConfig::default())
    }
}

impl LayoutEngine for GridLayoutEngine {
    fn layout(&self, view: Arc<View>) -> BoxFuture<'_, Result<LayoutResult>> {
        let result = self.place(&view).map(|diagram| {
            let layout_description = description::describe(&diagram);
            LayoutResult::new(view, layout_description, diagram)
        });
        future::ready(result).boxed()
    }

    fn render<'a>(
        &'a self,
        _layout_description: &'a str,
        diagram: &'a Diagram,
    ) -> BoxFuture<'a, Result<String>> {
        future::ready(Ok(render::render(diagram))).boxed()
    }
}

impl fmt::Debug for GridLayoutEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridLayoutEngine")
            .field("cell", &self.cell)
            .field("spacing", &self.spacing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use viewsync_core::model::{ViewEdge, ViewNode};

    use super::*;

    fn view_with_nodes(id: &str, count: usize) -> View {
        (0..count).fold(View::new(Id::new(id), "Grid"), |view, i| {
            view.with_node(ViewNode::new(
                Id::new(&format!("n{i}")),
                format!("Node {i}"),
                "system",
            ))
        })
    }

    #[test]
    fn test_columns() {
        assert_eq!(GridLayoutEngine::columns(0), 0);
        assert_eq!(GridLayoutEngine::columns(1), 1);
        assert_eq!(GridLayoutEngine::columns(4), 2);
        assert_eq!(GridLayoutEngine::columns(5), 3);
    }

    #[test]
    fn test_places_row_by_row() {
        let engine = GridLayoutEngine::new(Size::new(100.0, 50.0), 10.0);
        let diagram = engine.place(&view_with_nodes("index", 3)).unwrap();

        let origins: Vec<(f32, f32)> = diagram
            .nodes()
            .iter()
            .map(|node| (node.bounds().min_point().x(), node.bounds().min_point().y()))
            .collect();
        assert_eq!(origins, vec![(10.0, 10.0), (120.0, 10.0), (10.0, 70.0)]);
        assert_eq!(diagram.width(), 230.0);
        assert_eq!(diagram.height(), 130.0);
    }

    #[test]
    fn test_empty_view() {
        let engine = GridLayoutEngine::new(Size::new(100.0, 50.0), 10.0);
        let diagram = engine.place(&View::new(Id::new("empty"), "Empty")).unwrap();

        assert!(diagram.nodes().is_empty());
        assert_eq!(diagram.width(), 10.0);
    }

    #[test]
    fn test_edge_runs_between_borders() {
        let engine = GridLayoutEngine::new(Size::new(100.0, 50.0), 10.0);
        let view = view_with_nodes("index", 2).with_edge(ViewEdge::new(
            Id::new("e"),
            Id::new("n0"),
            Id::new("n1"),
        ));
        let diagram = engine.place(&view).unwrap();

        let points = diagram.edges()[0].points();
        assert_eq!(points.len(), 2);
        assert!((points[0].x() - 110.0).abs() < 1e-3);
        assert!((points[1].x() - 120.0).abs() < 1e-3);
        assert!(points.iter().all(|point| (point.y() - 35.0).abs() < 1e-3));
    }

    #[test]
    fn test_unknown_edge_endpoint_fails() {
        let engine = GridLayoutEngine::default();
        let view = view_with_nodes("index", 1).with_edge(ViewEdge::new(
            Id::new("e"),
            Id::new("n0"),
            Id::new("missing"),
        ));

        let err = engine.place(&view).unwrap_err();
        assert!(matches!(err, ViewsyncError::Layout { view, .. } if view == Id::new("index")));
    }

    #[tokio::test]
    async fn test_same_content_shares_description() {
        let engine = GridLayoutEngine::default();
        let first = engine.layout(Arc::new(view_with_nodes("first", 2))).await.unwrap();
        let second = engine.layout(Arc::new(view_with_nodes("second", 2))).await.unwrap();

        assert_eq!(first.layout_description(), second.layout_description());
        assert_ne!(first.diagram().id(), second.diagram().id());
    }
}
