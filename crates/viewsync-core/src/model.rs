//! Model snapshot types.
//!
//! A [`Model`] is an immutable snapshot produced by one model build: the
//! elements and relations of the architecture, plus the computed [`View`]s
//! that are later handed to a layout engine. Snapshots are never mutated in
//! place; a changed source produces a new `Model`.
//!
//! Equality on every type here is structural. Two builds of the same source
//! compare equal even though they are distinct allocations, which is what the
//! change stream and the caches rely on to skip redundant work.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    fingerprint::{Fingerprint, FingerprintBuilder},
    identifier::{ElementId, Id, RelationId, ViewId},
};

/// An element of the architecture model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Element {
    id: ElementId,
    kind: String,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl Element {
    /// Creates an element without a description.
    pub fn new(id: ElementId, kind: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            title: title.into(),
            description: None,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the element identifier.
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Returns the element kind (`system`, `container`, ...).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the display title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// A directed relation between two elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    id: RelationId,
    source: ElementId,
    target: ElementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

impl Relation {
    /// Creates an untitled relation.
    pub fn new(id: RelationId, source: ElementId, target: ElementId) -> Self {
        Self {
            id,
            source,
            target,
            title: None,
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Returns the relation identifier.
    pub fn id(&self) -> RelationId {
        self.id
    }

    /// Returns the source element.
    pub fn source(&self) -> ElementId {
        self.source
    }

    /// Returns the target element.
    pub fn target(&self) -> ElementId {
        self.target
    }

    /// Returns the title, if any.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

/// A node of a computed view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewNode {
    id: Id,
    title: String,
    kind: String,
}

impl ViewNode {
    /// Creates a view node.
    pub fn new(id: Id, title: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            kind: kind.into(),
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
}

/// An edge of a computed view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewEdge {
    id: Id,
    source: Id,
    target: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

impl ViewEdge {
    /// Creates an unlabeled edge.
    pub fn new(id: Id, source: Id, target: Id) -> Self {
        Self {
            id,
            source,
            target,
            label: None,
        }
    }

    /// Sets the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
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
}

/// The abstract content of one diagram before layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct View {
    id: ViewId,
    title: String,
    #[serde(default)]
    nodes: Vec<ViewNode>,
    #[serde(default)]
    edges: Vec<ViewEdge>,
}

impl View {
    /// Creates an empty view.
    pub fn new(id: ViewId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Appends a node.
    pub fn with_node(mut self, node: ViewNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Appends an edge.
    pub fn with_edge(mut self, edge: ViewEdge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Returns the view identifier.
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// Returns the view title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the nodes in declaration order.
    pub fn nodes(&self) -> &[ViewNode] {
        &self.nodes
    }

    /// Returns the edges in declaration order.
    pub fn edges(&self) -> &[ViewEdge] {
        &self.edges
    }

    /// Computes the structural fingerprint of this view.
    ///
    /// Equal views always have equal fingerprints. The converse holds only up
    /// to hash collisions, so callers that key caches by fingerprint still
    /// compare the views themselves on a hit.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut builder = FingerprintBuilder::new();
        builder.id(self.id).field(&self.title);

        builder.count(self.nodes.len());
        for node in &self.nodes {
            builder.id(node.id).field(&node.title).field(&node.kind);
        }

        builder.count(self.edges.len());
        for edge in &self.edges {
            builder
                .id(edge.id)
                .id(edge.source)
                .id(edge.target)
                .optional_field(edge.label.as_deref());
        }

        builder.finish()
    }
}

/// An immutable model snapshot.
///
/// Views iterate in insertion order; equality ignores order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    elements: IndexMap<ElementId, Element>,
    #[serde(default)]
    relations: IndexMap<RelationId, Relation>,
    #[serde(default)]
    views: IndexMap<ViewId, View>,
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element, replacing any element with the same id.
    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.insert(element.id(), element);
        self
    }

    /// Adds a relation, replacing any relation with the same id.
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.insert(relation.id(), relation);
        self
    }

    /// Adds a view, replacing any view with the same id.
    pub fn with_view(mut self, view: View) -> Self {
        self.views.insert(view.id(), view);
        self
    }

    /// Looks up a view by id.
    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.views.get(&id)
    }

    /// Returns the views in insertion order.
    pub fn views(&self) -> impl Iterator<Item = &View> {
        self.views.values()
    }

    /// Returns the elements in insertion order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    /// Returns the relations in insertion order.
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    /// Looks up an element by id.
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    /// Returns the number of views.
    pub fn views_count(&self) -> usize {
        self.views.len()
    }

    /// Returns the number of elements.
    pub fn elements_count(&self) -> usize {
        self.elements.len()
    }

    /// Returns the number of relations.
    pub fn relations_count(&self) -> usize {
        self.relations.len()
    }
}
