use serde::Serialize;

/// A catalog node with its layout rectangle.
///
/// Link lists hold indices into [`PositionedGraph::links`], ordered top to
/// bottom by the vertical position of the node at their other end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedNode {
    pub id: String,
    pub label: String,
    pub index: usize,
    /// Total through-flow: max of incoming and outgoing sums.
    pub value: f64,
    /// Distance from the furthest source.
    pub depth: usize,
    /// Distance from the furthest sink.
    pub height: usize,
    /// Column after alignment.
    pub layer: usize,
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
    pub source_links: Vec<usize>,
    pub target_links: Vec<usize>,
}

impl PositionedNode {
    pub fn node_height(&self) -> f64 {
        self.y1 - self.y0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedEdge {
    pub index: usize,
    pub source: usize,
    pub target: usize,
    pub value: f64,
    /// Band thickness, in the same vertical scale as node heights.
    pub width: f64,
    /// Band centre where it leaves the source node.
    pub y0: f64,
    /// Band centre where it enters the target node.
    pub y1: f64,
}

/// Node and link arenas for one timestamp. Edges address nodes by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PositionedGraph {
    pub nodes: Vec<PositionedNode>,
    pub links: Vec<PositionedEdge>,
}

impl PositionedGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// `None` if the link points outside this graph's node arena.
    pub fn source_of(&self, link: &PositionedEdge) -> Option<&PositionedNode> {
        self.nodes.get(link.source)
    }

    pub fn target_of(&self, link: &PositionedEdge) -> Option<&PositionedNode> {
        self.nodes.get(link.target)
    }

    pub fn column_count(&self) -> usize {
        self.nodes.iter().map(|n| n.layer + 1).max().unwrap_or(0)
    }
}
