use serde::Serialize;

use crate::graph::{PositionedEdge, PositionedGraph};

/// Horizontal cubic curve from a source node's right edge to a target node's
/// left edge. Both control points sit at the horizontal midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkPath {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl LinkPath {
    pub fn mid_x(&self) -> f64 {
        (self.x0 + self.x1) / 2.0
    }

    /// SVG path data, e.g. `M0,10C50,10,50,30,100,30`.
    pub fn to_svg(&self) -> String {
        let mx = self.mid_x();
        format!(
            "M{},{}C{},{},{},{},{},{}",
            self.x0, self.y0, mx, self.y0, mx, self.y1, self.x1, self.y1
        )
    }
}

/// Path for `link`, or `None` when its geometry is unusable.
pub fn link_horizontal(graph: &PositionedGraph, link: &PositionedEdge) -> Option<LinkPath> {
    let source = graph.source_of(link)?;
    let target = graph.target_of(link)?;
    let path = LinkPath {
        x0: source.x1,
        y0: link.y0,
        x1: target.x0,
        y1: link.y1,
    };
    [path.x0, path.y0, path.x1, path.y1]
        .iter()
        .all(|v| v.is_finite())
        .then_some(path)
}
