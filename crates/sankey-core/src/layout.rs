//! Layered flow layout.
//!
//! The pipeline runs in fixed phases:
//!   1. resolve edges against the node set (index arenas)
//!   2. node values (max of in/out flow)
//!   3. depth and height by breadth-first layering
//!   4. columns from the alignment policy, x from column index
//!   5. vertical stacking, then weighted relaxation with collision passes
//!   6. band offsets for every link at both ends

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::graph::{PositionedEdge, PositionedGraph, PositionedNode};
use crate::model::{NodeCatalogEntry, RawEdge};

/// Movements below this are ignored by the collision passes.
const COLLISION_EPSILON: f64 = 1e-6;

/// Damping base for the relaxation passes.
const RELAX_DECAY: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Extent {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Full canvas width, with `margin` kept free above and below.
    pub fn for_canvas(width: f64, height: f64, margin: f64) -> Self {
        let y0 = margin.min(height / 2.0).max(0.0);
        let y1 = (height - margin).max(y0);
        Self::new(0.0, y0, width.max(0.0), y1)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

/// Which column a node lands in, given its depth and height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAlign {
    Left,
    /// As far right as the longest path to a sink allows.
    #[default]
    Right,
    Center,
    Justify,
}

/// Vertical order of nodes within a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSort {
    /// Largest flow on top; equal values keep input order.
    #[default]
    DescendingValue,
    /// Input order, never re-sorted.
    Input,
    /// Re-sorted by vertical position after every relaxation pass.
    Breadth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub node_width: f64,
    pub node_padding: f64,
    pub node_align: NodeAlign,
    pub node_sort: NodeSort,
    pub iterations: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 5.0,
            node_padding: 20.0,
            node_align: NodeAlign::Right,
            node_sort: NodeSort::DescendingValue,
            iterations: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("link {index} references missing node {id:?}")]
    MissingNode { index: usize, id: String },
    /// Layering did not terminate; the edges contain a cycle.
    #[error("circular link")]
    CircularLink,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SankeyLayout {
    config: LayoutConfig,
    extent: Extent,
}

impl SankeyLayout {
    pub fn new(config: LayoutConfig, extent: Extent) -> Self {
        Self { config, extent }
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Positions `nodes` and `edges` inside the extent.
    ///
    /// Node indices follow the order of `nodes`; link indices follow `edges`.
    pub fn compute(
        &self,
        nodes: Vec<NodeCatalogEntry>,
        edges: Vec<RawEdge>,
    ) -> Result<PositionedGraph, LayoutError> {
        let mut graph = link_nodes(nodes, edges)?;
        if graph.nodes.is_empty() {
            return Ok(graph);
        }

        compute_node_values(&mut graph);
        compute_layering(&mut graph, Direction::Downstream)?;
        compute_layering(&mut graph, Direction::Upstream)?;

        let mut columns = self.compute_node_layers(&mut graph);
        self.compute_node_breadths(&mut graph, &mut columns);
        compute_link_breadths(&mut graph);
        Ok(graph)
    }

    fn compute_node_layers(&self, graph: &mut PositionedGraph) -> Vec<Vec<usize>> {
        let count = graph.nodes.iter().map(|n| n.depth).max().map_or(0, |d| d + 1);
        let dx = self.config.node_width;
        let kx = if count > 1 {
            (self.extent.width() - dx) / (count - 1) as f64
        } else {
            0.0
        };

        let mut columns = vec![Vec::new(); count];
        for i in 0..graph.nodes.len() {
            let layer = self.align(graph, i, count).min(count - 1);
            let node = &mut graph.nodes[i];
            node.layer = layer;
            node.x0 = self.extent.x0 + layer as f64 * kx;
            node.x1 = node.x0 + dx;
            columns[layer].push(i);
        }

        if self.config.node_sort == NodeSort::DescendingValue {
            let nodes = &graph.nodes;
            for column in &mut columns {
                column.sort_by(|&a, &b| nodes[b].value.total_cmp(&nodes[a].value));
            }
        }
        columns
    }

    fn align(&self, graph: &PositionedGraph, i: usize, count: usize) -> usize {
        let node = &graph.nodes[i];
        match self.config.node_align {
            NodeAlign::Left => node.depth,
            NodeAlign::Right => (count - 1).saturating_sub(node.height),
            NodeAlign::Justify => {
                if node.source_links.is_empty() {
                    count - 1
                } else {
                    node.depth
                }
            }
            NodeAlign::Center => {
                if !node.target_links.is_empty() {
                    node.depth
                } else {
                    node.source_links
                        .iter()
                        .map(|&l| graph.nodes[graph.links[l].target].depth)
                        .min()
                        .map_or(0, |d| d.saturating_sub(1))
                }
            }
        }
    }

    fn compute_node_breadths(&self, graph: &mut PositionedGraph, columns: &mut [Vec<usize>]) {
        let widest = columns.iter().map(Vec::len).max().unwrap_or(0);
        let padding = if widest > 1 {
            self.config
                .node_padding
                .min(self.extent.height() / (widest - 1) as f64)
        } else {
            self.config.node_padding
        };

        let mut pass = Breadths {
            graph,
            py: padding,
            y0: self.extent.y0,
            y1: self.extent.y1,
            resort: self.config.node_sort == NodeSort::Breadth,
        };
        pass.initialize(columns);

        let iterations = self.config.iterations;
        for i in 0..iterations {
            let alpha = RELAX_DECAY.powi(i as i32);
            let beta = (1.0 - alpha).max((i + 1) as f64 / iterations as f64);
            pass.relax_right_to_left(columns, alpha, beta);
            pass.relax_left_to_right(columns, alpha, beta);
        }
    }
}

fn link_nodes(
    nodes: Vec<NodeCatalogEntry>,
    edges: Vec<RawEdge>,
) -> Result<PositionedGraph, LayoutError> {
    let index_by_id: HashMap<String, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect();

    let mut positioned: Vec<PositionedNode> = nodes
        .into_iter()
        .enumerate()
        .map(|(index, entry)| PositionedNode {
            id: entry.id,
            label: entry.label,
            index,
            value: 0.0,
            depth: 0,
            height: 0,
            layer: 0,
            x0: 0.0,
            x1: 0.0,
            y0: 0.0,
            y1: 0.0,
            source_links: Vec::new(),
            target_links: Vec::new(),
        })
        .collect();

    let resolve = |index: usize, id: &str| {
        index_by_id
            .get(id)
            .copied()
            .ok_or_else(|| LayoutError::MissingNode {
                index,
                id: id.to_string(),
            })
    };

    let mut links = Vec::with_capacity(edges.len());
    for (index, edge) in edges.into_iter().enumerate() {
        let source = resolve(index, &edge.source)?;
        let target = resolve(index, &edge.target)?;
        positioned[source].source_links.push(index);
        positioned[target].target_links.push(index);
        links.push(PositionedEdge {
            index,
            source,
            target,
            value: edge.value,
            width: 0.0,
            y0: 0.0,
            y1: 0.0,
        });
    }

    Ok(PositionedGraph {
        nodes: positioned,
        links,
    })
}

fn compute_node_values(graph: &mut PositionedGraph) {
    let PositionedGraph { nodes, links } = graph;
    for node in nodes.iter_mut() {
        let outgoing: f64 = node.source_links.iter().map(|&l| links[l].value).sum();
        let incoming: f64 = node.target_links.iter().map(|&l| links[l].value).sum();
        node.value = outgoing.max(incoming);
    }
}

#[derive(Clone, Copy)]
enum Direction {
    /// Fills `depth`, walking source to target.
    Downstream,
    /// Fills `height`, walking target to source.
    Upstream,
}

fn compute_layering(graph: &mut PositionedGraph, direction: Direction) -> Result<(), LayoutError> {
    let n = graph.nodes.len();
    let mut current: Vec<usize> = (0..n).collect();
    let mut x = 0usize;

    while !current.is_empty() {
        let mut next = Vec::new();
        let mut queued = vec![false; n];
        for &i in &current {
            let node = &mut graph.nodes[i];
            let links = match direction {
                Direction::Downstream => {
                    node.depth = x;
                    &node.source_links
                }
                Direction::Upstream => {
                    node.height = x;
                    &node.target_links
                }
            };
            for &l in links {
                let other = match direction {
                    Direction::Downstream => graph.links[l].target,
                    Direction::Upstream => graph.links[l].source,
                };
                if !queued[other] {
                    queued[other] = true;
                    next.push(other);
                }
            }
        }
        x += 1;
        if x > n {
            return Err(LayoutError::CircularLink);
        }
        current = next;
    }
    Ok(())
}

fn compute_link_breadths(graph: &mut PositionedGraph) {
    let PositionedGraph { nodes, links } = graph;
    for node in nodes.iter() {
        let mut y0 = node.y0;
        let mut y1 = node.y0;
        for &l in &node.source_links {
            links[l].y0 = y0 + links[l].width / 2.0;
            y0 += links[l].width;
        }
        for &l in &node.target_links {
            links[l].y1 = y1 + links[l].width / 2.0;
            y1 += links[l].width;
        }
    }
}

/// Vertical placement state for one layout run.
struct Breadths<'a> {
    graph: &'a mut PositionedGraph,
    py: f64,
    y0: f64,
    y1: f64,
    resort: bool,
}

impl Breadths<'_> {
    fn initialize(&mut self, columns: &[Vec<usize>]) {
        let ky = self.vertical_scale(columns);

        for column in columns {
            let PositionedGraph { nodes, links } = &mut *self.graph;
            let mut y = self.y0;
            for &i in column {
                nodes[i].y0 = y;
                nodes[i].y1 = y + nodes[i].value * ky;
                y = nodes[i].y1 + self.py;
                for &l in &nodes[i].source_links {
                    links[l].width = links[l].value * ky;
                }
            }

            let spare = (self.y1 - y + self.py) / (column.len() + 1) as f64;
            for (k, &i) in column.iter().enumerate() {
                let shift = spare * (k + 1) as f64;
                nodes[i].y0 += shift;
                nodes[i].y1 += shift;
            }

            for &i in column {
                self.sort_source_links(i);
                self.sort_target_links(i);
            }
        }
    }

    /// Largest scale at which every column fits the extent.
    fn vertical_scale(&self, columns: &[Vec<usize>]) -> f64 {
        let nodes = &self.graph.nodes;
        let ky = columns
            .iter()
            .filter_map(|column| {
                let total: f64 = column.iter().map(|&i| nodes[i].value).sum();
                let free = self.y1 - self.y0 - (column.len() as f64 - 1.0) * self.py;
                let k = free / total;
                k.is_finite().then_some(k)
            })
            .fold(f64::INFINITY, f64::min);

        if ky.is_finite() {
            ky.max(0.0)
        } else {
            0.0
        }
    }

    fn relax_left_to_right(&mut self, columns: &mut [Vec<usize>], alpha: f64, beta: f64) {
        for c in 1..columns.len() {
            for k in 0..columns[c].len() {
                let target = columns[c][k];
                let incoming = self.graph.nodes[target].target_links.clone();
                let (mut y, mut w) = (0.0, 0.0);
                for l in incoming {
                    let source = self.graph.links[l].source;
                    let v = self.graph.links[l].value * self.layer_span(source, target);
                    y += self.target_top(source, target) * v;
                    w += v;
                }
                if !(w > 0.0) {
                    continue;
                }
                let node = &mut self.graph.nodes[target];
                let dy = (y / w - node.y0) * alpha;
                node.y0 += dy;
                node.y1 += dy;
                self.reorder_node_links(target);
            }
            if self.resort {
                self.sort_by_breadth(&mut columns[c]);
            }
            self.resolve_collisions(&columns[c], beta);
        }
    }

    fn relax_right_to_left(&mut self, columns: &mut [Vec<usize>], alpha: f64, beta: f64) {
        for c in (0..columns.len().saturating_sub(1)).rev() {
            for k in 0..columns[c].len() {
                let source = columns[c][k];
                let outgoing = self.graph.nodes[source].source_links.clone();
                let (mut y, mut w) = (0.0, 0.0);
                for l in outgoing {
                    let target = self.graph.links[l].target;
                    let v = self.graph.links[l].value * self.layer_span(source, target);
                    y += self.source_top(source, target) * v;
                    w += v;
                }
                if !(w > 0.0) {
                    continue;
                }
                let node = &mut self.graph.nodes[source];
                let dy = (y / w - node.y0) * alpha;
                node.y0 += dy;
                node.y1 += dy;
                self.reorder_node_links(source);
            }
            if self.resort {
                self.sort_by_breadth(&mut columns[c]);
            }
            self.resolve_collisions(&columns[c], beta);
        }
    }

    fn layer_span(&self, source: usize, target: usize) -> f64 {
        self.graph.nodes[target].layer as f64 - self.graph.nodes[source].layer as f64
    }

    fn sort_by_breadth(&self, column: &mut [usize]) {
        let nodes = &self.graph.nodes;
        column.sort_by(|&a, &b| nodes[a].y0.total_cmp(&nodes[b].y0));
    }

    fn resolve_collisions(&mut self, column: &[usize], alpha: f64) {
        if column.is_empty() {
            return;
        }
        let mid = column.len() >> 1;
        let subject = &self.graph.nodes[column[mid]];
        let (above, below) = (subject.y0 - self.py, subject.y1 + self.py);

        self.push_up(&column[..mid], above, alpha);
        self.push_down(&column[mid + 1..], below, alpha);
        self.push_up(column, self.y1, alpha);
        self.push_down(column, self.y0, alpha);
    }

    /// Walks `column` bottom to top, keeping each node above `y`.
    fn push_up(&mut self, column: &[usize], mut y: f64, alpha: f64) {
        for &i in column.iter().rev() {
            let node = &mut self.graph.nodes[i];
            let dy = (node.y1 - y) * alpha;
            if dy > COLLISION_EPSILON {
                node.y0 -= dy;
                node.y1 -= dy;
            }
            y = node.y0 - self.py;
        }
    }

    /// Walks `column` top to bottom, keeping each node below `y`.
    fn push_down(&mut self, column: &[usize], mut y: f64, alpha: f64) {
        for &i in column {
            let node = &mut self.graph.nodes[i];
            let dy = (y - node.y0) * alpha;
            if dy > COLLISION_EPSILON {
                node.y0 += dy;
                node.y1 += dy;
            }
            y = node.y1 + self.py;
        }
    }

    fn reorder_node_links(&mut self, i: usize) {
        let incoming = self.graph.nodes[i].target_links.clone();
        for l in incoming {
            let source = self.graph.links[l].source;
            self.sort_source_links(source);
        }
        let outgoing = self.graph.nodes[i].source_links.clone();
        for l in outgoing {
            let target = self.graph.links[l].target;
            self.sort_target_links(target);
        }
    }

    fn sort_source_links(&mut self, i: usize) {
        let PositionedGraph { nodes, links } = &mut *self.graph;
        let mut list = std::mem::take(&mut nodes[i].source_links);
        list.sort_by(|&a, &b| {
            nodes[links[a].target]
                .y0
                .total_cmp(&nodes[links[b].target].y0)
                .then(links[a].index.cmp(&links[b].index))
        });
        nodes[i].source_links = list;
    }

    fn sort_target_links(&mut self, i: usize) {
        let PositionedGraph { nodes, links } = &mut *self.graph;
        let mut list = std::mem::take(&mut nodes[i].target_links);
        list.sort_by(|&a, &b| {
            nodes[links[a].source]
                .y0
                .total_cmp(&nodes[links[b].source].y0)
                .then(links[a].index.cmp(&links[b].index))
        });
        nodes[i].target_links = list;
    }

    /// Where the band from `source` to `target` would start if `target`
    /// were aligned to it.
    fn target_top(&self, source: usize, target: usize) -> f64 {
        let PositionedGraph { nodes, links } = &*self.graph;
        let src = &nodes[source];
        let mut y = src.y0 - (src.source_links.len() as f64 - 1.0) * self.py / 2.0;
        for &l in &src.source_links {
            if links[l].target == target {
                break;
            }
            y += links[l].width + self.py;
        }
        for &l in &nodes[target].target_links {
            if links[l].source == source {
                break;
            }
            y -= links[l].width;
        }
        y
    }

    /// Where the band from `source` to `target` would end if `source`
    /// were aligned to it.
    fn source_top(&self, source: usize, target: usize) -> f64 {
        let PositionedGraph { nodes, links } = &*self.graph;
        let tgt = &nodes[target];
        let mut y = tgt.y0 - (tgt.target_links.len() as f64 - 1.0) * self.py / 2.0;
        for &l in &tgt.target_links {
            if links[l].source == source {
                break;
            }
            y += links[l].width + self.py;
        }
        for &l in &nodes[source].source_links {
            if links[l].target == target {
                break;
            }
            y -= links[l].width;
        }
        y
    }
}
