//! JSON-lines output consumed by the external renderer.

use anyhow::Result;
use sankey_core::{link_horizontal, Extent, HoverSelection, PositionedGraph, Timestamp};
use serde::Serialize;
use std::io::Write;

use crate::state::{PanelState, PanelView};

#[derive(Debug, Serialize)]
pub struct RenderFrame<'a> {
    pub width: f64,
    pub height: f64,
    pub hovered: Option<Timestamp>,
    pub view: RenderView<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderView<'a> {
    Error { message: &'a str },
    Initializing,
    NoData,
    Failed { timestamp: Timestamp, message: String },
    Graph {
        timestamp: Timestamp,
        extent: Extent,
        nodes: Vec<RenderNode<'a>>,
        links: Vec<RenderLink<'a>>,
    },
}

#[derive(Debug, Serialize)]
pub struct RenderNode<'a> {
    pub id: &'a str,
    pub label: &'a str,
    pub value: f64,
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
}

#[derive(Debug, Serialize)]
pub struct RenderLink<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub value: f64,
    pub width: f64,
    /// `None` when the band has no drawable geometry.
    pub path: Option<String>,
}

fn graph_view(timestamp: Timestamp, extent: Extent, graph: &PositionedGraph) -> RenderView<'_> {
    let nodes = graph
        .nodes
        .iter()
        .map(|n| RenderNode {
            id: &n.id,
            label: &n.label,
            value: n.value,
            x0: n.x0,
            x1: n.x1,
            y0: n.y0,
            y1: n.y1,
        })
        .collect();

    let links = graph
        .links
        .iter()
        .filter_map(|link| {
            let (Some(source), Some(target)) = (graph.source_of(link), graph.target_of(link)) else {
                tracing::warn!(timestamp, link = link.index, "link endpoints out of range");
                return None;
            };
            let path = link_horizontal(graph, link).map(|p| p.to_svg());
            if path.is_none() {
                tracing::warn!(
                    timestamp,
                    link = link.index,
                    source = %source.id,
                    target = %target.id,
                    "link has degenerate geometry"
                );
            }
            Some(RenderLink {
                source: &source.id,
                target: &target.id,
                value: link.value,
                width: link.width,
                path,
            })
        })
        .collect();

    RenderView::Graph {
        timestamp,
        extent,
        nodes,
        links,
    }
}

pub fn frame(state: &PanelState) -> RenderFrame<'_> {
    let view = match state.view() {
        PanelView::Error(message) => RenderView::Error { message },
        PanelView::Initializing => RenderView::Initializing,
        PanelView::NoData => RenderView::NoData,
        PanelView::Failed { timestamp, error } => RenderView::Failed {
            timestamp,
            message: error.to_string(),
        },
        PanelView::Graph {
            timestamp,
            extent,
            graph,
        } => graph_view(timestamp, extent, graph),
    };
    let size = state.size();
    RenderFrame {
        width: size.width,
        height: size.height,
        hovered: match state.hovered() {
            HoverSelection::At(ts) => Some(ts),
            HoverSelection::Unset => None,
        },
        view,
    }
}

/// Writes one frame as a single JSON line.
pub fn write_frame<W: Write>(out: &mut W, state: &PanelState) -> Result<()> {
    serde_json::to_writer(&mut *out, &frame(state))?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::config::PanelConfig;
    use sankey_core::{DataFrame, HoverBus, LayoutConfig, SankeyLayout};
    use serde_json::json;

    #[test]
    fn writes_one_line_per_frame() {
        let bus = HoverBus::new();
        let mut st = PanelState::new(&PanelConfig::default(), &bus);
        st.apply_frame(&DataFrame::from_cell(json!({
            "nodes": { "A": { "id": "A", "label": "Api" }, "B": { "id": "B", "label": "Db" } },
            "links": { "5": [ { "source": "A", "target": "B", "value": 2 } ] }
        })));

        let mut out = Vec::new();
        write_frame(&mut out, &st).expect("write");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);

        let value: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(value["view"]["kind"], "graph");
        assert_eq!(value["view"]["timestamp"], 5);
        assert_eq!(value["view"]["nodes"][1]["label"], "Db");
        assert!(value["view"]["links"][0]["path"]
            .as_str()
            .expect("path")
            .starts_with('M'));
        assert_eq!(value["hovered"], serde_json::Value::Null);
    }

    #[test]
    fn degenerate_link_keeps_the_rest() {
        let nodes = ["A", "B", "C"]
            .iter()
            .map(|id| sankey_core::NodeCatalogEntry {
                id: id.to_string(),
                label: id.to_string(),
            })
            .collect();
        let mut graph = SankeyLayout::new(LayoutConfig::default(), Extent::new(0.0, 0.0, 100.0, 60.0))
            .compute(
                nodes,
                vec![
                    sankey_core::RawEdge::new("A", "B", 1.0),
                    sankey_core::RawEdge::new("A", "C", 1.0),
                ],
            )
            .expect("layout");
        graph.links[0].y0 = f64::NAN;

        let RenderView::Graph { nodes, links, .. } = graph_view(1, Extent::new(0.0, 0.0, 100.0, 60.0), &graph)
        else {
            panic!("graph view expected");
        };
        assert_eq!(nodes.len(), 3);
        assert_eq!(links.len(), 2);
        assert!(links[0].path.is_none());
        assert!(links[1].path.is_some());
    }

    #[test]
    fn dangling_link_is_dropped() {
        let nodes = ["A", "B"]
            .iter()
            .map(|id| sankey_core::NodeCatalogEntry {
                id: id.to_string(),
                label: id.to_string(),
            })
            .collect();
        let mut graph = SankeyLayout::new(LayoutConfig::default(), Extent::new(0.0, 0.0, 100.0, 60.0))
            .compute(nodes, vec![sankey_core::RawEdge::new("A", "B", 1.0)])
            .expect("layout");
        let mut dangling = graph.links[0].clone();
        dangling.target = 7;
        graph.links.push(dangling);

        assert!(graph.target_of(&graph.links[1]).is_none());
        assert_eq!(graph.source_of(&graph.links[1]).map(|n| n.id.as_str()), Some("A"));

        let RenderView::Graph { links, .. } = graph_view(1, Extent::new(0.0, 0.0, 100.0, 60.0), &graph)
        else {
            panic!("graph view expected");
        };
        assert_eq!(links.len(), 1);
        assert_eq!((links[0].source, links[0].target), ("A", "B"));
    }

    #[test]
    fn error_view_carries_message() {
        let bus = HoverBus::new();
        let mut st = PanelState::new(&PanelConfig::default(), &bus);
        st.apply_frame(&DataFrame::failed("query timeout"));
        let value = serde_json::to_value(frame(&st)).expect("json");
        assert_eq!(value["view"]["kind"], "error");
        assert!(value["view"]["message"]
            .as_str()
            .expect("message")
            .contains("query timeout"));
    }
}
