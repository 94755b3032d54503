use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::graph::PositionedGraph;
use crate::layout::{Extent, LayoutConfig, LayoutError, SankeyLayout};
use crate::model::{TimeSeriesInput, Timestamp};
use crate::reduce::reduce_nodes;

/// Canvas size in layout units, as supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

pub type TimestampLayout = Result<PositionedGraph, LayoutError>;

/// Every timestamp of one series laid out under one extent.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeIndexedGraphs {
    extent: Extent,
    graphs: BTreeMap<Timestamp, TimestampLayout>,
}

impl TimeIndexedGraphs {
    /// Lays out every timestamp of `input`. A timestamp whose layout fails keeps
    /// its error; the other timestamps are unaffected.
    pub fn build(input: &TimeSeriesInput, layout: &SankeyLayout) -> Self {
        let mut graphs = BTreeMap::new();
        for (&timestamp, edges) in &input.links_by_timestamp {
            let nodes = reduce_nodes(&input.nodes, edges);
            let result = layout.compute(nodes, edges.clone());
            if let Err(err) = &result {
                tracing::warn!(timestamp, error = %err, "layout failed for timestamp");
            }
            graphs.insert(timestamp, result);
        }
        Self {
            extent: layout.extent(),
            graphs,
        }
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn get(&self, timestamp: Timestamp) -> Option<&TimestampLayout> {
        self.graphs.get(&timestamp)
    }

    pub fn latest(&self) -> Option<(Timestamp, &TimestampLayout)> {
        self.graphs.iter().next_back().map(|(&ts, layout)| (ts, layout))
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.graphs.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, &TimestampLayout)> {
        self.graphs.iter().map(|(&ts, layout)| (ts, layout))
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

struct BuiltFrom {
    input: Arc<TimeSeriesInput>,
    size: CanvasSize,
}

/// Holds the current [`TimeIndexedGraphs`] and rebuilds it wholesale when the
/// series or the canvas size changes.
///
/// Readers take an `Arc` snapshot; a rebuild swaps in a complete new map and
/// never touches a snapshot already handed out.
pub struct GraphCache {
    config: LayoutConfig,
    margin: f64,
    current: Option<Arc<TimeIndexedGraphs>>,
    built_from: Option<BuiltFrom>,
}

impl GraphCache {
    pub fn new(config: LayoutConfig, margin: f64) -> Self {
        Self {
            config,
            margin,
            current: None,
            built_from: None,
        }
    }

    /// Rebuilds if `input` is a different series or `size` changed.
    /// Returns whether a rebuild happened.
    pub fn sync(&mut self, input: &Arc<TimeSeriesInput>, size: CanvasSize) -> bool {
        let fresh = self
            .built_from
            .as_ref()
            .is_some_and(|b| Arc::ptr_eq(&b.input, input) && b.size == size);
        if fresh {
            return false;
        }

        let extent = Extent::for_canvas(size.width, size.height, self.margin);
        let layout = SankeyLayout::new(self.config.clone(), extent);
        let graphs = TimeIndexedGraphs::build(input, &layout);
        tracing::debug!(
            timestamps = graphs.len(),
            width = size.width,
            height = size.height,
            "rebuilt graph cache"
        );

        self.current = Some(Arc::new(graphs));
        self.built_from = Some(BuiltFrom {
            input: Arc::clone(input),
            size,
        });
        true
    }

    pub fn snapshot(&self) -> Option<Arc<TimeIndexedGraphs>> {
        self.current.clone()
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.built_from = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::parse_cell;
    use serde_json::json;

    fn example() -> Arc<TimeSeriesInput> {
        let input = parse_cell(json!({
            "nodes": {
                "A": { "id": "A", "label": "A" },
                "B": { "id": "B", "label": "B" },
                "C": { "id": "C", "label": "C" }
            },
            "links": {
                "10": [ { "source": "A", "target": "B", "value": 5 } ],
                "20": [
                    { "source": "A", "target": "B", "value": 5 },
                    { "source": "B", "target": "C", "value": 3 }
                ]
            }
        }))
        .expect("valid input");
        Arc::new(input)
    }

    fn graph(graphs: &TimeIndexedGraphs, ts: Timestamp) -> &PositionedGraph {
        graphs.get(ts).expect("timestamp").as_ref().expect("layout")
    }

    #[test]
    fn builds_one_graph_per_timestamp() {
        let mut cache = GraphCache::new(LayoutConfig::default(), 10.0);
        cache.sync(&example(), CanvasSize::new(800.0, 300.0));
        let graphs = cache.snapshot().expect("built");

        assert_eq!(graphs.timestamps().collect::<Vec<_>>(), vec![10, 20]);

        let at_10 = graph(&graphs, 10);
        assert_eq!(at_10.nodes.len(), 2);
        assert_eq!(at_10.links.len(), 1);
        assert_eq!(at_10.links[0].value, 5.0);

        let at_20 = graph(&graphs, 20);
        assert_eq!(at_20.nodes.len(), 3);
        let values: Vec<f64> = at_20.links.iter().map(|l| l.value).collect();
        assert_eq!(values, vec![5.0, 3.0]);
        let (a, b, c) = (
            at_20.node("A").unwrap(),
            at_20.node("B").unwrap(),
            at_20.node("C").unwrap(),
        );
        assert!(a.layer < b.layer && b.layer < c.layer);
    }

    #[test]
    fn empty_series_builds_empty_cache() {
        let mut cache = GraphCache::new(LayoutConfig::default(), 10.0);
        cache.sync(&Arc::new(TimeSeriesInput::default()), CanvasSize::new(100.0, 100.0));
        assert!(cache.snapshot().expect("built").is_empty());
    }

    #[test]
    fn rebuilds_only_on_change() {
        let input = example();
        let mut cache = GraphCache::new(LayoutConfig::default(), 10.0);
        let size = CanvasSize::new(800.0, 300.0);

        assert!(cache.sync(&input, size));
        assert!(!cache.sync(&input, size));
        assert!(cache.sync(&input, CanvasSize::new(800.0, 200.0)));
        assert!(cache.sync(&input, CanvasSize::new(640.0, 200.0)));

        // same content, new series reference
        let copy = Arc::new((*input).clone());
        assert!(cache.sync(&copy, CanvasSize::new(640.0, 200.0)));
    }

    #[test]
    fn snapshots_never_mix_extents() {
        let input = example();
        let mut cache = GraphCache::new(LayoutConfig::default(), 10.0);
        cache.sync(&input, CanvasSize::new(800.0, 300.0));
        let before = cache.snapshot().expect("built");

        cache.sync(&input, CanvasSize::new(400.0, 150.0));
        let after = cache.snapshot().expect("built");

        for (_, layout) in before.iter() {
            let g = layout.as_ref().expect("layout");
            assert!(g.nodes.iter().all(|n| n.x1 <= 800.0 && n.y1 <= 290.0 + 1e-6));
            assert!(g.nodes.iter().any(|n| (n.x1 - 800.0).abs() < 1e-6));
        }
        for (_, layout) in after.iter() {
            let g = layout.as_ref().expect("layout");
            assert!(g.nodes.iter().all(|n| n.x1 <= 400.0 + 1e-6 && n.y1 <= 140.0 + 1e-6));
        }
        assert_eq!(before.extent().x1, 800.0);
        assert_eq!(after.extent().x1, 400.0);
    }

    #[test]
    fn failing_timestamp_does_not_poison_others() {
        let input = parse_cell(json!({
            "nodes": { "A": { "id": "A", "label": "A" }, "B": { "id": "B", "label": "B" } },
            "links": {
                "1": [ { "source": "A", "target": "B", "value": 1 } ],
                "2": [ { "source": "A", "target": "ghost", "value": 1 } ],
                "3": [
                    { "source": "A", "target": "B", "value": 1 },
                    { "source": "B", "target": "A", "value": 1 }
                ]
            }
        }))
        .expect("valid input");
        let layout = SankeyLayout::new(LayoutConfig::default(), Extent::for_canvas(200.0, 100.0, 10.0));
        let graphs = TimeIndexedGraphs::build(&input, &layout);

        assert!(graphs.get(1).expect("ts 1").is_ok());
        assert!(matches!(
            graphs.get(2),
            Some(Err(LayoutError::MissingNode { .. }))
        ));
        assert!(matches!(graphs.get(3), Some(Err(LayoutError::CircularLink))));
    }

    #[test]
    fn layout_does_not_touch_the_series() {
        let input = example();
        let original = (*input).clone();
        let mut cache = GraphCache::new(LayoutConfig::default(), 10.0);
        cache.sync(&input, CanvasSize::new(800.0, 300.0));

        let mut graphs = (*cache.snapshot().expect("built")).clone();
        if let Some(Ok(g)) = graphs.graphs.get_mut(&20) {
            g.nodes[0].label = "mutated".to_string();
            g.links[0].value = 99.0;
        }
        assert_eq!(*input, original);
    }

    #[test]
    fn clear_discards_snapshot() {
        let mut cache = GraphCache::new(LayoutConfig::default(), 10.0);
        cache.sync(&example(), CanvasSize::new(800.0, 300.0));
        cache.clear();
        assert!(cache.snapshot().is_none());
    }
}
