use crossbeam_channel::Receiver;
use sankey_core::{
    parse_frame, CanvasSize, DataFrame, DataState, Extent, GraphCache, HoverBus, HoverEvent,
    HoverSelection, HoverSubscription, LayoutError, PositionedGraph, Selection, TimeIndexedGraphs,
    TimeSelector, TimeSeriesInput, Timestamp,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::util::config::PanelConfig;

#[derive(Debug, Clone, PartialEq)]
enum SourceStatus {
    Initializing,
    Ready,
    Error(String),
}

/// What the panel shows right now.
#[derive(Debug, PartialEq)]
pub enum PanelView<'a> {
    Error(&'a str),
    Initializing,
    Graph {
        timestamp: Timestamp,
        extent: Extent,
        graph: &'a PositionedGraph,
    },
    NoData,
    Failed {
        timestamp: Timestamp,
        error: &'a LayoutError,
    },
}

/// Panel host state: the current series, its layouts and the hover selection.
pub struct PanelState {
    size: CanvasSize,
    status: SourceStatus,
    cache: GraphCache,
    graphs: Option<Arc<TimeIndexedGraphs>>,
    selector: TimeSelector,
    hover: HoverSubscription,
    source: Option<Arc<TimeSeriesInput>>,
    needs_redraw: AtomicBool,
}

impl PanelState {
    pub fn new(cfg: &PanelConfig, bus: &HoverBus) -> Self {
        Self {
            size: CanvasSize::new(cfg.width, cfg.height),
            status: SourceStatus::Initializing,
            cache: GraphCache::new(cfg.layout.clone(), cfg.vertical_margin),
            graphs: None,
            selector: TimeSelector::new(cfg.debounce()),
            hover: bus.subscribe(&cfg.hover_event),
            source: None,
            needs_redraw: AtomicBool::new(true),
        }
    }

    pub fn size(&self) -> CanvasSize {
        self.size
    }

    pub fn apply_frame(&mut self, frame: &DataFrame) {
        if frame.state == DataState::Loading && frame.series.is_empty() {
            return;
        }
        match parse_frame(frame) {
            Ok(input) => {
                self.status = SourceStatus::Ready;
                self.source = Some(Arc::new(input));
                self.rebuild();
            }
            Err(err) => {
                tracing::warn!(error = %err, "rejecting frame");
                self.status = SourceStatus::Error(err.to_string());
                self.source = None;
                self.cache.clear();
                self.graphs = None;
            }
        }
        self.mark_dirty();
    }

    pub fn resize(&mut self, size: CanvasSize) {
        if size == self.size {
            return;
        }
        self.size = size;
        self.rebuild();
        self.mark_dirty();
    }

    fn rebuild(&mut self) {
        let Some(source) = &self.source else {
            return;
        };
        if self.cache.sync(source, self.size) {
            self.graphs = self.cache.snapshot();
        }
    }

    /// The subscription's channel, for waiting on hover events.
    pub fn hover_receiver(&self) -> Receiver<HoverEvent> {
        self.hover.receiver().clone()
    }

    pub fn on_hover(&mut self, event: &HoverEvent, now: Instant) {
        self.selector.on_event(event, now);
    }

    /// Drains hover events delivered since the last call.
    pub fn pump_hover(&mut self, now: Instant) {
        for event in self.hover.try_iter() {
            self.selector.on_event(&event, now);
        }
    }

    /// Applies a settled hover selection, if any.
    pub fn tick(&mut self, now: Instant) {
        if self.selector.tick(now) {
            tracing::debug!(hovered = ?self.selector.hovered(), "hover selection applied");
            self.mark_dirty();
        }
    }

    pub fn hovered(&self) -> HoverSelection {
        self.selector.hovered()
    }

    /// When [`PanelState::tick`] next has work to do.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.selector.deadline()
    }

    fn mark_dirty(&self) {
        self.needs_redraw.store(true, Ordering::Relaxed);
    }

    /// Returns and clears the redraw flag.
    pub fn take_redraw(&self) -> bool {
        self.needs_redraw.swap(false, Ordering::Relaxed)
    }

    pub fn view(&self) -> PanelView<'_> {
        if let SourceStatus::Error(msg) = &self.status {
            return PanelView::Error(msg);
        }
        let Some(graphs) = &self.graphs else {
            return PanelView::Initializing;
        };
        match self.selector.select(graphs) {
            Selection::Graph { timestamp, graph } => PanelView::Graph {
                timestamp,
                extent: graphs.extent(),
                graph,
            },
            Selection::Failed { timestamp, error } => PanelView::Failed { timestamp, error },
            Selection::NotFound => PanelView::NoData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sankey_core::HOVERED_TIME_CHANGED;
    use serde_json::json;
    use std::time::Duration;

    fn frame() -> DataFrame {
        DataFrame::from_cell(json!({
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
                ],
                "30": [ { "source": "A", "target": "ghost", "value": 1 } ]
            }
        }))
    }

    fn state(bus: &HoverBus) -> PanelState {
        PanelState::new(&PanelConfig::default(), bus)
    }

    fn shown_timestamp(view: PanelView<'_>) -> Option<Timestamp> {
        match view {
            PanelView::Graph { timestamp, .. } => Some(timestamp),
            _ => None,
        }
    }

    #[test]
    fn starts_initializing() {
        let bus = HoverBus::new();
        let st = state(&bus);
        assert_eq!(st.view(), PanelView::Initializing);
        assert!(st.take_redraw());
        assert!(!st.take_redraw());
    }

    #[test]
    fn error_frames_bypass_layout() {
        let bus = HoverBus::new();
        let mut st = state(&bus);
        st.apply_frame(&frame());
        st.apply_frame(&DataFrame::failed("backend down"));
        match st.view() {
            PanelView::Error(msg) => assert!(msg.contains("backend down")),
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[test]
    fn multiple_series_is_an_error() {
        let bus = HoverBus::new();
        let mut st = state(&bus);
        let mut two = frame();
        two.series.push(two.series[0].clone());
        st.apply_frame(&two);
        assert!(matches!(st.view(), PanelView::Error(_)));
    }

    #[test]
    fn latest_timestamp_failure_is_reported() {
        let bus = HoverBus::new();
        let mut st = state(&bus);
        st.apply_frame(&frame());
        assert!(matches!(
            st.view(),
            PanelView::Failed {
                timestamp: 30,
                error: LayoutError::MissingNode { .. }
            }
        ));
    }

    #[test]
    fn hover_through_bus_selects_after_debounce() {
        let bus = HoverBus::new();
        let mut st = state(&bus);
        st.apply_frame(&frame());
        st.take_redraw();

        let base = Instant::now();
        bus.publish(HOVERED_TIME_CHANGED, HoverEvent { time: 20_400.0 });
        st.pump_hover(base);
        st.tick(base + Duration::from_millis(10));
        assert!(!st.take_redraw());
        assert_eq!(st.next_wakeup(), Some(base + Duration::from_millis(100)));

        st.tick(base + Duration::from_millis(100));
        assert!(st.take_redraw());
        assert_eq!(shown_timestamp(st.view()), Some(20));

        bus.publish(HOVERED_TIME_CHANGED, HoverEvent { time: 99_000.0 });
        st.pump_hover(base + Duration::from_millis(200));
        st.tick(base + Duration::from_millis(300));
        assert_eq!(st.view(), PanelView::NoData);
    }

    #[test]
    fn hover_wakes_waiter_and_arms_debounce() {
        let bus = HoverBus::new();
        let mut st = state(&bus);
        st.apply_frame(&frame());
        st.take_redraw();
        let hover_rx = st.hover_receiver();
        assert_eq!(st.next_wakeup(), None);

        bus.publish(HOVERED_TIME_CHANGED, HoverEvent { time: 10_000.0 });
        let event = hover_rx
            .recv_timeout(Duration::from_millis(50))
            .expect("hover delivered to waiter");

        let base = Instant::now();
        st.on_hover(&event, base);
        assert_eq!(st.next_wakeup(), Some(base + Duration::from_millis(100)));

        st.tick(base + Duration::from_millis(99));
        assert_eq!(st.hovered(), HoverSelection::Unset);
        assert!(!st.take_redraw());

        st.tick(base + Duration::from_millis(100));
        assert_eq!(st.hovered(), HoverSelection::At(10));
        assert!(st.take_redraw());
        assert_eq!(shown_timestamp(st.view()), Some(10));
    }

    #[test]
    fn resize_relayouts_with_new_extent() {
        let bus = HoverBus::new();
        let mut st = state(&bus);
        st.apply_frame(&frame());
        bus.publish(HOVERED_TIME_CHANGED, HoverEvent { time: 10_000.0 });
        st.pump_hover(Instant::now());
        st.tick(Instant::now() + Duration::from_secs(1));

        st.resize(CanvasSize::new(300.0, 120.0));
        match st.view() {
            PanelView::Graph { extent, graph, .. } => {
                assert_eq!(extent, Extent::new(0.0, 10.0, 300.0, 110.0));
                assert!(graph.nodes.iter().all(|n| n.x1 <= 300.0 + 1e-9));
            }
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[test]
    fn loading_frame_keeps_current_view() {
        let bus = HoverBus::new();
        let mut st = state(&bus);
        st.apply_frame(&frame());
        st.apply_frame(&DataFrame {
            state: DataState::Loading,
            ..DataFrame::default()
        });
        assert!(matches!(st.view(), PanelView::Failed { .. }));
    }

    #[test]
    fn dropping_state_releases_subscription() {
        let bus = HoverBus::new();
        let st = state(&bus);
        assert_eq!(bus.subscriber_count(HOVERED_TIME_CHANGED), 1);
        drop(st);
        assert_eq!(bus.subscriber_count(HOVERED_TIME_CHANGED), 0);
    }
}
