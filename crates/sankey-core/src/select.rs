use std::time::{Duration, Instant};

use crate::cache::TimeIndexedGraphs;
use crate::debounce::Debouncer;
use crate::graph::PositionedGraph;
use crate::hover::HoverEvent;
use crate::layout::LayoutError;
use crate::model::Timestamp;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HoverSelection {
    #[default]
    Unset,
    At(Timestamp),
}

impl HoverSelection {
    /// Seconds from a broadcast time in milliseconds, rounded down.
    /// Non-finite times carry no selection.
    pub fn from_millis(ms: f64) -> Option<Self> {
        if !ms.is_finite() {
            return None;
        }
        Some(HoverSelection::At((ms / 1000.0).floor() as Timestamp))
    }
}

#[derive(Debug, PartialEq)]
pub enum Selection<'a> {
    Graph {
        timestamp: Timestamp,
        graph: &'a PositionedGraph,
    },
    /// The timestamp exists but its layout failed.
    Failed {
        timestamp: Timestamp,
        error: &'a LayoutError,
    },
    NotFound,
}

/// Hovered timestamp if set, otherwise the latest one.
pub fn select(graphs: &TimeIndexedGraphs, hovered: HoverSelection) -> Selection<'_> {
    let found = match hovered {
        HoverSelection::At(ts) => graphs.get(ts).map(|layout| (ts, layout)),
        HoverSelection::Unset => graphs.latest(),
    };
    match found {
        Some((timestamp, Ok(graph))) => Selection::Graph { timestamp, graph },
        Some((timestamp, Err(error))) => Selection::Failed { timestamp, error },
        None => Selection::NotFound,
    }
}

/// Tracks the applied hover selection behind a debounce window.
#[derive(Debug, Clone)]
pub struct TimeSelector {
    debounce: Debouncer<HoverSelection>,
    hovered: HoverSelection,
}

impl TimeSelector {
    pub fn new(window: Duration) -> Self {
        Self {
            debounce: Debouncer::new(window),
            hovered: HoverSelection::Unset,
        }
    }

    pub fn on_event(&mut self, event: &HoverEvent, now: Instant) {
        match HoverSelection::from_millis(event.time) {
            Some(selection) => self.debounce.push(selection, now),
            None => tracing::debug!(time = event.time, "ignoring hover event without a usable time"),
        }
    }

    /// Applies a settled hover event. Returns whether the selection changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.debounce.poll(now) {
            Some(selection) if selection != self.hovered => {
                self.hovered = selection;
                true
            }
            _ => false,
        }
    }

    pub fn hovered(&self) -> HoverSelection {
        self.hovered
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    pub fn select<'a>(&self, graphs: &'a TimeIndexedGraphs) -> Selection<'a> {
        select(graphs, self.hovered)
    }
}
