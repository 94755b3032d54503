//! Time-indexed Sankey layout pipeline.
//!
//! Raw series frames are validated into a [`TimeSeriesInput`], every timestamp's
//! edge list is reduced to the nodes it references and laid out into a
//! [`PositionedGraph`], and a [`TimeSelector`] picks which timestamp to show
//! from a debounced, externally broadcast hover time.

pub mod cache;
pub mod debounce;
pub mod graph;
pub mod hover;
pub mod input;
pub mod layout;
pub mod model;
pub mod path;
pub mod reduce;
pub mod select;

use serde::{Deserialize, Serialize};

pub use cache::{CanvasSize, GraphCache, TimeIndexedGraphs};
pub use debounce::Debouncer;
pub use graph::{PositionedEdge, PositionedGraph, PositionedNode};
pub use hover::{HoverBus, HoverEvent, HoverSubscription, HOVERED_TIME_CHANGED};
pub use input::{parse_frame, InputError};
pub use layout::{Extent, LayoutConfig, LayoutError, NodeAlign, NodeSort, SankeyLayout};
pub use model::{
    DataFrame, DataState, Field, NodeCatalog, NodeCatalogEntry, RawEdge, Series, TimeSeriesInput,
    Timestamp,
};
pub use path::{link_horizontal, LinkPath};
pub use reduce::reduce_nodes;
pub use select::{select, HoverSelection, Selection, TimeSelector};

pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Wire messages exchanged between the hub and panels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Msg {
    Hello { version: String },
    Frame { frame: DataFrame },
    /// A named time broadcast; `time` is in milliseconds.
    TimeEvent { event: String, time: f64 },
    Ping,
    Pong,
}

impl Msg {
    pub fn hello() -> Self {
        Msg::Hello {
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn hovered_time(time: f64) -> Self {
        Msg::TimeEvent {
            event: HOVERED_TIME_CHANGED.to_string(),
            time,
        }
    }
}
