use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Seconds since the epoch, as carried by the series' timestamp keys.
pub type Timestamp = i64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeCatalogEntry {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEdge {
    pub source: String,
    pub target: String,
    pub value: f64,
}

impl RawEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, value: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            value,
        }
    }
}

/// Node catalog keyed by id, iterated in insertion order.
pub type NodeCatalog = IndexMap<String, NodeCatalogEntry>;

/// A validated series: the full node catalog plus one edge list per timestamp.
///
/// Timestamps keep the order of the raw document; they are not sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesInput {
    pub nodes: NodeCatalog,
    pub links_by_timestamp: IndexMap<Timestamp, Vec<RawEdge>>,
}

impl TimeSeriesInput {
    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.links_by_timestamp.keys().copied()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataState {
    Loading,
    Streaming,
    #[default]
    Done,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Field {
    pub name: String,
    pub values: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Series {
    pub name: Option<String>,
    pub fields: Vec<Field>,
}

/// One update from the data source, shaped like a dashboard query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataFrame {
    pub state: DataState,
    pub error: Option<String>,
    pub series: Vec<Series>,
}

impl DataFrame {
    /// Wraps a single value cell into a one-series, one-field frame.
    pub fn from_cell(cell: serde_json::Value) -> Self {
        Self {
            state: DataState::Done,
            error: None,
            series: vec![Series {
                name: None,
                fields: vec![Field {
                    name: "sankey".to_string(),
                    values: vec![cell],
                }],
            }],
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: DataState::Error,
            error: Some(message.into()),
            series: Vec::new(),
        }
    }
}
