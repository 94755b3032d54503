//! Validation boundary between untyped frames and [`TimeSeriesInput`].

use indexmap::IndexMap;
use serde::Deserialize;

use crate::model::{DataFrame, DataState, NodeCatalog, RawEdge, TimeSeriesInput, Timestamp};

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("data source reported an error: {0}")]
    DataState(String),
    #[error("expected exactly one series, got {0}")]
    SeriesCount(usize),
    #[error("series has no value cell")]
    MissingValueCell,
    #[error("malformed series cell: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("timestamp key {0:?} is not an integer number of seconds")]
    BadTimestamp(String),
    #[error("catalog key {key:?} holds node with id {id:?}")]
    CatalogKeyMismatch { key: String, id: String },
    #[error("edge {from} -> {to} at {timestamp} has invalid value {value}")]
    InvalidValue {
        timestamp: Timestamp,
        from: String,
        to: String,
        value: f64,
    },
}

#[derive(Deserialize)]
struct RawCell {
    nodes: NodeCatalog,
    links: IndexMap<String, Vec<RawEdge>>,
}

/// Turns one data-source update into a checked series.
pub fn parse_frame(frame: &DataFrame) -> Result<TimeSeriesInput, InputError> {
    if frame.state == DataState::Error {
        let message = frame
            .error
            .clone()
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(InputError::DataState(message));
    }
    if frame.series.len() != 1 {
        return Err(InputError::SeriesCount(frame.series.len()));
    }

    let cell = frame.series[0]
        .fields
        .first()
        .and_then(|field| field.values.first())
        .ok_or(InputError::MissingValueCell)?;

    parse_cell(cell.clone())
}

/// Decodes the `{ nodes, links }` value cell itself.
pub fn parse_cell(cell: serde_json::Value) -> Result<TimeSeriesInput, InputError> {
    let raw: RawCell = serde_json::from_value(cell).map_err(InputError::Malformed)?;

    for (key, entry) in &raw.nodes {
        if key != &entry.id {
            return Err(InputError::CatalogKeyMismatch {
                key: key.clone(),
                id: entry.id.clone(),
            });
        }
    }

    let mut links_by_timestamp = IndexMap::with_capacity(raw.links.len());
    for (key, edges) in raw.links {
        let timestamp = parse_timestamp(&key)?;
        if let Some(bad) = edges
            .iter()
            .find(|edge| !edge.value.is_finite() || edge.value < 0.0)
        {
            return Err(InputError::InvalidValue {
                timestamp,
                from: bad.source.clone(),
                to: bad.target.clone(),
                value: bad.value,
            });
        }
        // a later key for the same second replaces the earlier edges in place
        links_by_timestamp.insert(timestamp, edges);
    }

    Ok(TimeSeriesInput {
        nodes: raw.nodes,
        links_by_timestamp,
    })
}

fn parse_timestamp(key: &str) -> Result<Timestamp, InputError> {
    key.trim()
        .parse::<Timestamp>()
        .map_err(|_| InputError::BadTimestamp(key.to_string()))
}
