use anyhow::{Context, Result};
use sankey_core::DataFrame;
use std::fs;
use std::path::Path;

/// Reads a series file. A bare `{ nodes, links }` object is accepted and
/// wrapped as a single-series frame.
pub fn load_frame(path: &Path) -> Result<DataFrame> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read series file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse series file {}", path.display()))?;
    frame_from_value(value)
}

fn frame_from_value(value: serde_json::Value) -> Result<DataFrame> {
    let is_frame = value.get("series").is_some() || value.get("state").is_some();
    if is_frame {
        serde_json::from_value(value).context("failed to decode data frame")
    } else {
        Ok(DataFrame::from_cell(value))
    }
}

/// Like [`load_frame`], but a failure becomes an error frame so panels can
/// show it.
pub fn load_or_failed(path: &Path) -> DataFrame {
    match load_frame(path) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "series unavailable");
            DataFrame::failed(format!("{err:#}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sankey_core::{parse_frame, DataState};
    use tempfile::tempdir;

    #[test]
    fn bare_cell_is_wrapped() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("flows.json");
        fs::write(
            &path,
            r#"{"nodes":{"A":{"id":"A","label":"A"},"B":{"id":"B","label":"B"}},
               "links":{"10":[{"source":"A","target":"B","value":5}]}}"#,
        )
        .expect("write");

        let frame = load_frame(&path).expect("frame");
        assert_eq!(frame.state, DataState::Done);
        let input = parse_frame(&frame).expect("valid series");
        assert_eq!(input.timestamps().collect::<Vec<_>>(), vec![10]);
    }

    #[test]
    fn full_frame_is_kept() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("frame.json");
        fs::write(&path, r#"{"state":"Error","error":"backend down","series":[]}"#).expect("write");

        let frame = load_frame(&path).expect("frame");
        assert_eq!(frame.state, DataState::Error);
        assert_eq!(frame.error.as_deref(), Some("backend down"));
    }

    #[test]
    fn missing_file_becomes_error_frame() {
        let dir = tempdir().expect("tempdir");
        let frame = load_or_failed(&dir.path().join("absent.json"));
        assert_eq!(frame.state, DataState::Error);
        assert!(frame.error.expect("message").contains("absent.json"));
    }

    #[test]
    fn invalid_json_becomes_error_frame() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ nodes").expect("write");
        assert_eq!(load_or_failed(&path).state, DataState::Error);
    }
}
