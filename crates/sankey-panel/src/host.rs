//! Commands from the embedding host, one JSON object per stdin line.

use crossbeam_channel::Sender;
use sankey_core::CanvasSize;
use serde::Deserialize;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum HostCommand {
    Resize { width: f64, height: f64 },
    /// Publishes a time broadcast onto the local bus.
    Hover { time: f64 },
    Quit,
}

impl HostCommand {
    /// Rejects sizes no canvas can have.
    pub fn canvas_size(&self) -> Option<CanvasSize> {
        match *self {
            HostCommand::Resize { width, height }
                if width.is_finite() && height.is_finite() && width >= 0.0 && height >= 0.0 =>
            {
                Some(CanvasSize::new(width, height))
            }
            _ => None,
        }
    }
}

pub fn parse_line(line: &str) -> Option<HostCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(cmd) => Some(cmd),
        Err(err) => {
            tracing::warn!(error = %err, "ignoring host command");
            None
        }
    }
}

/// Reads stdin on a background thread until EOF.
pub fn spawn_stdin_reader(tx: Sender<HostCommand>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if let Some(cmd) = parse_line(&line) {
                if tx.send(cmd).is_err() {
                    break;
                }
            }
        }
    });
}
