use anyhow::Result;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sankey_core::DataFrame;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::source;

const COALESCE_WINDOW: Duration = Duration::from_millis(250);

fn is_reload(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

fn touches(paths: &[PathBuf], name: Option<&OsString>) -> bool {
    let Some(name) = name else {
        return false;
    };
    paths
        .iter()
        .any(|p| p.file_name().is_some_and(|n| n == name.as_os_str()))
}

// Editors often replace the file, so watch its directory.
fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Reloads `path` on change and publishes the new frame. Bursts of file
/// events within one window trigger a single reload.
pub fn spawn(path: PathBuf, tx: watch::Sender<Arc<DataFrame>>) -> Result<RecommendedWatcher> {
    let (raw_tx, mut raw_rx) = mpsc::channel::<()>(64);
    let name = path.file_name().map(|n| n.to_os_string());

    let mut watcher: RecommendedWatcher = Watcher::new(
        move |res: std::result::Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if is_reload(&event.kind) && touches(&event.paths, name.as_ref()) {
                    // full channel means a reload is already queued
                    let _ = raw_tx.try_send(());
                }
            }
            Err(err) => tracing::warn!(error = %err, "file watcher error"),
        },
        notify::Config::default(),
    )?;
    watcher.watch(&watch_dir(&path), RecursiveMode::NonRecursive)?;

    tokio::spawn(async move {
        let mut dirty = false;
        let mut tick = tokio::time::interval(COALESCE_WINDOW);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = raw_rx.recv() => match msg {
                    Some(()) => dirty = true,
                    None => break,
                },
                _ = tick.tick() => {
                    if !dirty {
                        continue;
                    }
                    dirty = false;
                    let frame = source::load_or_failed(&path);
                    tracing::info!(path = %path.display(), state = ?frame.state, "series reloaded");
                    if tx.send(Arc::new(frame)).is_err() {
                        break;
                    }
                }
            }
        }
    });

    Ok(watcher)
}
