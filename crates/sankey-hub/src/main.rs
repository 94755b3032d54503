mod config;
mod server;
mod source;
mod watch_fs;

use anyhow::Result;
use config::parse_args;
use sankey_core::Msg;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

fn runtime_sock_path() -> String {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        format!("{dir}/sankey.sock")
    } else {
        "/tmp/sankey.sock".to_string()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = parse_args()?;
    let sock_path = config.socket.clone().unwrap_or_else(runtime_sock_path);

    let initial = source::load_or_failed(&config.input);
    tracing::info!(
        input = %config.input.display(),
        state = ?initial.state,
        series = initial.series.len(),
        "loaded series"
    );
    let (frame_tx, frame_rx) = watch::channel(Arc::new(initial));

    // dropping the watcher stops reloads
    let _watcher = watch_fs::spawn(config.input.clone(), frame_tx)?;

    // time events from any panel reach every panel
    let (bus_tx, _bus_rx) = broadcast::channel::<Msg>(1024);

    // Clean stale socket
    let _ = std::fs::remove_file(&sock_path);

    server::run(&sock_path, frame_rx, bus_tx).await
}
