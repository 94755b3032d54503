mod host;
mod net;
mod render;
mod state;
mod util;

use anyhow::Result;
use crossbeam_channel::select;
use host::HostCommand;
use net::{Incoming, IncomingKind};
use sankey_core::{HoverBus, HoverEvent};
use state::PanelState;
use std::io::Write;
use std::time::{Duration, Instant};

const IDLE_WAIT: Duration = Duration::from_millis(500);

enum Step {
    Continue,
    HostClosed,
    HoverClosed,
    Stop,
}

// stdout carries render frames
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let overrides = util::config::parse_args()?;
    let cfg = overrides.load();
    if overrides.write_config {
        overrides.persist(&cfg)?;
        tracing::info!("panel config written");
    }
    tracing::info!(
        socket = %cfg.socket_path,
        width = cfg.width,
        height = cfg.height,
        event = %cfg.hover_event,
        "panel starting"
    );

    let bus = HoverBus::new();
    let (net_tx, net_rx) = crossbeam_channel::unbounded();
    net::spawn_reader(cfg.socket_path.clone(), net_tx, bus.clone());
    let (host_tx, mut host_rx) = crossbeam_channel::unbounded();
    host::spawn_stdin_reader(host_tx);

    let mut state = PanelState::new(&cfg, &bus);
    let mut hover_rx = state.hover_receiver();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    loop {
        let wait = state
            .next_wakeup()
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_WAIT);

        let step = select! {
            recv(net_rx) -> msg => match msg {
                Ok(incoming) => {
                    handle_incoming(&mut state, incoming);
                    Step::Continue
                }
                Err(_) => Step::Stop,
            },
            recv(host_rx) -> cmd => match cmd {
                Ok(HostCommand::Quit) => Step::Stop,
                Ok(cmd) => {
                    handle_command(&mut state, &bus, &cfg.hover_event, cmd);
                    Step::Continue
                }
                Err(_) => Step::HostClosed,
            },
            recv(hover_rx) -> ev => match ev {
                Ok(event) => {
                    state.on_hover(&event, Instant::now());
                    Step::Continue
                }
                Err(_) => Step::HoverClosed,
            },
            default(wait) => Step::Continue,
        };

        match step {
            Step::Stop => break,
            Step::HostClosed => {
                // keep serving the hub without stdin
                host_rx = crossbeam_channel::never();
            }
            Step::HoverClosed => hover_rx = crossbeam_channel::never(),
            Step::Continue => {}
        }

        let now = Instant::now();
        state.pump_hover(now);
        state.tick(now);
        if state.take_redraw() {
            render::write_frame(&mut out, &state)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn handle_incoming(state: &mut PanelState, incoming: Incoming) {
    match incoming.kind {
        IncomingKind::Connected => tracing::info!(stream = %incoming.stream, "connected to hub"),
        IncomingKind::Disconnected => {
            tracing::info!(stream = %incoming.stream, "hub disconnected")
        }
        IncomingKind::Frame(frame) => state.apply_frame(&frame),
        IncomingKind::Other(msg) => tracing::debug!(?msg, "hub message"),
        IncomingKind::Error(err) => tracing::warn!(stream = %incoming.stream, error = %err, "hub error"),
    }
}

fn handle_command(state: &mut PanelState, bus: &HoverBus, event: &str, cmd: HostCommand) {
    match cmd {
        HostCommand::Resize { .. } => match cmd.canvas_size() {
            Some(size) => state.resize(size),
            None => tracing::warn!(?cmd, "ignoring invalid canvas size"),
        },
        HostCommand::Hover { time } => {
            bus.publish(event, HoverEvent { time });
        }
        HostCommand::Quit => {}
    }
}
