use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use sankey_core::{DataFrame, Msg};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

type PanelStream = Framed<UnixStream, LengthDelimitedCodec>;

pub async fn run(
    sock_path: &str,
    frames: watch::Receiver<Arc<DataFrame>>,
    bus_tx: broadcast::Sender<Msg>,
) -> Result<()> {
    let listener = UnixListener::bind(sock_path)?;
    tracing::info!(sock_path, "sankey-hub listening");
    serve(listener, frames, bus_tx).await
}

async fn serve(
    listener: UnixListener,
    frames: watch::Receiver<Arc<DataFrame>>,
    bus_tx: broadcast::Sender<Msg>,
) -> Result<()> {
    let mut next_panel: u64 = 0;
    loop {
        let (stream, _addr) = listener.accept().await?;
        let panel = next_panel;
        next_panel += 1;
        tracing::info!(panel, "panel connected");

        let frames = frames.clone();
        let bus_tx = bus_tx.clone();
        tokio::spawn(async move {
            match serve_panel(stream, frames, bus_tx).await {
                Ok(()) => tracing::info!(panel, "panel disconnected"),
                Err(err) => tracing::warn!(panel, error = %err, "panel connection failed"),
            }
        });
    }
}

async fn send(framed: &mut PanelStream, msg: &Msg) -> Result<()> {
    framed.send(Bytes::from(serde_json::to_vec(msg)?)).await?;
    Ok(())
}

async fn send_frame(framed: &mut PanelStream, frame: &DataFrame) -> Result<()> {
    let msg = Msg::Frame {
        frame: frame.clone(),
    };
    send(framed, &msg).await
}

async fn serve_panel(
    stream: UnixStream,
    mut frames: watch::Receiver<Arc<DataFrame>>,
    bus_tx: broadcast::Sender<Msg>,
) -> Result<()> {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
    // subscribe before Hello so no broadcast after it is missed
    let mut bus_rx = bus_tx.subscribe();

    send(&mut framed, &Msg::hello()).await?;
    let current = Arc::clone(&frames.borrow_and_update());
    send_frame(&mut framed, &current).await?;

    loop {
        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                let frame = Arc::clone(&frames.borrow_and_update());
                send_frame(&mut framed, &frame).await?;
            }
            event = bus_rx.recv() => match event {
                Ok(msg) => send(&mut framed, &msg).await?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "panel lagging behind time events");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = framed.next() => {
                let Some(bytes) = incoming else {
                    break;
                };
                let bytes = bytes?;
                match serde_json::from_slice::<Msg>(&bytes) {
                    Ok(msg @ Msg::TimeEvent { .. }) => {
                        // no receivers is fine
                        let _ = bus_tx.send(msg);
                    }
                    Ok(Msg::Ping) => send(&mut framed, &Msg::Pong).await?,
                    Ok(Msg::Hello { version }) => tracing::debug!(version = %version, "panel hello"),
                    Ok(other) => tracing::debug!(msg = ?other, "ignoring panel message"),
                    Err(err) => tracing::warn!(error = %err, "undecodable panel message"),
                }
            }
        }
    }

    Ok(())
}
