use crate::net::Incoming;
use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use futures_util::{SinkExt, StreamExt};
use sankey_core::{HoverBus, HoverEvent, Msg};
use tokio::net::UnixStream;
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Connects to the hub on a background thread. Frames go to `tx`; time
/// events are published onto `bus`.
pub fn spawn_reader(sock_path: String, tx: Sender<Incoming>, bus: HoverBus) {
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                let _ = tx.send(Incoming::error(sock_path.clone(), format!("tokio runtime: {e}")));
                let _ = tx.send(Incoming::disconnected(sock_path));
                return;
            }
        };
        rt.block_on(async move {
            if let Err(e) = run(sock_path.clone(), tx.clone(), bus).await {
                let _ = tx.send(Incoming::error(sock_path.clone(), format!("{e:?}")));
                let _ = tx.send(Incoming::disconnected(sock_path.clone()));
            }
        });
    });
}

async fn run(sock_path: String, tx: Sender<Incoming>, bus: HoverBus) -> Result<()> {
    let stream = UnixStream::connect(&sock_path)
        .await
        .with_context(|| format!("connect UDS {sock_path}"))?;

    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    let _ = tx.send(Incoming::connected(sock_path.clone()));

    framed.send(Bytes::from(serde_json::to_vec(&Msg::hello())?)).await?;

    while let Some(frame) = framed.next().await {
        let bytes = frame?;
        match serde_json::from_slice::<Msg>(&bytes) {
            Ok(m) => dispatch(&sock_path, m, &tx, &bus),
            Err(e) => {
                let _ = tx.send(Incoming::error(
                    sock_path.clone(),
                    format!("decode error: {e}"),
                ));
            }
        }
    }

    let _ = tx.send(Incoming::disconnected(sock_path.clone()));
    Ok(())
}

fn dispatch(stream: &str, msg: Msg, tx: &Sender<Incoming>, bus: &HoverBus) {
    match msg {
        Msg::Frame { frame } => {
            let _ = tx.send(Incoming::frame(stream.to_string(), frame));
        }
        Msg::TimeEvent { event, time } => {
            let delivered = bus.publish(&event, HoverEvent { time });
            tracing::trace!(event = %event, time, delivered, "time event");
        }
        other => {
            let _ = tx.send(Incoming::other(stream.to_string(), other));
        }
    }
}
