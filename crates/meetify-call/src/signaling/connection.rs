//! Background tasks for an established relay WebSocket.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tracing::{debug, info, warn};

use crate::protocol::{InboundEvent, WireFrame};

#[derive(Debug)]
pub(crate) enum WsCommand {
    Send(WireFrame),
    Close,
}

/// Start the reader, writer and keepalive tasks. The reader owns the
/// lifetime: when the socket ends it stops the others and reports
/// [`InboundEvent::Disconnected`].
pub(crate) fn spawn_connection<R, W>(
    ws_read: R,
    ws_write: W,
    inbound_tx: mpsc::UnboundedSender<InboundEvent>,
    command_rx: mpsc::Receiver<WsCommand>,
    keepalive: Option<Duration>,
) where
    R: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin + Send + 'static,
    W: Sink<WsMessage> + Unpin + Send + 'static,
{
    let ws_write = Arc::new(Mutex::new(ws_write));
    let forwarder = tokio::spawn(command_forwarder(command_rx, Arc::clone(&ws_write)));
    let heartbeat = keepalive.map(|every| tokio::spawn(keepalive_task(Arc::clone(&ws_write), every)));

    tokio::spawn(async move {
        read_loop(ws_read, &inbound_tx).await;
        forwarder.abort();
        if let Some(handle) = heartbeat {
            handle.abort();
        }
        let _ = inbound_tx.send(InboundEvent::Disconnected);
    });
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

async fn read_loop<R>(mut ws_read: R, inbound_tx: &mpsc::UnboundedSender<InboundEvent>)
where
    R: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = ws_read.next().await {
        match msg_result {
            Ok(WsMessage::Text(text)) => {
                let frame = match serde_json::from_str::<WireFrame>(&text) {
                    Ok(frame) => frame,
                    Err(_) => {
                        debug!(text = %text, "Unrecognized message from relay");
                        continue;
                    }
                };
                let name = frame.event.clone();
                match frame.into_inbound() {
                    Ok(Some(event)) => {
                        if inbound_tx.send(event).is_err() {
                            return;
                        }
                    }
                    Ok(None) => debug!(event = %name, "Ignoring relay event"),
                    Err(e) => warn!(event = %name, error = %e, "Dropping malformed relay event"),
                }
            }
            Ok(WsMessage::Close(_)) => {
                info!("Signaling relay closed connection");
                return;
            }
            Err(e) => {
                warn!(error = %e, "WebSocket error");
                return;
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

async fn command_forwarder<W>(mut command_rx: mpsc::Receiver<WsCommand>, ws_write: Arc<Mutex<W>>)
where
    W: Sink<WsMessage> + Unpin,
{
    while let Some(cmd) = command_rx.recv().await {
        match cmd {
            WsCommand::Send(frame) => {
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode relay frame");
                        continue;
                    }
                };
                let mut writer = ws_write.lock().await;
                if writer.send(WsMessage::Text(json.into())).await.is_err() {
                    warn!(event = %frame.event, "Relay write failed");
                    break;
                }
            }
            WsCommand::Close => {
                let mut writer = ws_write.lock().await;
                let _ = writer.send(WsMessage::Close(None)).await;
                break;
            }
        }
    }
}

async fn keepalive_task<W>(ws_write: Arc<Mutex<W>>, every: Duration)
where
    W: Sink<WsMessage> + Unpin,
{
    let mut interval = tokio::time::interval(every);
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        let mut writer = ws_write.lock().await;
        if writer.send(WsMessage::Ping(Default::default())).await.is_err() {
            break;
        }
    }
}
