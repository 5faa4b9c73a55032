use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use super::manager::SessionCore;
use crate::protocol::InboundEvent;
use crate::rtc::PeerEvent;

/// Single consumer of everything that arrives asynchronously during a call.
/// Runs until the session leaves the joined phase.
pub(crate) async fn run(
    core: Arc<SessionCore>,
    mut inbound: mpsc::UnboundedReceiver<InboundEvent>,
    mut peer_rx: mpsc::UnboundedReceiver<PeerEvent>,
    mut ended_rx: mpsc::UnboundedReceiver<String>,
) {
    loop {
        tokio::select! {
            event = inbound.recv() => {
                core.handle_inbound(event.unwrap_or(InboundEvent::Disconnected)).await;
            }
            Some(event) = peer_rx.recv() => {
                core.handle_peer_event(event).await;
            }
            Some(track_id) = ended_rx.recv() => {
                core.handle_track_ended(&track_id).await;
            }
        }
        if !core.is_joined().await {
            break;
        }
    }
    debug!("Session pump stopped");
}
