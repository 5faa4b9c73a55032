//! Reactions to relay events, peer-connection events and ended tracks.
//! Every handler is a no-op once the session is no longer joined.

use std::time::Duration;

use meetify_common::ParticipantId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::manager::{SessionCore, SessionState};
use super::types::{CallEvent, SessionPhase};
use crate::error::CallError;
use crate::peer::PeerLink;
use crate::protocol::{InboundEvent, OutboundMessage, SdpKind, SignalPayload};
use crate::rtc::{ConnectionEvent, IceConnectivity, PeerEvent, PeerEventSink};

impl SessionCore {
    pub(crate) async fn is_joined(&self) -> bool {
        self.state.lock().await.phase == SessionPhase::Joined
    }

    // -----------------------------------------------------------------------
    // Relay events
    // -----------------------------------------------------------------------

    pub(crate) async fn handle_inbound(&self, event: InboundEvent) {
        let mut state = self.state.lock().await;
        if state.phase != SessionPhase::Joined {
            debug!(?event, "Ignoring relay event outside a call");
            return;
        }
        match event {
            InboundEvent::UserJoined { id, members } => {
                self.on_user_joined(&mut state, id, members).await
            }
            InboundEvent::UserLeft { id } => self.on_user_left(&mut state, &id).await,
            InboundEvent::Signal { from, payload } => {
                self.on_signal(&mut state, from, payload).await
            }
            InboundEvent::Chat {
                body,
                sender_name,
                sender_id,
            } => self.on_chat(&mut state, body, sender_name, sender_id).await,
            InboundEvent::Disconnected => self.on_disconnected(&mut state).await,
        }
    }

    /// For our own arrival, open a link to everyone already present and
    /// offer. For someone else's, open a link and wait for their offer.
    async fn on_user_joined(
        &self,
        state: &mut SessionState,
        id: ParticipantId,
        members: Vec<ParticipantId>,
    ) {
        let Some(local_id) = state.handle.as_ref().map(|h| h.local_id.clone()) else {
            return;
        };

        // The member list is authoritative: links to anyone missing from it
        // are stale.
        if members.contains(&id) {
            let stale: Vec<ParticipantId> = state
                .registry
                .ids()
                .into_iter()
                .filter(|p| !members.contains(p))
                .collect();
            for remote_id in stale {
                info!(remote_id = %remote_id, "Dropping link to departed participant");
                self.remove_link(state, &remote_id).await;
                self.emit(CallEvent::PeerLeft { remote_id });
            }
        }

        if id == local_id {
            for remote_id in members.iter().filter(|m| **m != local_id) {
                if state.registry.contains(remote_id) {
                    continue;
                }
                if let Err(e) = self.open_link(state, remote_id, true).await {
                    warn!(remote_id = %remote_id, error = %e, "Failed to open link");
                    self.emit(CallEvent::Error(e));
                }
            }
        } else if state.registry.contains(&id) {
            debug!(remote_id = %id, "Duplicate join ignored");
        } else if let Err(e) = self.open_link(state, &id, false).await {
            warn!(remote_id = %id, error = %e, "Failed to open link");
            self.emit(CallEvent::Error(e));
        }
    }

    /// Create a link with the current local tracks attached and register it.
    /// The initiator sends the first offer right away.
    async fn open_link(
        &self,
        state: &mut SessionState,
        remote_id: &ParticipantId,
        initiator: bool,
    ) -> Result<(), CallError> {
        let peer_tx = state.peer_tx.clone().ok_or(CallError::NotJoined)?;
        let channel = state.joined_channel()?;
        let generation = state.next_generation;
        state.next_generation += 1;

        let sink = PeerEventSink::new(remote_id.clone(), generation, peer_tx.clone());
        let connection = self
            .engine
            .create_connection(remote_id, &self.rtc_config(), sink)
            .await?;
        let mut link = PeerLink::new(remote_id.clone(), generation, initiator, connection);
        if let Err(e) = state.tracks.attach_all(&mut link).await {
            warn!(remote_id = %remote_id, error = %e, "Failed to attach local media");
        }
        link.set_watchdog(spawn_watchdog(
            remote_id.clone(),
            generation,
            self.config.ice_timeout,
            peer_tx,
        ));

        let offer_result = if initiator {
            link.create_offer(channel.as_ref()).await
        } else {
            Ok(())
        };
        state.registry.insert(link);
        info!(remote_id = %remote_id, initiator, generation, "Peer link opened");
        self.emit(CallEvent::PeerJoined {
            remote_id: remote_id.clone(),
        });
        offer_result
    }

    async fn on_user_left(&self, state: &mut SessionState, id: &ParticipantId) {
        if self.remove_link(state, id).await {
            info!(remote_id = %id, "Participant left");
            self.emit(CallEvent::PeerLeft {
                remote_id: id.clone(),
            });
        } else {
            debug!(remote_id = %id, "Departure of unknown participant");
        }
    }

    async fn on_signal(
        &self,
        state: &mut SessionState,
        from: ParticipantId,
        payload: SignalPayload,
    ) {
        let Ok(channel) = state.joined_channel() else {
            return;
        };
        if &from == channel.local_id() {
            debug!("Ignoring signal addressed from ourselves");
            return;
        }
        let Some(link) = state.registry.get_mut(&from) else {
            warn!(from = %from, kind = payload.describe(), "Signal from unknown participant discarded");
            return;
        };
        let kind = payload.describe();
        let result = match payload {
            SignalPayload::Sdp(desc) => match desc.kind {
                SdpKind::Offer => link.receive_offer(desc, channel.as_ref()).await,
                SdpKind::Answer => link.receive_answer(desc, channel.as_ref()).await,
            },
            SignalPayload::Ice(candidate) => link.receive_ice_candidate(candidate).await,
        };
        match result {
            Ok(()) => debug!(from = %from, kind, "Signal applied"),
            Err(CallError::NegotiationConflict(_)) => {
                debug!(from = %from, "Colliding offer ignored");
            }
            Err(e) => {
                warn!(from = %from, kind, error = %e, "Signal rejected");
                self.emit(CallEvent::Error(e));
            }
        }
    }

    async fn on_chat(
        &self,
        state: &mut SessionState,
        body: String,
        sender_name: String,
        sender_id: ParticipantId,
    ) {
        let Some(local_id) = state.handle.as_ref().map(|h| h.local_id.clone()) else {
            return;
        };
        let before = state.chat.unread();
        if let Some(message) = state.chat.on_message(body, sender_name, &sender_id, &local_id) {
            self.emit(CallEvent::ChatMessage(message));
            let unread = state.chat.unread();
            if unread != before {
                self.emit(CallEvent::UnreadChanged(unread));
            }
        }
    }

    async fn on_disconnected(&self, state: &mut SessionState) {
        warn!("Signaling relay connection lost, ending call");
        // Called from the pump itself; detach rather than abort.
        state.pump.take();
        self.teardown(state).await;
        self.emit(CallEvent::Disconnected);
    }

    // -----------------------------------------------------------------------
    // Peer connection events
    // -----------------------------------------------------------------------

    pub(crate) async fn handle_peer_event(&self, event: PeerEvent) {
        let mut state = self.state.lock().await;
        if state.phase != SessionPhase::Joined {
            return;
        }
        let PeerEvent {
            remote_id,
            generation,
            event,
        } = event;
        let Some(link) = state.registry.get_mut(&remote_id) else {
            debug!(remote_id = %remote_id, "Event for closed link ignored");
            return;
        };
        if link.generation() != generation {
            debug!(remote_id = %remote_id, generation, "Event from replaced link ignored");
            return;
        }

        match event {
            ConnectionEvent::LocalCandidate(candidate) => {
                let Ok(channel) = state.joined_channel() else {
                    return;
                };
                let msg = OutboundMessage::Signal {
                    to: remote_id.clone(),
                    payload: SignalPayload::Ice(candidate),
                };
                if let Err(e) = channel.send(msg).await {
                    warn!(remote_id = %remote_id, error = %e, "Failed to send candidate");
                }
            }
            ConnectionEvent::RemoteTrack {
                kind,
                stream_id,
                label,
            } => {
                let stream = link.on_remote_track(kind, &stream_id, &label);
                debug!(remote_id = %remote_id, kind = %kind, presentation = stream.presentation, "Remote stream updated");
                self.emit(CallEvent::RemoteStream { remote_id, stream });
            }
            ConnectionEvent::Connectivity(IceConnectivity::Connected) => {
                if link.mark_connected() {
                    info!(remote_id = %remote_id, "Peer connected");
                    self.emit(CallEvent::PeerConnected { remote_id });
                }
            }
            ConnectionEvent::Connectivity(IceConnectivity::Failed) => {
                self.drop_unreachable(&mut state, remote_id, "connectivity failed")
                    .await;
            }
            ConnectionEvent::ConnectivityTimeout => {
                if !link.is_connected() {
                    self.drop_unreachable(&mut state, remote_id, "connectivity timed out")
                        .await;
                }
            }
            ConnectionEvent::Connectivity(other) => {
                debug!(remote_id = %remote_id, state = ?other, "Connectivity changed");
            }
        }
    }

    async fn drop_unreachable(
        &self,
        state: &mut SessionState,
        remote_id: ParticipantId,
        reason: &str,
    ) {
        warn!(remote_id = %remote_id, reason, "Dropping unreachable participant");
        self.remove_link(state, &remote_id).await;
        self.emit(CallEvent::PeerUnreachable { remote_id });
    }

    async fn remove_link(&self, state: &mut SessionState, remote_id: &ParticipantId) -> bool {
        match state.registry.remove(remote_id) {
            Some(mut link) => {
                link.close().await;
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Local tracks
    // -----------------------------------------------------------------------

    pub(crate) async fn handle_track_ended(&self, track_id: &str) {
        let mut guard = self.state.lock().await;
        let Ok(channel) = guard.joined_channel() else {
            return;
        };
        let state = &mut *guard;
        if let Some(snapshot) = state
            .tracks
            .handle_track_ended(track_id, &mut state.registry, channel.as_ref())
            .await
        {
            self.emit(CallEvent::LocalMedia(snapshot));
        }
    }
}

/// Report a connectivity timeout for one link generation.
fn spawn_watchdog(
    remote_id: ParticipantId,
    generation: u64,
    timeout: Duration,
    tx: mpsc::UnboundedSender<PeerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        let _ = tx.send(PeerEvent {
            remote_id,
            generation,
            event: ConnectionEvent::ConnectivityTimeout,
        });
    })
}
