//! Public handle for a call.

use std::sync::Arc;

use meetify_common::ParticipantId;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::pump;
use super::types::{CallEvent, SessionConfig, SessionHandle, SessionPhase};
use crate::chat::{ChatChannel, ChatMessage};
use crate::error::CallError;
use crate::media::{MediaRequest, MediaSource};
use crate::peer::{LinkSnapshot, PeerRegistry};
use crate::protocol::OutboundMessage;
use crate::rtc::{PeerEvent, RtcConfig, RtcEngine};
use crate::signaling::{SignalingChannel, SignalingConnector, SignalingLink};
use crate::tracks::{LocalMediaSnapshot, TrackController};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Everything a call mutates, under one lock. Handlers hold it across their
/// awaits so relay events, peer events and UI commands never interleave.
pub(crate) struct SessionState {
    pub(crate) phase: SessionPhase,
    pub(crate) handle: Option<SessionHandle>,
    pub(crate) channel: Option<Arc<dyn SignalingChannel>>,
    pub(crate) registry: PeerRegistry,
    pub(crate) tracks: TrackController,
    pub(crate) chat: ChatChannel,
    /// Stamped on each new link so events from a replaced link are ignored.
    pub(crate) next_generation: u64,
    pub(crate) peer_tx: Option<mpsc::UnboundedSender<PeerEvent>>,
    pub(crate) pump: Option<JoinHandle<()>>,
}

impl SessionState {
    /// The relay channel, provided the call is live.
    pub(crate) fn joined_channel(&self) -> Result<Arc<dyn SignalingChannel>, CallError> {
        if self.phase != SessionPhase::Joined {
            return Err(CallError::NotJoined);
        }
        self.channel.clone().ok_or(CallError::NotJoined)
    }
}

pub(crate) struct SessionCore {
    pub(crate) config: SessionConfig,
    pub(crate) connector: Arc<dyn SignalingConnector>,
    pub(crate) media: Arc<dyn MediaSource>,
    pub(crate) engine: Arc<dyn RtcEngine>,
    pub(crate) event_tx: mpsc::Sender<CallEvent>,
    pub(crate) state: Mutex<SessionState>,
}

impl SessionCore {
    /// Never waits: a full channel drops the event rather than stall the
    /// session lock behind a slow consumer.
    pub(crate) fn emit(&self, event: CallEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(?event, "Call event channel full, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    pub(crate) fn rtc_config(&self) -> RtcConfig {
        RtcConfig {
            ice_servers: self.config.ice_servers.clone(),
        }
    }

    /// Close every link, release devices and the relay connection, and
    /// return to idle.
    pub(crate) async fn teardown(&self, state: &mut SessionState) {
        for mut link in state.registry.drain() {
            link.close().await;
        }
        state.tracks.release_all();
        state.chat.clear();
        state.peer_tx = None;
        if let Some(channel) = state.channel.take() {
            channel.close().await;
        }
        state.handle = None;
        state.phase = SessionPhase::Idle;
    }
}

// ---------------------------------------------------------------------------
// Call Session
// ---------------------------------------------------------------------------

/// One participant's view of a mesh call.
pub struct CallSession {
    pub(crate) core: Arc<SessionCore>,
}

impl CallSession {
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn SignalingConnector>,
        media: Arc<dyn MediaSource>,
        engine: Arc<dyn RtcEngine>,
    ) -> (Self, mpsc::Receiver<CallEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));
        let state = SessionState {
            phase: SessionPhase::Idle,
            handle: None,
            channel: None,
            registry: PeerRegistry::new(),
            tracks: TrackController::new(Arc::clone(&media)),
            chat: ChatChannel::new(config.chat_history),
            next_generation: 0,
            peer_tx: None,
            pump: None,
        };
        let session = Self {
            core: Arc::new(SessionCore {
                config,
                connector,
                media,
                engine,
                event_tx,
                state: Mutex::new(state),
            }),
        };
        (session, event_rx)
    }

    /// Open devices, connect to the relay and enter `room_id`.
    ///
    /// Devices that cannot be opened are reported as
    /// [`CallEvent::MediaUnavailable`] and the call proceeds without them.
    /// An unreachable relay fails the join and leaves the session idle.
    pub async fn join(
        &self,
        room_id: &str,
        display_name: &str,
    ) -> Result<SessionHandle, CallError> {
        let core = &self.core;
        let mut state = core.state.lock().await;
        if state.phase != SessionPhase::Idle {
            return Err(CallError::InvalidState {
                op: "join",
                state: state.phase.to_string(),
            });
        }
        state.phase = SessionPhase::Joining;
        info!(room_id, display_name, "Joining call");

        let failures = state
            .tracks
            .start(MediaRequest {
                audio: core.config.start_with_audio,
                video: core.config.start_with_video,
            })
            .await;
        for failure in failures {
            core.emit(CallEvent::MediaUnavailable {
                kind: failure.kind(),
                reason: failure.to_string(),
            });
        }

        let SignalingLink { channel, inbound } = match core
            .connector
            .connect(core.config.access_token.as_deref())
            .await
        {
            Ok(link) => link,
            Err(e) => {
                warn!(error = %e, "Signaling relay unreachable");
                state.tracks.release_all();
                state.phase = SessionPhase::Idle;
                return Err(e);
            }
        };
        if let Err(e) = channel
            .send(OutboundMessage::JoinCall {
                room: room_id.to_string(),
            })
            .await
        {
            warn!(error = %e, "Failed to announce join");
            channel.close().await;
            state.tracks.release_all();
            state.phase = SessionPhase::Idle;
            return Err(match e {
                CallError::ChannelUnavailable(_) => e,
                other => CallError::ChannelUnavailable(other.to_string()),
            });
        }

        let handle = SessionHandle {
            local_id: channel.local_id().clone(),
            room_id: room_id.to_string(),
            display_name: display_name.to_string(),
        };
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        core.media.watch_ended(ended_tx);

        state.channel = Some(channel);
        state.handle = Some(handle.clone());
        state.peer_tx = Some(peer_tx);
        state.chat.clear();
        state.phase = SessionPhase::Joined;
        state.pump = Some(tokio::spawn(pump::run(
            Arc::clone(core),
            inbound,
            peer_rx,
            ended_rx,
        )));

        core.emit(CallEvent::Joined(handle.clone()));
        core.emit(CallEvent::LocalMedia(state.tracks.snapshot()));
        info!(local_id = %handle.local_id, room_id, "Joined call");
        Ok(handle)
    }

    /// Close every link, stop all devices and disconnect. Idempotent.
    pub async fn leave(&self) {
        let mut state = self.core.state.lock().await;
        if state.phase != SessionPhase::Joined {
            debug!(phase = %state.phase, "Leave ignored");
            return;
        }
        state.phase = SessionPhase::Leaving;
        let pump = state.pump.take();
        let links = state.registry.len();
        self.core.teardown(&mut state).await;
        if let Some(pump) = pump {
            pump.abort();
        }
        drop(state);

        self.core.emit(CallEvent::Left);
        info!(links, "Left call");
    }

    // -----------------------------------------------------------------------
    // Media
    // -----------------------------------------------------------------------

    pub async fn toggle_mic(&self) -> Result<LocalMediaSnapshot, CallError> {
        let mut guard = self.core.state.lock().await;
        let channel = guard.joined_channel()?;
        let state = &mut *guard;
        let snapshot = state
            .tracks
            .toggle_mic(&mut state.registry, channel.as_ref())
            .await?;
        self.core.emit(CallEvent::LocalMedia(snapshot.clone()));
        Ok(snapshot)
    }

    pub async fn toggle_camera(&self) -> Result<LocalMediaSnapshot, CallError> {
        let mut guard = self.core.state.lock().await;
        let channel = guard.joined_channel()?;
        let state = &mut *guard;
        let snapshot = state
            .tracks
            .toggle_camera(&mut state.registry, channel.as_ref())
            .await?;
        self.core.emit(CallEvent::LocalMedia(snapshot.clone()));
        Ok(snapshot)
    }

    pub async fn toggle_screen_share(&self) -> Result<LocalMediaSnapshot, CallError> {
        let mut guard = self.core.state.lock().await;
        let channel = guard.joined_channel()?;
        let state = &mut *guard;
        let snapshot = state
            .tracks
            .toggle_screen_share(&mut state.registry, channel.as_ref())
            .await?;
        self.core.emit(CallEvent::LocalMedia(snapshot.clone()));
        Ok(snapshot)
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    pub async fn send_chat(&self, body: &str) -> Result<ChatMessage, CallError> {
        let mut state = self.core.state.lock().await;
        let channel = state.joined_channel()?;
        let name = state
            .handle
            .as_ref()
            .map(|h| h.display_name.clone())
            .unwrap_or_default();
        let message = state.chat.send(body, &name, channel.as_ref()).await?;
        self.core.emit(CallEvent::ChatMessage(message.clone()));
        Ok(message)
    }

    /// Mark the chat panel visible or hidden.
    pub async fn set_chat_focused(&self, focused: bool) {
        let mut state = self.core.state.lock().await;
        if state.chat.set_focused(focused) {
            self.core.emit(CallEvent::UnreadChanged(0));
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn phase(&self) -> SessionPhase {
        self.core.state.lock().await.phase
    }

    pub async fn handle(&self) -> Option<SessionHandle> {
        self.core.state.lock().await.handle.clone()
    }

    pub async fn peer_ids(&self) -> Vec<ParticipantId> {
        self.core.state.lock().await.registry.ids()
    }

    pub async fn link(&self, remote_id: &ParticipantId) -> Option<LinkSnapshot> {
        self.core
            .state
            .lock()
            .await
            .registry
            .get(remote_id)
            .map(|l| l.snapshot())
    }

    pub async fn links(&self) -> Vec<LinkSnapshot> {
        self.core
            .state
            .lock()
            .await
            .registry
            .iter()
            .map(|l| l.snapshot())
            .collect()
    }

    pub async fn local_media(&self) -> LocalMediaSnapshot {
        self.core.state.lock().await.tracks.snapshot()
    }

    pub async fn chat_messages(&self) -> Vec<ChatMessage> {
        self.core.state.lock().await.chat.messages()
    }

    pub async fn unread(&self) -> usize {
        self.core.state.lock().await.chat.unread()
    }
}
