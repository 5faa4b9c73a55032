//! Offer/answer state machine for a single remote participant.
//!
//! The later joiner of any pair is the initiator: it sends the first offer
//! and, should both sides ever offer at once, keeps its own offer. The other
//! side rolls back, answers, and re-offers whatever it had pending.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use meetify_common::ParticipantId;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::{LinkSnapshot, LinkState, RemoteStream};
use crate::error::CallError;
use crate::media::{LocalTrack, TrackKind};
use crate::protocol::{IceCandidate, OutboundMessage, SessionDescription, SignalPayload};
use crate::rtc::{PeerConnection, SenderId};
use crate::signaling::SignalingChannel;

struct OutgoingSender {
    id: SenderId,
    track_id: Option<String>,
}

pub struct PeerLink {
    remote_id: ParticipantId,
    generation: u64,
    initiator: bool,
    state: LinkState,
    connection: Arc<dyn PeerConnection>,
    remote_description_set: bool,
    /// Candidates that arrived before any remote description, in arrival order.
    pending_candidates: VecDeque<IceCandidate>,
    senders: HashMap<TrackKind, OutgoingSender>,
    remote_streams: HashMap<TrackKind, RemoteStream>,
    renegotiation_pending: bool,
    connected: bool,
    watchdog: Option<JoinHandle<()>>,
}

impl PeerLink {
    pub fn new(
        remote_id: ParticipantId,
        generation: u64,
        initiator: bool,
        connection: Arc<dyn PeerConnection>,
    ) -> Self {
        Self {
            remote_id,
            generation,
            initiator,
            state: LinkState::New,
            connection,
            remote_description_set: false,
            pending_candidates: VecDeque::new(),
            senders: HashMap::new(),
            remote_streams: HashMap::new(),
            renegotiation_pending: false,
            connected: false,
            watchdog: None,
        }
    }

    pub fn remote_id(&self) -> &ParticipantId {
        &self.remote_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn renegotiation_pending(&self) -> bool {
        self.renegotiation_pending
    }

    /// Id of the local track the `kind` sender carries, if any.
    pub fn outgoing_track(&self, kind: TrackKind) -> Option<&str> {
        self.senders.get(&kind).and_then(|s| s.track_id.as_deref())
    }

    pub fn remote_stream(&self, kind: TrackKind) -> Option<&RemoteStream> {
        self.remote_streams.get(&kind)
    }

    /// Task that reports a connectivity timeout. Aborted once connected or
    /// closed.
    pub fn set_watchdog(&mut self, handle: JoinHandle<()>) {
        if let Some(old) = self.watchdog.replace(handle) {
            old.abort();
        }
    }

    fn invalid_state(&self, op: &'static str) -> CallError {
        CallError::InvalidState {
            op,
            state: self.state.to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Offer / answer
    // -----------------------------------------------------------------------

    /// Send the first offer. Only valid on a fresh link.
    pub async fn create_offer(&mut self, channel: &dyn SignalingChannel) -> Result<(), CallError> {
        if self.state != LinkState::New {
            return Err(self.invalid_state("create offer"));
        }
        self.send_offer(channel).await?;
        self.state = LinkState::HaveLocalOffer;
        Ok(())
    }

    async fn send_offer(&mut self, channel: &dyn SignalingChannel) -> Result<(), CallError> {
        let offer = self.connection.create_offer().await?;
        self.connection.set_local_description(&offer).await?;
        debug!(remote_id = %self.remote_id, "Sending offer");
        channel
            .send(OutboundMessage::Signal {
                to: self.remote_id.clone(),
                payload: SignalPayload::Sdp(offer),
            })
            .await
    }

    /// Apply a remote offer and answer it.
    pub async fn receive_offer(
        &mut self,
        offer: SessionDescription,
        channel: &dyn SignalingChannel,
    ) -> Result<(), CallError> {
        match self.state {
            LinkState::New | LinkState::Stable => {}
            LinkState::HaveLocalOffer | LinkState::Renegotiating => {
                if self.initiator {
                    info!(remote_id = %self.remote_id, "Ignoring colliding offer");
                    return Err(CallError::NegotiationConflict(self.remote_id.clone()));
                }
                info!(remote_id = %self.remote_id, "Offer collision, rolling back");
                self.connection.rollback().await?;
                self.renegotiation_pending = true;
                self.state = if self.remote_description_set {
                    LinkState::Stable
                } else {
                    LinkState::New
                };
            }
            LinkState::HaveRemoteOffer | LinkState::Closed => {
                return Err(self.invalid_state("accept offer"));
            }
        }

        let resume = self.state;
        self.state = LinkState::HaveRemoteOffer;
        if let Err(e) = self.answer(offer, channel).await {
            self.state = resume;
            return Err(e);
        }
        self.state = LinkState::Stable;
        self.run_pending_renegotiation(channel).await
    }

    async fn answer(
        &mut self,
        offer: SessionDescription,
        channel: &dyn SignalingChannel,
    ) -> Result<(), CallError> {
        self.connection.set_remote_description(&offer).await?;
        self.remote_description_set = true;
        self.flush_candidates().await;
        let answer = self.connection.create_answer().await?;
        self.connection.set_local_description(&answer).await?;
        debug!(remote_id = %self.remote_id, "Sending answer");
        channel
            .send(OutboundMessage::Signal {
                to: self.remote_id.clone(),
                payload: SignalPayload::Sdp(answer),
            })
            .await
    }

    /// Apply the answer to our outstanding offer.
    pub async fn receive_answer(
        &mut self,
        answer: SessionDescription,
        channel: &dyn SignalingChannel,
    ) -> Result<(), CallError> {
        if !matches!(
            self.state,
            LinkState::HaveLocalOffer | LinkState::Renegotiating
        ) {
            return Err(CallError::InvalidSignal(format!(
                "answer from {} while {}",
                self.remote_id, self.state
            )));
        }
        self.connection.set_remote_description(&answer).await?;
        self.remote_description_set = true;
        self.flush_candidates().await;
        self.state = LinkState::Stable;
        self.run_pending_renegotiation(channel).await
    }

    // -----------------------------------------------------------------------
    // ICE
    // -----------------------------------------------------------------------

    /// Apply a candidate, or queue it until a remote description exists.
    pub async fn receive_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), CallError> {
        if self.state == LinkState::Closed {
            return Err(self.invalid_state("add candidate"));
        }
        if !self.remote_description_set {
            debug!(remote_id = %self.remote_id, queued = self.pending_candidates.len() + 1, "Queueing early candidate");
            self.pending_candidates.push_back(candidate);
            return Ok(());
        }
        self.connection.add_ice_candidate(&candidate).await
    }

    async fn flush_candidates(&mut self) {
        while let Some(candidate) = self.pending_candidates.pop_front() {
            if let Err(e) = self.connection.add_ice_candidate(&candidate).await {
                warn!(remote_id = %self.remote_id, error = %e, "Dropping queued candidate");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tracks
    // -----------------------------------------------------------------------

    /// Put `track` on the `kind` sender. Returns true when a new sender had
    /// to be added, which means the link must renegotiate.
    pub async fn attach_track(
        &mut self,
        kind: TrackKind,
        track: Option<&LocalTrack>,
    ) -> Result<bool, CallError> {
        if self.state == LinkState::Closed {
            return Ok(false);
        }
        if let Some(sender) = self.senders.get_mut(&kind) {
            self.connection.replace_track(sender.id, track).await?;
            sender.track_id = track.map(|t| t.id().to_string());
            return Ok(false);
        }
        let Some(track) = track else {
            return Ok(false);
        };
        let id = self.connection.add_track(track).await?;
        self.senders.insert(
            kind,
            OutgoingSender {
                id,
                track_id: Some(track.id().to_string()),
            },
        );
        Ok(true)
    }

    /// Offer again now if stable, otherwise once the current exchange ends.
    pub async fn request_renegotiation(
        &mut self,
        channel: &dyn SignalingChannel,
    ) -> Result<(), CallError> {
        match self.state {
            LinkState::Stable => {
                self.renegotiation_pending = false;
                self.send_offer(channel).await?;
                self.state = LinkState::Renegotiating;
            }
            LinkState::Closed => {}
            _ => {
                debug!(remote_id = %self.remote_id, state = %self.state, "Deferring renegotiation");
                self.renegotiation_pending = true;
            }
        }
        Ok(())
    }

    async fn run_pending_renegotiation(
        &mut self,
        channel: &dyn SignalingChannel,
    ) -> Result<(), CallError> {
        if self.renegotiation_pending && self.state == LinkState::Stable {
            return self.request_renegotiation(channel).await;
        }
        Ok(())
    }

    /// Record media arriving from the remote side. Replaces whatever was
    /// previously shown for that kind.
    pub fn on_remote_track(
        &mut self,
        kind: TrackKind,
        stream_id: &str,
        label: &str,
    ) -> RemoteStream {
        let stream = RemoteStream::new(kind, stream_id, label);
        self.remote_streams.insert(kind, stream.clone());
        stream
    }

    /// Returns true the first time connectivity is reported.
    pub fn mark_connected(&mut self) -> bool {
        if self.connected || self.state == LinkState::Closed {
            return false;
        }
        self.connected = true;
        if let Some(handle) = self.watchdog.take() {
            handle.abort();
        }
        true
    }

    /// Tear down the connection. Idempotent.
    pub async fn close(&mut self) {
        if self.state == LinkState::Closed {
            return;
        }
        self.state = LinkState::Closed;
        self.pending_candidates.clear();
        self.renegotiation_pending = false;
        if let Some(handle) = self.watchdog.take() {
            handle.abort();
        }
        if let Err(e) = self.connection.close().await {
            warn!(remote_id = %self.remote_id, error = %e, "Error closing peer connection");
        }
        debug!(remote_id = %self.remote_id, "Peer link closed");
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        let mut remote_streams: Vec<RemoteStream> = self.remote_streams.values().cloned().collect();
        remote_streams.sort_by_key(|s| s.kind.as_str());
        LinkSnapshot {
            remote_id: self.remote_id.clone(),
            state: self.state,
            initiator: self.initiator,
            connected: self.connected,
            outgoing_audio: self.outgoing_track(TrackKind::Audio).map(str::to_string),
            outgoing_video: self.outgoing_track(TrackKind::Video).map(str::to_string),
            remote_streams,
            pending_candidates: self.pending_candidates.len(),
        }
    }
}

impl Drop for PeerLink {
    fn drop(&mut self) {
        if let Some(handle) = self.watchdog.take() {
            handle.abort();
        }
    }
}
