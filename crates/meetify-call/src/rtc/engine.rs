use std::sync::Arc;

use async_trait::async_trait;
use meetify_common::ParticipantId;

use super::types::{PeerEventSink, RtcConfig, SenderId};
use crate::error::CallError;
use crate::media::LocalTrack;
use crate::protocol::{IceCandidate, SessionDescription};

/// Creates one connection per remote participant.
#[async_trait]
pub trait RtcEngine: Send + Sync {
    async fn create_connection(
        &self,
        remote_id: &ParticipantId,
        config: &RtcConfig,
        events: PeerEventSink,
    ) -> Result<Arc<dyn PeerConnection>, CallError>;
}

/// One peer connection, shaped after the browser API the relay's other
/// clients speak.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, CallError>;

    async fn create_answer(&self) -> Result<SessionDescription, CallError>;

    async fn set_local_description(&self, desc: &SessionDescription) -> Result<(), CallError>;

    async fn set_remote_description(&self, desc: &SessionDescription) -> Result<(), CallError>;

    /// Abandon a local offer that has not been answered.
    async fn rollback(&self) -> Result<(), CallError>;

    /// Fails if no remote description has been applied yet.
    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), CallError>;

    /// Adds a sender. Changes the session, so renegotiation is required.
    async fn add_track(&self, track: &LocalTrack) -> Result<SenderId, CallError>;

    /// Swap what an existing sender carries. Takes effect without
    /// renegotiation; `None` leaves the sender sending nothing.
    async fn replace_track(
        &self,
        sender: SenderId,
        track: Option<&LocalTrack>,
    ) -> Result<(), CallError>;

    async fn close(&self) -> Result<(), CallError>;
}
