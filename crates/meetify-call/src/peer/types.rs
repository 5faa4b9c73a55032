use std::fmt;

use meetify_common::ParticipantId;
use serde::Serialize;

use crate::media::TrackKind;

/// Negotiation state of a [`PeerLink`](super::PeerLink).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkState {
    New,
    HaveLocalOffer,
    HaveRemoteOffer,
    Stable,
    /// A follow-up offer is out, waiting for its answer.
    Renegotiating,
    Closed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkState::New => "new",
            LinkState::HaveLocalOffer => "have-local-offer",
            LinkState::HaveRemoteOffer => "have-remote-offer",
            LinkState::Stable => "stable",
            LinkState::Renegotiating => "renegotiating",
            LinkState::Closed => "closed",
        })
    }
}

/// Labels containing "screen" (any case) mark presentation content.
pub fn is_presentation_label(label: &str) -> bool {
    label.to_lowercase().contains("screen")
}

/// Media currently arriving from a remote participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteStream {
    pub kind: TrackKind,
    pub stream_id: String,
    pub label: String,
    /// Screen content rather than a camera.
    pub presentation: bool,
}

impl RemoteStream {
    pub fn new(kind: TrackKind, stream_id: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            kind,
            stream_id: stream_id.into(),
            presentation: kind == TrackKind::Video && is_presentation_label(&label),
            label,
        }
    }
}

/// Point-in-time view of a link, for callers outside the session lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkSnapshot {
    pub remote_id: ParticipantId,
    pub state: LinkState,
    pub initiator: bool,
    pub connected: bool,
    pub outgoing_audio: Option<String>,
    pub outgoing_video: Option<String>,
    pub remote_streams: Vec<RemoteStream>,
    pub pending_candidates: usize,
}
