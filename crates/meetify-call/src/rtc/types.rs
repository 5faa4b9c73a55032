use meetify_common::ParticipantId;
use tokio::sync::mpsc;

use crate::media::TrackKind;
use crate::protocol::IceCandidate;

pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Settings handed to the engine for every new connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcConfig {
    pub ice_servers: Vec<String>,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![DEFAULT_STUN_SERVER.to_string()],
        }
    }
}

/// Handle to an outgoing sender slot on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectivity {
    Checking,
    Connected,
    Disconnected,
    Failed,
}

/// Something a connection reports on its own schedule.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    LocalCandidate(IceCandidate),
    RemoteTrack {
        kind: TrackKind,
        stream_id: String,
        label: String,
    },
    Connectivity(IceConnectivity),
    /// No connectivity within the configured window.
    ConnectivityTimeout,
}

/// A [`ConnectionEvent`] tagged with the link it belongs to. `generation`
/// distinguishes a link from an earlier one to the same participant.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerEvent {
    pub remote_id: ParticipantId,
    pub generation: u64,
    pub event: ConnectionEvent,
}

/// Where one connection posts its events.
#[derive(Debug, Clone)]
pub struct PeerEventSink {
    remote_id: ParticipantId,
    generation: u64,
    tx: mpsc::UnboundedSender<PeerEvent>,
}

impl PeerEventSink {
    pub fn new(
        remote_id: ParticipantId,
        generation: u64,
        tx: mpsc::UnboundedSender<PeerEvent>,
    ) -> Self {
        Self {
            remote_id,
            generation,
            tx,
        }
    }

    pub fn remote_id(&self) -> &ParticipantId {
        &self.remote_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the session stopped listening.
    pub fn emit(&self, event: ConnectionEvent) -> bool {
        self.tx
            .send(PeerEvent {
                remote_id: self.remote_id.clone(),
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}
