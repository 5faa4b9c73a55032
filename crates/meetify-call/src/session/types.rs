use std::fmt;
use std::time::Duration;

use meetify_common::ParticipantId;

use crate::chat::ChatMessage;
use crate::error::CallError;
use crate::media::MediaKind;
use crate::peer::RemoteStream;
use crate::rtc::DEFAULT_STUN_SERVER;
use crate::tracks::LocalMediaSnapshot;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SessionConfig {
    /// STUN/TURN URLs handed to every new connection.
    pub ice_servers: Vec<String>,
    /// A link with no connectivity after this long is dropped.
    pub ice_timeout: Duration,
    pub start_with_audio: bool,
    pub start_with_video: bool,
    /// Chat messages retained per call.
    pub chat_history: usize,
    /// Capacity of the event channel returned by [`CallSession::new`](super::CallSession::new).
    /// Events that find it full are dropped with a warning.
    pub event_buffer: usize,
    /// Opaque token passed to the relay on connect.
    pub access_token: Option<String>,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("ice_servers", &self.ice_servers)
            .field("ice_timeout", &self.ice_timeout)
            .field("start_with_audio", &self.start_with_audio)
            .field("start_with_video", &self.start_with_video)
            .field("chat_history", &self.chat_history)
            .field("event_buffer", &self.event_buffer)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![DEFAULT_STUN_SERVER.to_string()],
            ice_timeout: Duration::from_secs(20),
            start_with_audio: true,
            start_with_video: true,
            chat_history: 500,
            event_buffer: 256,
            access_token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Joining,
    Joined,
    Leaving,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Joining => "joining",
            SessionPhase::Joined => "joined",
            SessionPhase::Leaving => "leaving",
        })
    }
}

/// Who we are in the current call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub local_id: ParticipantId,
    pub room_id: String,
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events emitted to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    Joined(SessionHandle),
    /// A device could not be opened; the call continues without it.
    MediaUnavailable {
        kind: MediaKind,
        reason: String,
    },
    PeerJoined {
        remote_id: ParticipantId,
    },
    PeerConnected {
        remote_id: ParticipantId,
    },
    PeerLeft {
        remote_id: ParticipantId,
    },
    /// Connectivity failed or timed out; the link was dropped.
    PeerUnreachable {
        remote_id: ParticipantId,
    },
    /// New or replaced media from a participant.
    RemoteStream {
        remote_id: ParticipantId,
        stream: RemoteStream,
    },
    LocalMedia(LocalMediaSnapshot),
    ChatMessage(ChatMessage),
    UnreadChanged(usize),
    /// A non-fatal problem with one participant or one signal.
    Error(CallError),
    /// The relay connection dropped and the session ended.
    Disconnected,
    Left,
}
