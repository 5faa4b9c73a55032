//! Session orchestration for mesh audio/video calls.
//!
//! Turns relay presence and signaling events into one peer link per remote
//! participant, keeps every link's outgoing tracks in line with local intent
//! (mute, camera, screen share), and carries in-call chat over the same
//! signaling channel. Media capture and the peer-connection stack are
//! consumed through the [`MediaSource`] and [`RtcEngine`] seams.

pub mod chat;
pub mod error;
pub mod media;
pub mod meeting_code;
pub mod peer;
pub mod protocol;
pub mod rtc;
pub mod session;
pub mod signaling;
pub mod tracks;

#[cfg(test)]
mod test_support;

pub use chat::{ChatChannel, ChatMessage, MessageOrigin};
pub use error::CallError;
pub use media::{LocalTrack, MediaError, MediaKind, MediaSource, SyntheticMediaSource, TrackKind};
pub use meeting_code::generate_meeting_code;
pub use peer::{LinkSnapshot, LinkState, PeerLink, PeerRegistry, RemoteStream};
pub use protocol::{IceCandidate, InboundEvent, OutboundMessage, SdpKind, SessionDescription, SignalPayload};
pub use rtc::{PeerConnection, RtcEngine, SimulatedEngine, SimulatedNetwork};
pub use session::{CallEvent, CallSession, SessionConfig, SessionHandle, SessionPhase};
pub use signaling::{MemoryRelay, SignalingChannel, SignalingConnector, WsConnector, WsSignalingConfig};
pub use tracks::{LocalMediaSnapshot, PreviewSource, TrackController};

pub use meetify_common::ParticipantId;
