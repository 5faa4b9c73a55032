//! Peer-connection seam. The session drives negotiation through
//! [`PeerConnection`]; engines report asynchronous happenings (gathered
//! candidates, remote tracks, connectivity) through a [`PeerEventSink`].

mod engine;
mod simulated;
mod types;

pub use engine::{PeerConnection, RtcEngine};
pub use simulated::{SimulatedConnection, SimulatedEngine, SimulatedNetwork};
pub use types::{
    ConnectionEvent, IceConnectivity, PeerEvent, PeerEventSink, RtcConfig, SenderId,
    DEFAULT_STUN_SERVER,
};
