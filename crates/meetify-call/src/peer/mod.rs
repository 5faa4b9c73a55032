//! One negotiated connection per remote participant.

mod link;
mod registry;
mod types;

pub use link::PeerLink;
pub use registry::PeerRegistry;
pub use types::{is_presentation_label, LinkSnapshot, LinkState, RemoteStream};

#[cfg(test)]
mod tests;
