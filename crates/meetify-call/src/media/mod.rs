//! Local capture: tracks, the capture seam, and a synthetic source.

mod source;
mod synthetic;
mod types;

pub use source::{MediaRequest, MediaSource};
pub use synthetic::SyntheticMediaSource;
pub use types::{LocalTrack, MediaError, MediaKind, TrackKind};
