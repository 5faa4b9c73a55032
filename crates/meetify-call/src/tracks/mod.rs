//! Local media intent (mute, camera, screen share) and its replication onto
//! every peer link.

mod controller;
mod types;

pub use controller::TrackController;
pub use types::{LocalMediaSnapshot, LocalMediaState, PreviewSource};
