//! Capture source that fabricates tracks. Used by the headless client and
//! by tests, which can deny devices and end tracks on demand.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::source::MediaSource;
use super::types::{LocalTrack, MediaError, MediaKind};

#[derive(Default)]
struct SyntheticState {
    denied: HashSet<MediaKind>,
    unavailable: HashSet<MediaKind>,
    /// Tracks handed out and not yet stopped. Stopped tracks are pruned.
    live: Vec<LocalTrack>,
    acquisitions: HashMap<MediaKind, usize>,
    listener: Option<mpsc::UnboundedSender<String>>,
}

#[derive(Default)]
pub struct SyntheticMediaSource {
    state: Mutex<SyntheticState>,
}

impl SyntheticMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SyntheticState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuse future requests for `kind` as if the user denied permission.
    pub fn deny(&self, kind: MediaKind) {
        self.lock().denied.insert(kind);
    }

    /// Behave as if no device of `kind` is present.
    pub fn remove_device(&self, kind: MediaKind) {
        self.lock().unavailable.insert(kind);
    }

    /// Clear any denial or missing device for `kind`.
    pub fn allow(&self, kind: MediaKind) {
        let mut state = self.lock();
        state.denied.remove(&kind);
        state.unavailable.remove(&kind);
    }

    /// End a track from the platform side and notify the watcher.
    pub fn end_track(&self, track_id: &str) -> bool {
        let mut state = self.lock();
        let Some(index) = state
            .live
            .iter()
            .position(|t| t.id() == track_id && t.is_live())
        else {
            return false;
        };
        let track = state.live.swap_remove(index);
        track.end();
        if let Some(listener) = &state.listener {
            let _ = listener.send(track_id.to_string());
        }
        true
    }

    /// Tracks handed out and not yet stopped.
    pub fn live_tracks(&self) -> Vec<LocalTrack> {
        let mut state = self.lock();
        state.live.retain(LocalTrack::is_live);
        state.live.clone()
    }

    /// Number of successful acquisitions of `kind` so far.
    pub fn acquired(&self, kind: MediaKind) -> usize {
        self.lock().acquisitions.get(&kind).copied().unwrap_or(0)
    }
}

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn acquire(&self, kind: MediaKind) -> Result<LocalTrack, MediaError> {
        let mut state = self.lock();
        if state.denied.contains(&kind) {
            return Err(MediaError::PermissionDenied(kind));
        }
        if state.unavailable.contains(&kind) {
            return Err(MediaError::DeviceUnavailable(kind));
        }
        let count = state.acquisitions.get(&kind).copied().unwrap_or(0);
        let label = match kind {
            MediaKind::Microphone => "Synthetic Microphone".to_string(),
            MediaKind::Camera => "Synthetic Camera".to_string(),
            MediaKind::Screen => format!("screen:{count}"),
        };
        let track = LocalTrack::new(kind, label);
        debug!(kind = %kind, track_id = track.id(), "Synthetic track acquired");
        state.live.retain(LocalTrack::is_live);
        state.live.push(track.clone());
        state.acquisitions.insert(kind, count + 1);
        Ok(track)
    }

    fn stop_track(&self, track: &LocalTrack) {
        track.end();
        self.lock().live.retain(|t| t != track);
    }

    fn watch_ended(&self, listener: mpsc::UnboundedSender<String>) {
        self.lock().listener = Some(listener);
    }
}
