use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use meetify_common::new_id;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Kind of media a sender carries on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "audio" => Some(TrackKind::Audio),
            "video" => Some(TrackKind::Video),
            _ => None,
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capture device a local track comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Microphone,
    Camera,
    Screen,
}

impl MediaKind {
    pub fn track_kind(self) -> TrackKind {
        match self {
            MediaKind::Microphone => TrackKind::Audio,
            MediaKind::Camera | MediaKind::Screen => TrackKind::Video,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MediaKind::Microphone => "microphone",
            MediaKind::Camera => "camera",
            MediaKind::Screen => "screen capture",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("permission denied for {0}")]
    PermissionDenied(MediaKind),

    #[error("no {0} device available")]
    DeviceUnavailable(MediaKind),
}

impl MediaError {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaError::PermissionDenied(kind) | MediaError::DeviceUnavailable(kind) => *kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Local track
// ---------------------------------------------------------------------------

/// A captured track. Clones share the enabled and live flags, so a track
/// muted through one handle is muted on every sender carrying it.
#[derive(Debug, Clone)]
pub struct LocalTrack {
    id: String,
    kind: MediaKind,
    label: String,
    enabled: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
}

impl LocalTrack {
    pub fn new(kind: MediaKind, label: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            kind,
            label: label.into(),
            enabled: Arc::new(AtomicBool::new(true)),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn track_kind(&self) -> TrackKind {
        self.kind.track_kind()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Disabled tracks stay attached but send silence or black frames.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// False once the track was stopped or ended by the platform.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Mark the track as ended. Irreversible.
    pub fn end(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

impl PartialEq for LocalTrack {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LocalTrack {}
