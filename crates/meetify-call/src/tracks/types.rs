use serde::Serialize;

use crate::media::LocalTrack;

/// What the local preview tile should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewSource {
    Camera,
    Screen,
    None,
}

/// Tracks and toggles behind the local participant's media.
///
/// The video slot holds either the camera or the screen capture, never both.
/// While sharing, the camera track is parked so it can be restored.
#[derive(Debug, Default)]
pub struct LocalMediaState {
    pub(crate) mic_enabled: bool,
    pub(crate) camera_enabled: bool,
    pub(crate) screen_sharing: bool,
    pub(crate) audio: Option<LocalTrack>,
    pub(crate) video: Option<LocalTrack>,
    pub(crate) parked_camera: Option<LocalTrack>,
}

impl LocalMediaState {
    pub fn mic_enabled(&self) -> bool {
        self.mic_enabled
    }

    pub fn camera_enabled(&self) -> bool {
        self.camera_enabled
    }

    pub fn screen_sharing(&self) -> bool {
        self.screen_sharing
    }

    pub fn audio_track(&self) -> Option<&LocalTrack> {
        self.audio.as_ref()
    }

    pub fn video_track(&self) -> Option<&LocalTrack> {
        self.video.as_ref()
    }

    pub fn preview(&self) -> PreviewSource {
        match &self.video {
            Some(_) if self.screen_sharing => PreviewSource::Screen,
            Some(track) if track.is_live() && track.is_enabled() => PreviewSource::Camera,
            _ => PreviewSource::None,
        }
    }

    pub fn snapshot(&self) -> LocalMediaSnapshot {
        LocalMediaSnapshot {
            mic_enabled: self.mic_enabled,
            camera_enabled: self.camera_enabled,
            screen_sharing: self.screen_sharing,
            audio_track: self.audio.as_ref().map(|t| t.id().to_string()),
            video_track: self.video.as_ref().map(|t| t.id().to_string()),
            preview: self.preview(),
        }
    }
}

/// Cloneable view of [`LocalMediaState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalMediaSnapshot {
    pub mic_enabled: bool,
    pub camera_enabled: bool,
    pub screen_sharing: bool,
    pub audio_track: Option<String>,
    pub video_track: Option<String>,
    pub preview: PreviewSource,
}
