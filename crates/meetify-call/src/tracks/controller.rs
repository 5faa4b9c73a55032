use std::sync::Arc;

use tracing::{debug, info, warn};

use super::types::{LocalMediaSnapshot, LocalMediaState};
use crate::error::CallError;
use crate::media::{LocalTrack, MediaError, MediaKind, MediaRequest, MediaSource, TrackKind};
use crate::peer::{PeerLink, PeerRegistry};
use crate::signaling::SignalingChannel;

/// Owns the local tracks and keeps every link's senders matching them.
///
/// Every toggle either completes on all links or, when a device cannot be
/// opened, leaves the state untouched and returns the error.
pub struct TrackController {
    state: LocalMediaState,
    media: Arc<dyn MediaSource>,
}

impl TrackController {
    pub fn new(media: Arc<dyn MediaSource>) -> Self {
        Self {
            state: LocalMediaState::default(),
            media,
        }
    }

    pub fn state(&self) -> &LocalMediaState {
        &self.state
    }

    pub fn snapshot(&self) -> LocalMediaSnapshot {
        self.state.snapshot()
    }

    /// Open the devices a call starts with. A device that fails is reported
    /// and the call proceeds without it.
    pub async fn start(&mut self, request: MediaRequest) -> Vec<MediaError> {
        let (tracks, failures) = self.media.acquire_request(request).await;
        for track in tracks {
            match track.kind() {
                MediaKind::Microphone => {
                    self.state.mic_enabled = true;
                    self.state.audio = Some(track);
                }
                MediaKind::Camera => {
                    self.state.camera_enabled = true;
                    self.state.video = Some(track);
                }
                MediaKind::Screen => self.media.stop_track(&track),
            }
        }
        for failure in &failures {
            warn!(kind = %failure.kind(), error = %failure, "Starting without device");
        }
        failures
    }

    /// Give a freshly created link the current local tracks.
    pub async fn attach_all(&self, link: &mut PeerLink) -> Result<(), CallError> {
        if let Some(audio) = self.state.audio.as_ref().filter(|t| t.is_live()) {
            link.attach_track(TrackKind::Audio, Some(audio)).await?;
        }
        if let Some(video) = self.state.video.as_ref().filter(|t| t.is_live()) {
            link.attach_track(TrackKind::Video, Some(video)).await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Toggles
    // -----------------------------------------------------------------------

    /// Mute or unmute. Reacquires the microphone if it was stopped.
    pub async fn toggle_mic(
        &mut self,
        registry: &mut PeerRegistry,
        channel: &dyn SignalingChannel,
    ) -> Result<LocalMediaSnapshot, CallError> {
        if let Some(track) = self.state.audio.as_ref().filter(|t| t.is_live()) {
            let enabled = !track.is_enabled();
            track.set_enabled(enabled);
            self.state.mic_enabled = enabled;
            info!(enabled, "Microphone toggled");
            return Ok(self.snapshot());
        }

        let track = self.media.acquire(MediaKind::Microphone).await?;
        publish(TrackKind::Audio, Some(&track), registry, channel).await;
        self.state.audio = Some(track);
        self.state.mic_enabled = true;
        info!("Microphone reacquired");
        Ok(self.snapshot())
    }

    /// Turn the camera on or off. Turning it on while sharing ends the share.
    pub async fn toggle_camera(
        &mut self,
        registry: &mut PeerRegistry,
        channel: &dyn SignalingChannel,
    ) -> Result<LocalMediaSnapshot, CallError> {
        if self.state.screen_sharing {
            let camera = self.restore_camera(true).await?;
            if let Some(camera) = &camera {
                camera.set_enabled(true);
            }
            self.finish_share(camera, registry, channel).await;
            info!("Camera enabled, screen share ended");
            return Ok(self.snapshot());
        }

        if let Some(track) = self.state.video.as_ref().filter(|t| t.is_live()) {
            let enabled = !track.is_enabled();
            track.set_enabled(enabled);
            self.state.camera_enabled = enabled;
            info!(enabled, "Camera toggled");
            return Ok(self.snapshot());
        }

        let track = self.media.acquire(MediaKind::Camera).await?;
        publish(TrackKind::Video, Some(&track), registry, channel).await;
        self.state.video = Some(track);
        self.state.camera_enabled = true;
        info!("Camera reacquired");
        Ok(self.snapshot())
    }

    /// Start or stop presenting. The screen capture takes the camera's
    /// sender on every link; stopping puts the camera back.
    pub async fn toggle_screen_share(
        &mut self,
        registry: &mut PeerRegistry,
        channel: &dyn SignalingChannel,
    ) -> Result<LocalMediaSnapshot, CallError> {
        if self.state.screen_sharing {
            let camera = self.restore_camera(self.state.camera_enabled).await?;
            self.finish_share(camera, registry, channel).await;
            info!("Screen share stopped");
            return Ok(self.snapshot());
        }

        let screen = self.media.acquire(MediaKind::Screen).await?;
        publish(TrackKind::Video, Some(&screen), registry, channel).await;
        if let Some(camera) = self.state.video.take() {
            self.state.parked_camera = Some(camera);
        }
        self.state.video = Some(screen);
        self.state.screen_sharing = true;
        info!(links = registry.len(), "Screen share started");
        Ok(self.snapshot())
    }

    /// React to a track the platform ended. Returns the new state when the
    /// track was one of ours.
    pub async fn handle_track_ended(
        &mut self,
        track_id: &str,
        registry: &mut PeerRegistry,
        channel: &dyn SignalingChannel,
    ) -> Option<LocalMediaSnapshot> {
        let is = |slot: &Option<LocalTrack>| slot.as_ref().is_some_and(|t| t.id() == track_id);

        if is(&self.state.video) && self.state.screen_sharing {
            info!("Screen capture ended externally");
            let camera = match self.restore_camera(self.state.camera_enabled).await {
                Ok(camera) => camera,
                Err(e) => {
                    warn!(error = %e, "Camera unavailable after screen share");
                    self.state.camera_enabled = false;
                    None
                }
            };
            self.finish_share(camera, registry, channel).await;
        } else if is(&self.state.video) {
            info!("Camera ended externally");
            publish(TrackKind::Video, None, registry, channel).await;
            self.state.video = None;
            self.state.camera_enabled = false;
        } else if is(&self.state.audio) {
            info!("Microphone ended externally");
            publish(TrackKind::Audio, None, registry, channel).await;
            self.state.audio = None;
            self.state.mic_enabled = false;
        } else if is(&self.state.parked_camera) {
            debug!("Parked camera ended");
            self.state.parked_camera = None;
        } else {
            return None;
        }
        Some(self.snapshot())
    }

    /// Stop every device and forget all tracks.
    pub fn release_all(&mut self) {
        let state = std::mem::take(&mut self.state);
        for track in [state.audio, state.video, state.parked_camera]
            .into_iter()
            .flatten()
        {
            self.media.stop_track(&track);
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// The parked camera if it is still live, otherwise a new one when
    /// `required`. Leaves the parked slot untouched on failure.
    async fn restore_camera(&mut self, required: bool) -> Result<Option<LocalTrack>, CallError> {
        if self.state.parked_camera.as_ref().is_some_and(|t| t.is_live()) {
            return Ok(self.state.parked_camera.take());
        }
        if !required {
            return Ok(None);
        }
        Ok(Some(self.media.acquire(MediaKind::Camera).await?))
    }

    /// Swap the screen capture out for `camera` on every link and stop it.
    async fn finish_share(
        &mut self,
        camera: Option<LocalTrack>,
        registry: &mut PeerRegistry,
        channel: &dyn SignalingChannel,
    ) {
        publish(TrackKind::Video, camera.as_ref(), registry, channel).await;
        if let Some(screen) = self.state.video.take() {
            self.media.stop_track(&screen);
        }
        if let Some(parked) = self.state.parked_camera.take() {
            self.media.stop_track(&parked);
        }
        self.state.camera_enabled = camera.as_ref().is_some_and(|t| t.is_enabled());
        self.state.video = camera;
        self.state.screen_sharing = false;
    }
}

/// Put `track` on the `kind` sender of every link, renegotiating the links
/// that had to grow a new sender. A link that fails is logged and skipped.
async fn publish(
    kind: TrackKind,
    track: Option<&LocalTrack>,
    registry: &mut PeerRegistry,
    channel: &dyn SignalingChannel,
) {
    for link in registry.iter_mut() {
        match link.attach_track(kind, track).await {
            Ok(true) => {
                if let Err(e) = link.request_renegotiation(channel).await {
                    warn!(remote_id = %link.remote_id(), error = %e, "Renegotiation failed");
                }
            }
            Ok(false) => {}
            Err(e) => {
                warn!(remote_id = %link.remote_id(), kind = %kind, error = %e, "Failed to update sender");
            }
        }
    }
}
