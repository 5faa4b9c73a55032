use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{LocalTrack, MediaError, MediaKind};

/// Which devices to open when entering a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaRequest {
    pub audio: bool,
    pub video: bool,
}

/// Capture seam: opens devices and reports tracks the platform ends
/// (a device unplugged, the "stop sharing" button of a screen picker).
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, kind: MediaKind) -> Result<LocalTrack, MediaError>;

    /// Release the device behind `track`. Must be idempotent.
    fn stop_track(&self, track: &LocalTrack);

    /// Register where ended-track ids are reported. Sources that never end
    /// tracks on their own can ignore this.
    fn watch_ended(&self, _listener: mpsc::UnboundedSender<String>) {}

    /// Open every device in `request`. Devices that fail are reported
    /// alongside whatever did open.
    async fn acquire_request(&self, request: MediaRequest) -> (Vec<LocalTrack>, Vec<MediaError>) {
        let mut tracks = Vec::new();
        let mut failures = Vec::new();
        let wanted = [
            (request.audio, MediaKind::Microphone),
            (request.video, MediaKind::Camera),
        ];
        for (want, kind) in wanted {
            if !want {
                continue;
            }
            match self.acquire(kind).await {
                Ok(track) => tracks.push(track),
                Err(e) => failures.push(e),
            }
        }
        (tracks, failures)
    }
}
