use serde::{Deserialize, Serialize};

/// Which local media to acquire when joining a call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub start_with_audio: bool,
    pub start_with_video: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            start_with_audio: true,
            start_with_video: true,
        }
    }
}
