use serde::{Deserialize, Serialize};

/// Where the signaling relay lives and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// WebSocket URL of the relay (`ws://` or `wss://`).
    pub url: String,
    /// Seconds to wait for the socket and the relay's id assignment (1-120).
    pub connect_timeout_secs: u32,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws".into(),
            connect_timeout_secs: 10,
        }
    }
}
