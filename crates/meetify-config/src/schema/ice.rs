use serde::{Deserialize, Serialize};

/// ICE configuration handed to every peer connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IceConfig {
    /// STUN/TURN server URLs.
    pub servers: Vec<String>,
    /// Seconds a peer link may stay without connectivity before it is
    /// dropped as unreachable (valid range: 1-300).
    pub connectivity_timeout_secs: u32,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            servers: vec!["stun:stun.l.google.com:19302".into()],
            connectivity_timeout_secs: 20,
        }
    }
}
