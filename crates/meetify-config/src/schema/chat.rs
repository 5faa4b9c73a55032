use serde::{Deserialize, Serialize};

/// In-call chat settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Messages kept in the call's chat history (valid range: 10-10000).
    pub max_messages: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { max_messages: 500 }
    }
}
