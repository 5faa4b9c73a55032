//! Configuration schema types for Meetify.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with defaults that work against a relay on
//! localhost.

mod chat;
mod ice;
mod media;
mod signaling;
mod system;

pub use chat::*;
pub use ice::*;
pub use media::*;
pub use signaling::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Meetify.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct MeetifyConfig {
    pub signaling: SignalingConfig,
    pub ice: IceConfig,
    pub media: MediaConfig,
    pub chat: ChatConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_correct_signaling() {
        let config = MeetifyConfig::default();
        assert_eq!(config.signaling.url, "ws://localhost:8000/ws");
        assert_eq!(config.signaling.connect_timeout_secs, 10);
    }

    #[test]
    fn default_config_has_google_stun() {
        let config = MeetifyConfig::default();
        assert_eq!(config.ice.servers.len(), 1);
        assert!(config.ice.servers[0].starts_with("stun:"));
        assert_eq!(config.ice.connectivity_timeout_secs, 20);
    }

    #[test]
    fn default_config_starts_with_audio_and_video() {
        let config = MeetifyConfig::default();
        assert!(config.media.start_with_audio);
        assert!(config.media.start_with_video);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: MeetifyConfig = toml::from_str(
            r#"
[media]
start_with_video = false
"#,
        )
        .unwrap();
        assert!(!config.media.start_with_video);
        assert!(config.media.start_with_audio);
        assert_eq!(config.chat.max_messages, 500);
    }

    #[test]
    fn log_level_parses_uppercase() {
        let config: MeetifyConfig = toml::from_str(
            r#"
[logging]
level = "WARNING"
"#,
        )
        .unwrap();
        assert_eq!(config.logging.level, LogLevel::Warning);
        assert_eq!(config.logging.level.as_directive(), "warn");
    }

    #[test]
    fn empty_toml_is_default() {
        let config: MeetifyConfig = toml::from_str("").unwrap();
        assert_eq!(config.session.event_buffer, 256);
        assert_eq!(config.logging.level, LogLevel::Info);
    }
}
