//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Meetify Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[signaling]
# url = "ws://localhost:8000/ws"   # ws:// or wss://
# connect_timeout_secs = 10        # 1-120

[ice]
# servers = ["stun:stun.l.google.com:19302"]   # stun:, turn: or turns: URLs
# connectivity_timeout_secs = 20               # 1-300

[media]
# start_with_audio = true
# start_with_video = true

[chat]
# max_messages = 500     # 10-10000

[session]
# event_buffer = 256     # 16-4096

[logging]
# level = "INFO"         # DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
