//! Validation for the signaling relay and ICE sections.

use crate::schema::MeetifyConfig;

use super::helpers::{validate_range, validate_scheme};

/// Validate signaling constraints.
pub(crate) fn validate_signaling(errors: &mut Vec<String>, config: &MeetifyConfig) {
    validate_scheme(
        errors,
        "signaling.url",
        &config.signaling.url,
        &["ws://", "wss://"],
    );
    validate_range(
        errors,
        "signaling.connect_timeout_secs",
        config.signaling.connect_timeout_secs,
        1,
        120,
    );
}

/// Validate ICE constraints.
pub(crate) fn validate_ice(errors: &mut Vec<String>, config: &MeetifyConfig) {
    for (i, server) in config.ice.servers.iter().enumerate() {
        validate_scheme(
            errors,
            &format!("ice.servers[{i}]"),
            server,
            &["stun:", "turn:", "turns:"],
        );
    }
    validate_range(
        errors,
        "ice.connectivity_timeout_secs",
        config.ice.connectivity_timeout_secs,
        1,
        300,
    );
}
