//! Full configuration validation.
//!
//! Validates numeric ranges and URL formats. Each domain has its own
//! submodule; this orchestrator calls them all and collects errors into a
//! single `ConfigError`.

mod helpers;
mod misc;
mod network;


use crate::schema::MeetifyConfig;
use meetify_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &MeetifyConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    network::validate_signaling(&mut errors, config);
    network::validate_ice(&mut errors, config);
    misc::validate_chat(&mut errors, config);
    misc::validate_session(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
