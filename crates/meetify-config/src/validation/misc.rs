//! Validation for smaller config sections: chat and session.

use crate::schema::MeetifyConfig;

use super::helpers::validate_range;

/// Validate chat constraints.
pub(crate) fn validate_chat(errors: &mut Vec<String>, config: &MeetifyConfig) {
    validate_range(
        errors,
        "chat.max_messages",
        config.chat.max_messages,
        10,
        10_000,
    );
}

/// Validate session constraints.
pub(crate) fn validate_session(errors: &mut Vec<String>, config: &MeetifyConfig) {
    validate_range(
        errors,
        "session.event_buffer",
        config.session.event_buffer,
        16,
        4096,
    );
}
