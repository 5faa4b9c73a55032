use meetify_common::{MeetifyError, ParticipantId};

use crate::media::{MediaError, MediaKind};

/// Failures surfaced by call orchestration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("signaling channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("permission denied for {0}")]
    PermissionDenied(MediaKind),

    #[error("no {0} device available")]
    DeviceUnavailable(MediaKind),

    #[error("participant {0} is unreachable")]
    PeerUnreachable(ParticipantId),

    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    #[error("negotiation conflict with {0}")]
    NegotiationConflict(ParticipantId),

    #[error("cannot {op} while {state}")]
    InvalidState { op: &'static str, state: String },

    #[error("not joined to a call")]
    NotJoined,

    #[error("peer connection error: {0}")]
    Rtc(String),
}

impl From<MediaError> for CallError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::PermissionDenied(kind) => CallError::PermissionDenied(kind),
            MediaError::DeviceUnavailable(kind) => CallError::DeviceUnavailable(kind),
        }
    }
}

impl From<CallError> for MeetifyError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::ChannelUnavailable(msg) => MeetifyError::Signaling(msg),
            other => MeetifyError::Call(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_errors_map_to_call_errors() {
        let err: CallError = MediaError::PermissionDenied(MediaKind::Camera).into();
        assert_eq!(err, CallError::PermissionDenied(MediaKind::Camera));
        assert_eq!(err.to_string(), "permission denied for camera");

        let err: CallError = MediaError::DeviceUnavailable(MediaKind::Microphone).into();
        assert_eq!(err.to_string(), "no microphone device available");
    }

    #[test]
    fn invalid_state_names_operation() {
        let err = CallError::InvalidState {
            op: "create offer",
            state: "stable".into(),
        };
        assert_eq!(err.to_string(), "cannot create offer while stable");
    }

    #[test]
    fn channel_errors_become_signaling_errors() {
        let err: MeetifyError = CallError::ChannelUnavailable("refused".into()).into();
        assert!(matches!(err, MeetifyError::Signaling(_)));

        let err: MeetifyError = CallError::NotJoined.into();
        assert_eq!(err.to_string(), "call error: not joined to a call");
    }
}
