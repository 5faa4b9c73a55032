use serde::{Deserialize, Serialize};
use std::fmt;

/// Fresh v4 uuid string, used for local track ids.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Identifier the signaling relay assigns to a connected participant.
///
/// Opaque to the client: it is never parsed, only compared and echoed back
/// as a signal target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_valid_uuid() {
        let id = new_id();
        let parsed = uuid::Uuid::parse_str(&id);
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap().get_version_num(), 4);
    }

    #[test]
    fn new_id_is_unique() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn participant_id_display() {
        let pid = ParticipantId::new("socket-42");
        assert_eq!(pid.to_string(), "socket-42");
        assert_eq!(pid.as_str(), "socket-42");
    }

    #[test]
    fn participant_id_serializes_as_plain_string() {
        let pid = ParticipantId::from("abc");
        let json = serde_json::to_string(&pid).unwrap();
        assert_eq!(json, "\"abc\"");
        let back: ParticipantId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pid);
    }

    #[test]
    fn participant_id_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ParticipantId::from("a"));
        set.insert(ParticipantId::from(String::from("a")));
        assert_eq!(set.len(), 1);
    }
}
