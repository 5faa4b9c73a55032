//! Wire types for the signaling relay.
//!
//! Every WebSocket text frame is a JSON object `{"event": <name>, "args": [...]}`
//! with positional arguments. Session descriptions and ICE candidates travel
//! inside `signal` frames as a JSON *string* so the relay can forward them
//! without understanding them.

use meetify_common::ParticipantId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CallError;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names used on the relay connection.
pub mod events {
    /// First frame from the relay; carries the id it assigned to us.
    pub const CONNECTED: &str = "connected";
    pub const JOIN_CALL: &str = "join-call";
    pub const USER_JOINED: &str = "user-joined";
    pub const USER_LEFT: &str = "user-left";
    pub const SIGNAL: &str = "signal";
    pub const CHAT_MESSAGE: &str = "chat-message";
}

// ---------------------------------------------------------------------------
// Signal payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// A session description as exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A trickled ICE candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }
}

/// Body of a `signal` frame: `{"sdp": {...}}` or `{"ice": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalPayload {
    Sdp(SessionDescription),
    Ice(IceCandidate),
}

impl SignalPayload {
    pub fn to_json(&self) -> String {
        // Serializing plain strings and integers cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(text: &str) -> Result<Self, CallError> {
        serde_json::from_str(text)
            .map_err(|e| CallError::InvalidSignal(format!("malformed signal payload: {e}")))
    }

    /// Short label for logs.
    pub fn describe(&self) -> &'static str {
        match self {
            SignalPayload::Sdp(desc) if desc.kind == SdpKind::Offer => "offer",
            SignalPayload::Sdp(_) => "answer",
            SignalPayload::Ice(_) => "ice",
        }
    }
}

// ---------------------------------------------------------------------------
// Decoded events
// ---------------------------------------------------------------------------

/// Events delivered by the relay to this client.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// `id` entered the room; `members` is everyone now present, `id` included.
    UserJoined {
        id: ParticipantId,
        members: Vec<ParticipantId>,
    },
    UserLeft {
        id: ParticipantId,
    },
    Signal {
        from: ParticipantId,
        payload: SignalPayload,
    },
    Chat {
        body: String,
        sender_name: String,
        sender_id: ParticipantId,
    },
    /// The relay connection dropped.
    Disconnected,
}

/// Messages this client asks the relay to route.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    JoinCall {
        room: String,
    },
    Signal {
        to: ParticipantId,
        payload: SignalPayload,
    },
    Chat {
        body: String,
        sender_name: String,
    },
}

// ---------------------------------------------------------------------------
// Wire frame
// ---------------------------------------------------------------------------

/// One JSON text frame on the relay connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    pub event: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl WireFrame {
    pub fn new(event: &str, args: Vec<Value>) -> Self {
        Self {
            event: event.to_string(),
            args,
        }
    }

    /// The id carried by a `connected` frame, if this is one.
    pub fn assigned_id(&self) -> Option<ParticipantId> {
        if self.event != events::CONNECTED {
            return None;
        }
        self.args
            .first()
            .and_then(Value::as_str)
            .map(ParticipantId::from)
    }

    /// Decode into an [`InboundEvent`]. Unknown event names yield `Ok(None)`.
    pub fn into_inbound(self) -> Result<Option<InboundEvent>, CallError> {
        let event = match self.event.as_str() {
            events::USER_JOINED => {
                let id = self.id_arg(0)?;
                let members = match self.args.get(1) {
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|v| {
                            v.as_str().map(ParticipantId::from).ok_or_else(|| {
                                CallError::InvalidSignal("non-string member id".into())
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                    Some(Value::Null) | None => vec![id.clone()],
                    Some(other) => {
                        return Err(CallError::InvalidSignal(format!(
                            "user-joined members must be an array, got {other}"
                        )))
                    }
                };
                InboundEvent::UserJoined { id, members }
            }
            events::USER_LEFT => InboundEvent::UserLeft { id: self.id_arg(0)? },
            events::SIGNAL => {
                let from = self.id_arg(0)?;
                let payload = match self.args.get(1) {
                    Some(Value::String(text)) => SignalPayload::from_json(text)?,
                    // Some relays forward the payload already parsed.
                    Some(value @ Value::Object(_)) => {
                        serde_json::from_value(value.clone()).map_err(|e| {
                            CallError::InvalidSignal(format!("malformed signal payload: {e}"))
                        })?
                    }
                    _ => return Err(CallError::InvalidSignal("signal without payload".into())),
                };
                InboundEvent::Signal { from, payload }
            }
            events::CHAT_MESSAGE => InboundEvent::Chat {
                body: self.str_arg(0)?.to_string(),
                sender_name: self.str_arg(1)?.to_string(),
                sender_id: self.id_arg(2)?,
            },
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    fn str_arg(&self, index: usize) -> Result<&str, CallError> {
        self.args.get(index).and_then(Value::as_str).ok_or_else(|| {
            CallError::InvalidSignal(format!("{}: missing string argument {index}", self.event))
        })
    }

    fn id_arg(&self, index: usize) -> Result<ParticipantId, CallError> {
        self.str_arg(index).map(ParticipantId::from)
    }
}

impl From<&OutboundMessage> for WireFrame {
    fn from(msg: &OutboundMessage) -> Self {
        match msg {
            OutboundMessage::JoinCall { room } => {
                WireFrame::new(events::JOIN_CALL, vec![Value::from(room.as_str())])
            }
            OutboundMessage::Signal { to, payload } => WireFrame::new(
                events::SIGNAL,
                vec![Value::from(to.as_str()), Value::from(payload.to_json())],
            ),
            OutboundMessage::Chat { body, sender_name } => WireFrame::new(
                events::CHAT_MESSAGE,
                vec![Value::from(body.as_str()), Value::from(sender_name.as_str())],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sdp_payload_wire_format() {
        let payload = SignalPayload::Sdp(SessionDescription::offer("v=0"));
        let value: Value = serde_json::from_str(&payload.to_json()).unwrap();
        assert_eq!(value, json!({"sdp": {"type": "offer", "sdp": "v=0"}}));
    }

    #[test]
    fn ice_payload_wire_format() {
        let payload = SignalPayload::Ice(IceCandidate {
            candidate: "candidate:1 1 udp 1 10.0.0.1 5000 typ host".into(),
            sdp_mid: Some("0".into()),
            sdp_m_line_index: Some(0),
        });
        let value: Value = serde_json::from_str(&payload.to_json()).unwrap();
        assert_eq!(
            value,
            json!({"ice": {
                "candidate": "candidate:1 1 udp 1 10.0.0.1 5000 typ host",
                "sdpMid": "0",
                "sdpMLineIndex": 0
            }})
        );
    }

    #[test]
    fn browser_candidate_with_extra_fields_parses() {
        let text = r#"{"ice":{"candidate":"c","sdpMid":"1","sdpMLineIndex":1,"usernameFragment":"ab"}}"#;
        let payload = SignalPayload::from_json(text).unwrap();
        assert_eq!(payload.describe(), "ice");
    }

    #[test]
    fn malformed_payload_is_invalid_signal() {
        let err = SignalPayload::from_json(r#"{"bogus": 1}"#).unwrap_err();
        assert!(matches!(err, CallError::InvalidSignal(_)));
    }

    #[test]
    fn connected_frame_carries_assigned_id() {
        let frame: WireFrame =
            serde_json::from_value(json!({"event": "connected", "args": ["abc"]})).unwrap();
        assert_eq!(frame.assigned_id(), Some(ParticipantId::from("abc")));

        let frame = WireFrame::new(events::USER_LEFT, vec![json!("abc")]);
        assert_eq!(frame.assigned_id(), None);
    }

    #[test]
    fn decode_user_joined() {
        let frame = WireFrame::new(events::USER_JOINED, vec![json!("b"), json!(["a", "b"])]);
        let event = frame.into_inbound().unwrap().unwrap();
        assert_eq!(
            event,
            InboundEvent::UserJoined {
                id: "b".into(),
                members: vec!["a".into(), "b".into()],
            }
        );
    }

    #[test]
    fn decode_signal_from_string_and_object() {
        let as_string = WireFrame::new(
            events::SIGNAL,
            vec![json!("a"), json!(r#"{"sdp":{"type":"answer","sdp":"x"}}"#)],
        );
        let as_object = WireFrame::new(
            events::SIGNAL,
            vec![json!("a"), json!({"sdp": {"type": "answer", "sdp": "x"}})],
        );
        let expected = InboundEvent::Signal {
            from: "a".into(),
            payload: SignalPayload::Sdp(SessionDescription::answer("x")),
        };
        assert_eq!(as_string.into_inbound().unwrap(), Some(expected.clone()));
        assert_eq!(as_object.into_inbound().unwrap(), Some(expected));
    }

    #[test]
    fn decode_chat_message() {
        let frame = WireFrame::new(
            events::CHAT_MESSAGE,
            vec![json!("hi all"), json!("Ada"), json!("sock-1")],
        );
        assert_eq!(
            frame.into_inbound().unwrap(),
            Some(InboundEvent::Chat {
                body: "hi all".into(),
                sender_name: "Ada".into(),
                sender_id: "sock-1".into(),
            })
        );
    }

    #[test]
    fn decode_rejects_missing_arguments() {
        let frame = WireFrame::new(events::USER_LEFT, vec![]);
        assert!(matches!(
            frame.into_inbound(),
            Err(CallError::InvalidSignal(_))
        ));
    }

    #[test]
    fn unknown_events_are_skipped() {
        let frame = WireFrame::new("typing", vec![json!("a")]);
        assert_eq!(frame.into_inbound().unwrap(), None);
    }

    #[test]
    fn outbound_signal_carries_payload_as_string() {
        let msg = OutboundMessage::Signal {
            to: "b".into(),
            payload: SignalPayload::Ice(IceCandidate::new("c1")),
        };
        let frame = WireFrame::from(&msg);
        assert_eq!(frame.event, "signal");
        assert_eq!(frame.args[0], json!("b"));
        let text = frame.args[1].as_str().unwrap();
        assert_eq!(
            SignalPayload::from_json(text).unwrap(),
            SignalPayload::Ice(IceCandidate::new("c1"))
        );
    }

    #[test]
    fn outbound_chat_and_join_frames() {
        let frame = WireFrame::from(&OutboundMessage::JoinCall { room: "ABC123".into() });
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"event": "join-call", "args": ["ABC123"]})
        );

        let frame = WireFrame::from(&OutboundMessage::Chat {
            body: "yo".into(),
            sender_name: "Ada".into(),
        });
        assert_eq!(frame.args, vec![json!("yo"), json!("Ada")]);
    }
}
