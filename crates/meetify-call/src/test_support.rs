//! Shared fixtures for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use meetify_common::ParticipantId;

use crate::error::CallError;
use crate::protocol::{OutboundMessage, SessionDescription, SignalPayload};
use crate::signaling::SignalingChannel;

/// Signaling channel that records what it is asked to send.
pub(crate) struct RecordingChannel {
    id: ParticipantId,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingChannel {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.into(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub(crate) fn take_descriptions(&self) -> Vec<SessionDescription> {
        self.take()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::Signal {
                    payload: SignalPayload::Sdp(desc),
                    ..
                } => Some(desc),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SignalingChannel for RecordingChannel {
    fn local_id(&self) -> &ParticipantId {
        &self.id
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), CallError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn close(&self) {}
}
