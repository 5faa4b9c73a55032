//! In-call chat.
//!
//! Messages ride the signaling relay, which echoes them to the whole room.
//! Our own message is shown immediately when sent and its echo is dropped.
//! History is a bounded ring buffer so memory usage stays predictable.

use std::collections::VecDeque;

use meetify_common::ParticipantId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CallError;
use crate::protocol::OutboundMessage;
use crate::signaling::SignalingChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    Local,
    Remote,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub body: String,
    pub origin: MessageOrigin,
}

/// Chat log plus the unread counter shown while the panel is hidden.
pub struct ChatChannel {
    max_messages: usize,
    messages: VecDeque<ChatMessage>,
    unread: usize,
    focused: bool,
}

impl ChatChannel {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages: max_messages.max(1),
            messages: VecDeque::new(),
            unread: 0,
            focused: false,
        }
    }

    /// Relay `body` to the room and append it locally.
    pub async fn send(
        &mut self,
        body: &str,
        display_name: &str,
        channel: &dyn SignalingChannel,
    ) -> Result<ChatMessage, CallError> {
        channel
            .send(OutboundMessage::Chat {
                body: body.to_string(),
                sender_name: display_name.to_string(),
            })
            .await?;
        let message = ChatMessage {
            sender: display_name.to_string(),
            body: body.to_string(),
            origin: MessageOrigin::Local,
        };
        self.push(message.clone());
        Ok(message)
    }

    /// Record a relayed message. Returns `None` for the echo of our own.
    pub fn on_message(
        &mut self,
        body: String,
        sender_name: String,
        sender_id: &ParticipantId,
        local_id: &ParticipantId,
    ) -> Option<ChatMessage> {
        if sender_id == local_id {
            debug!("Dropping echo of own chat message");
            return None;
        }
        let message = ChatMessage {
            sender: sender_name,
            body,
            origin: MessageOrigin::Remote,
        };
        self.push(message.clone());
        if !self.focused {
            self.unread += 1;
        }
        Some(message)
    }

    /// Show or hide the chat panel. Showing it clears the unread counter.
    /// Returns true when the counter changed.
    pub fn set_focused(&mut self, focused: bool) -> bool {
        self.focused = focused;
        if focused && self.unread > 0 {
            self.unread = 0;
            return true;
        }
        false
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    /// All retained messages, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    /// Most recent `limit` messages, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<&ChatMessage> {
        let skip = self.messages.len().saturating_sub(limit);
        self.messages.iter().skip(skip).collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.unread = 0;
        self.focused = false;
    }

    fn push(&mut self, message: ChatMessage) {
        if self.messages.len() >= self.max_messages {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }
}

impl Default for ChatChannel {
    fn default() -> Self {
        Self::new(500)
    }
}
