//! In-process relay with the same routing rules as the WebSocket server:
//! joins and departures are broadcast to the whole room (newcomer included),
//! signals go only to their addressee, chat goes to everyone including the
//! author.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use meetify_common::ParticipantId;
use tokio::sync::mpsc;
use tracing::debug;

use super::types::{SignalingChannel, SignalingConnector, SignalingLink};
use crate::error::CallError;
use crate::protocol::{InboundEvent, OutboundMessage};

struct Member {
    room: Option<String>,
    tx: mpsc::UnboundedSender<InboundEvent>,
}

#[derive(Default)]
struct RelayState {
    next_id: u64,
    offline: bool,
    members: HashMap<ParticipantId, Member>,
    /// Join order per room.
    rooms: BTreeMap<String, Vec<ParticipantId>>,
    tokens: Vec<Option<String>>,
}

impl RelayState {
    fn deliver(&self, to: &ParticipantId, event: InboundEvent) {
        if let Some(member) = self.members.get(to) {
            let _ = member.tx.send(event);
        }
    }

    fn broadcast(&self, room: &str, event: InboundEvent) {
        if let Some(ids) = self.rooms.get(room) {
            for id in ids {
                self.deliver(id, event.clone());
            }
        }
    }

    fn remove(&mut self, id: &ParticipantId) -> bool {
        let Some(member) = self.members.remove(id) else {
            return false;
        };
        if let Some(room) = member.room {
            if let Some(ids) = self.rooms.get_mut(&room) {
                ids.retain(|m| m != id);
                if ids.is_empty() {
                    self.rooms.remove(&room);
                }
            }
            self.broadcast(&room, InboundEvent::UserLeft { id: id.clone() });
        }
        true
    }
}

#[derive(Clone, Default)]
pub struct MemoryRelay {
    state: Arc<Mutex<RelayState>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// While offline, new connections are refused.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Members of `room` in join order.
    pub fn room_members(&self, room: &str) -> Vec<ParticipantId> {
        self.lock().rooms.get(room).cloned().unwrap_or_default()
    }

    /// Tokens presented by every connection so far, in connection order.
    pub fn tokens(&self) -> Vec<Option<String>> {
        self.lock().tokens.clone()
    }

    /// Sever a connection as if its socket died: the client sees
    /// `Disconnected`, the room sees `user-left`.
    pub fn drop_connection(&self, id: &ParticipantId) -> bool {
        let mut state = self.lock();
        let tx = state.members.get(id).map(|m| m.tx.clone());
        let removed = state.remove(id);
        if let Some(tx) = tx {
            let _ = tx.send(InboundEvent::Disconnected);
        }
        removed
    }

    fn route(&self, from: &ParticipantId, message: OutboundMessage) -> Result<(), CallError> {
        let mut state = self.lock();
        if !state.members.contains_key(from) {
            return Err(CallError::ChannelUnavailable("connection closed".into()));
        }
        match message {
            OutboundMessage::JoinCall { room } => {
                if let Some(member) = state.members.get_mut(from) {
                    if member.room.as_deref() == Some(room.as_str()) {
                        return Ok(());
                    }
                    member.room = Some(room.clone());
                }
                let ids = state.rooms.entry(room.clone()).or_default();
                ids.push(from.clone());
                let members = ids.clone();
                debug!(room = %room, id = %from, size = members.len(), "Relay join");
                state.broadcast(
                    &room,
                    InboundEvent::UserJoined {
                        id: from.clone(),
                        members,
                    },
                );
            }
            OutboundMessage::Signal { to, payload } => {
                state.deliver(
                    &to,
                    InboundEvent::Signal {
                        from: from.clone(),
                        payload,
                    },
                );
            }
            OutboundMessage::Chat { body, sender_name } => {
                let room = state.members.get(from).and_then(|m| m.room.clone());
                if let Some(room) = room {
                    state.broadcast(
                        &room,
                        InboundEvent::Chat {
                            body,
                            sender_name,
                            sender_id: from.clone(),
                        },
                    );
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SignalingConnector for MemoryRelay {
    async fn connect(&self, token: Option<&str>) -> Result<SignalingLink, CallError> {
        let mut state = self.lock();
        if state.offline {
            return Err(CallError::ChannelUnavailable("relay offline".into()));
        }
        state.next_id += 1;
        let id = ParticipantId::new(format!("peer-{}", state.next_id));
        let (tx, rx) = mpsc::unbounded_channel();
        state.members.insert(id.clone(), Member { room: None, tx });
        state.tokens.push(token.map(str::to_string));
        drop(state);

        Ok(SignalingLink {
            channel: Arc::new(MemoryChannel {
                relay: self.clone(),
                local_id: id,
            }),
            inbound: rx,
        })
    }
}

struct MemoryChannel {
    relay: MemoryRelay,
    local_id: ParticipantId,
}

#[async_trait]
impl SignalingChannel for MemoryChannel {
    fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), CallError> {
        self.relay.route(&self.local_id, message)
    }

    async fn close(&self) {
        self.relay.lock().remove(&self.local_id);
    }
}
