use std::sync::Arc;

use async_trait::async_trait;
use meetify_common::ParticipantId;
use tokio::sync::mpsc;

use crate::error::CallError;
use crate::protocol::{InboundEvent, OutboundMessage};

/// Outbound half of a relay connection.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Id the relay assigned to this connection.
    fn local_id(&self) -> &ParticipantId;

    async fn send(&self, message: OutboundMessage) -> Result<(), CallError>;

    /// Close the connection. The relay announces our departure to the room.
    async fn close(&self);
}

/// A live relay connection: the sending half plus the ordered inbound stream.
/// The stream ends with [`InboundEvent::Disconnected`] when the connection
/// drops.
pub struct SignalingLink {
    pub channel: Arc<dyn SignalingChannel>,
    pub inbound: mpsc::UnboundedReceiver<InboundEvent>,
}

#[async_trait]
pub trait SignalingConnector: Send + Sync {
    /// Open a connection, passing `token` through to the relay untouched.
    async fn connect(&self, token: Option<&str>) -> Result<SignalingLink, CallError>;
}
