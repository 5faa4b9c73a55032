//! WebSocket connector for the relay.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use meetify_common::ParticipantId;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tracing::{debug, info};

use super::connection::{spawn_connection, WsCommand};
use super::types::{SignalingChannel, SignalingConnector, SignalingLink};
use crate::error::CallError;
use crate::protocol::{OutboundMessage, WireFrame};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsSignalingConfig {
    /// `ws://` or `wss://` endpoint of the relay.
    pub url: String,
    /// Bound on the TCP/TLS handshake and on waiting for the `connected` frame.
    pub connect_timeout: Duration,
    /// Interval between WebSocket pings. `None` disables them.
    pub keepalive: Option<Duration>,
}

impl Default for WsSignalingConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws".to_string(),
            connect_timeout: Duration::from_secs(10),
            keepalive: Some(Duration::from_secs(25)),
        }
    }
}

impl WsSignalingConfig {
    /// The relay URL with `token` appended as a query parameter.
    pub(crate) fn url_with_token(&self, token: Option<&str>) -> String {
        match token {
            Some(token) if !token.is_empty() => {
                let sep = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{sep}token={}", self.url, urlencoding::encode(token))
            }
            _ => self.url.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    config: WsSignalingConfig,
}

impl WsConnector {
    pub fn new(config: WsSignalingConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SignalingConnector for WsConnector {
    async fn connect(&self, token: Option<&str>) -> Result<SignalingLink, CallError> {
        let url = self.config.url_with_token(token);
        let timeout = self.config.connect_timeout;
        info!(url = %self.config.url, "Connecting to signaling relay");

        let (ws_stream, _) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| {
                CallError::ChannelUnavailable(format!(
                    "connection timed out after {}s",
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| CallError::ChannelUnavailable(e.to_string()))?;

        let (ws_write, mut ws_read) = ws_stream.split();
        let local_id = tokio::time::timeout(timeout, read_assigned_id(&mut ws_read))
            .await
            .map_err(|_| {
                CallError::ChannelUnavailable("relay never assigned a participant id".into())
            })??;
        info!(local_id = %local_id, "Signaling relay connected");

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(64);
        spawn_connection(
            ws_read,
            ws_write,
            inbound_tx,
            command_rx,
            self.config.keepalive,
        );

        Ok(SignalingLink {
            channel: Arc::new(WsChannel {
                local_id,
                command_tx,
            }),
            inbound: inbound_rx,
        })
    }
}

/// Read frames until the relay's `connected` greeting.
async fn read_assigned_id<S>(read: &mut S) -> Result<ParticipantId, CallError>
where
    S: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    while let Some(msg) = read.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => {
                let frame: WireFrame = serde_json::from_str(&text).map_err(|e| {
                    CallError::ChannelUnavailable(format!("unreadable greeting: {e}"))
                })?;
                return frame.assigned_id().ok_or_else(|| {
                    CallError::ChannelUnavailable(format!(
                        "expected connected frame, got {}",
                        frame.event
                    ))
                });
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => debug!("Skipping non-text frame before greeting"),
            Err(e) => return Err(CallError::ChannelUnavailable(e.to_string())),
        }
    }
    Err(CallError::ChannelUnavailable(
        "relay closed the connection during handshake".into(),
    ))
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

struct WsChannel {
    local_id: ParticipantId,
    command_tx: mpsc::Sender<WsCommand>,
}

#[async_trait]
impl SignalingChannel for WsChannel {
    fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), CallError> {
        self.command_tx
            .send(WsCommand::Send(WireFrame::from(&message)))
            .await
            .map_err(|_| CallError::ChannelUnavailable("signaling connection closed".into()))
    }

    async fn close(&self) {
        let _ = self.command_tx.send(WsCommand::Close).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{InboundEvent, SignalPayload, IceCandidate};
    use futures_util::SinkExt;
    use tokio::net::TcpListener;

    #[test]
    fn token_is_appended_and_encoded() {
        let config = WsSignalingConfig {
            url: "ws://relay.local/ws".into(),
            ..Default::default()
        };
        assert_eq!(config.url_with_token(None), "ws://relay.local/ws");
        assert_eq!(config.url_with_token(Some("")), "ws://relay.local/ws");
        assert_eq!(
            config.url_with_token(Some("a b&c")),
            "ws://relay.local/ws?token=a%20b%26c"
        );

        let config = WsSignalingConfig {
            url: "ws://relay.local/ws?v=2".into(),
            ..Default::default()
        };
        assert_eq!(
            config.url_with_token(Some("t")),
            "ws://relay.local/ws?v=2&token=t"
        );
    }

    /// Minimal relay: greets, records the first client frame, then replays
    /// one `user-left` and one `signal` before closing.
    async fn spawn_fake_relay() -> (String, tokio::sync::oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(WsMessage::Text(
                r#"{"event":"connected","args":["sock-7"]}"#.into(),
            ))
            .await
            .unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let WsMessage::Text(text) = msg {
                    let _ = seen_tx.send(text.to_string());
                    break;
                }
            }
            ws.send(WsMessage::Text(
                r#"{"event":"user-left","args":["sock-2"]}"#.into(),
            ))
            .await
            .unwrap();
            ws.send(WsMessage::Text(
                r#"{"event":"signal","args":["sock-2","{\"ice\":{\"candidate\":\"c9\"}}"]}"#
                    .into(),
            ))
            .await
            .unwrap();
            let _ = ws.close(None).await;
        });
        (format!("ws://{addr}/ws"), seen_rx)
    }

    #[tokio::test]
    async fn connects_and_exchanges_frames() {
        let (url, seen_rx) = spawn_fake_relay().await;
        let connector = WsConnector::new(WsSignalingConfig {
            url,
            connect_timeout: Duration::from_secs(5),
            keepalive: None,
        });
        let SignalingLink {
            channel,
            mut inbound,
        } = connector.connect(Some("secret")).await.unwrap();
        assert_eq!(channel.local_id().as_str(), "sock-7");

        channel
            .send(OutboundMessage::JoinCall {
                room: "ROOM42".into(),
            })
            .await
            .unwrap();
        let seen = seen_rx.await.unwrap();
        assert_eq!(seen, r#"{"event":"join-call","args":["ROOM42"]}"#);

        assert_eq!(
            inbound.recv().await,
            Some(InboundEvent::UserLeft { id: "sock-2".into() })
        );
        assert_eq!(
            inbound.recv().await,
            Some(InboundEvent::Signal {
                from: "sock-2".into(),
                payload: SignalPayload::Ice(IceCandidate::new("c9")),
            })
        );
        assert_eq!(inbound.recv().await, Some(InboundEvent::Disconnected));
    }

    #[tokio::test]
    async fn unreachable_relay_is_channel_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = WsConnector::new(WsSignalingConfig {
            url: format!("ws://{addr}/ws"),
            connect_timeout: Duration::from_secs(2),
            keepalive: None,
        });
        let err = connector.connect(None).await.err().unwrap();
        assert!(matches!(err, CallError::ChannelUnavailable(_)));
    }
}
