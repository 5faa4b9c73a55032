//! An in-process engine that negotiates synthetic SDP.
//!
//! Each outgoing sender becomes an `m=` section carrying the track id and
//! label, so applying a remote description surfaces the remote tracks just
//! like a browser's `ontrack`. Connections created on the same
//! [`SimulatedNetwork`] find their counterpart through the SDP origin line;
//! `replace_track` then reaches the other side without renegotiation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use meetify_common::ParticipantId;
use tracing::debug;

use super::engine::{PeerConnection, RtcEngine};
use super::types::{ConnectionEvent, IceConnectivity, PeerEventSink, RtcConfig, SenderId};
use crate::error::CallError;
use crate::media::{LocalTrack, TrackKind};
use crate::protocol::{IceCandidate, SdpKind, SessionDescription};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Origin ids are unique process-wide so SDP from one network can never
/// name an endpoint on another.
static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Shared medium connecting simulated endpoints.
#[derive(Default)]
pub struct SimulatedNetwork {
    endpoints: Mutex<HashMap<u64, Weak<SimulatedConnection>>>,
}

impl SimulatedNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn register(&self, conn: &Arc<SimulatedConnection>) {
        lock(&self.endpoints).insert(conn.uid, Arc::downgrade(conn));
    }

    fn lookup(&self, uid: u64) -> Option<Arc<SimulatedConnection>> {
        lock(&self.endpoints).get(&uid).and_then(Weak::upgrade)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SimulatedEngine {
    network: Arc<SimulatedNetwork>,
    connections: Arc<Mutex<HashMap<ParticipantId, Arc<SimulatedConnection>>>>,
    report_connectivity: bool,
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEngine {
    /// An engine on a private network.
    pub fn new() -> Self {
        Self::on_network(SimulatedNetwork::new())
    }

    pub fn on_network(network: Arc<SimulatedNetwork>) -> Self {
        Self {
            network,
            connections: Arc::new(Mutex::new(HashMap::new())),
            report_connectivity: true,
        }
    }

    /// Connections never report connectivity, so the session's watchdog fires.
    pub fn without_connectivity(mut self) -> Self {
        self.report_connectivity = false;
        self
    }

    /// Latest connection created toward `remote_id`.
    pub fn connection(&self, remote_id: &ParticipantId) -> Option<Arc<SimulatedConnection>> {
        lock(&self.connections).get(remote_id).cloned()
    }

    /// Report a connectivity failure on the connection toward `remote_id`.
    pub fn fail_ice(&self, remote_id: &ParticipantId) -> bool {
        match self.connection(remote_id) {
            Some(conn) => conn
                .events
                .emit(ConnectionEvent::Connectivity(IceConnectivity::Failed)),
            None => false,
        }
    }
}

#[async_trait]
impl RtcEngine for SimulatedEngine {
    async fn create_connection(
        &self,
        remote_id: &ParticipantId,
        config: &RtcConfig,
        events: PeerEventSink,
    ) -> Result<Arc<dyn PeerConnection>, CallError> {
        let uid = NEXT_UID.fetch_add(1, Ordering::Relaxed);
        let conn = Arc::new(SimulatedConnection {
            uid,
            remote_id: remote_id.clone(),
            events,
            report_connectivity: self.report_connectivity,
            network: Arc::clone(&self.network),
            state: Mutex::new(ConnState::default()),
        });
        self.network.register(&conn);
        lock(&self.connections).insert(remote_id.clone(), Arc::clone(&conn));
        debug!(
            remote_id = %remote_id,
            uid,
            ice_servers = config.ice_servers.len(),
            "Simulated connection created"
        );
        Ok(conn as Arc<dyn PeerConnection>)
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

struct SimSender {
    kind: TrackKind,
    track: Option<LocalTrack>,
}

#[derive(Default)]
struct ConnState {
    senders: Vec<SimSender>,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    stable_local: Option<SessionDescription>,
    have_local_offer: bool,
    have_remote_offer: bool,
    version: u32,
    counterpart: Option<u64>,
    /// Remote m-line index to the track id last surfaced for it.
    announced: HashMap<usize, String>,
    applied: Vec<IceCandidate>,
    offers: usize,
    answers: usize,
    gathered: bool,
    connectivity_reported: bool,
    closed: bool,
}

pub struct SimulatedConnection {
    uid: u64,
    remote_id: ParticipantId,
    events: PeerEventSink,
    report_connectivity: bool,
    network: Arc<SimulatedNetwork>,
    state: Mutex<ConnState>,
}

impl SimulatedConnection {
    pub fn remote_id(&self) -> &ParticipantId {
        &self.remote_id
    }

    pub fn offers_created(&self) -> usize {
        lock(&self.state).offers
    }

    pub fn answers_created(&self) -> usize {
        lock(&self.state).answers
    }

    /// Candidate strings applied so far, in application order.
    pub fn applied_candidates(&self) -> Vec<String> {
        lock(&self.state)
            .applied
            .iter()
            .map(|c| c.candidate.clone())
            .collect()
    }

    pub fn sender_count(&self) -> usize {
        lock(&self.state).senders.len()
    }

    /// Id of the track the first sender of `kind` is carrying.
    pub fn outgoing_track(&self, kind: TrackKind) -> Option<String> {
        lock(&self.state)
            .senders
            .iter()
            .find(|s| s.kind == kind)
            .and_then(|s| s.track.as_ref().map(|t| t.id().to_string()))
    }

    pub fn has_remote_description(&self) -> bool {
        lock(&self.state).remote.is_some()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    fn ensure_open(state: &ConnState) -> Result<(), CallError> {
        if state.closed {
            return Err(CallError::Rtc("connection is closed".into()));
        }
        Ok(())
    }

    fn render_sdp(&self, state: &mut ConnState) -> String {
        state.version += 1;
        let mut sdp = format!(
            "v=0\r\no=- {} {} IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n",
            self.uid, state.version
        );
        for sender in &state.senders {
            sdp.push_str(&format!("m={} 9 UDP/TLS/RTP/SAVPF 96\r\n", sender.kind));
            match &sender.track {
                Some(track) => {
                    sdp.push_str(&format!("a=msid:{}\r\n", track.id()));
                    sdp.push_str(&format!("a=x-label:{}\r\n", track.label()));
                    sdp.push_str("a=sendrecv\r\n");
                }
                None => sdp.push_str("a=inactive\r\n"),
            }
        }
        sdp
    }

    fn connectivity_due(&self, state: &mut ConnState) -> bool {
        if self.report_connectivity
            && !state.connectivity_reported
            && state.local.is_some()
            && state.remote.is_some()
        {
            state.connectivity_reported = true;
            return true;
        }
        false
    }

    /// Surface a track the counterpart swapped onto an already negotiated
    /// sender.
    fn deliver_replacement(&self, index: usize, kind: TrackKind, track_id: &str, label: &str) {
        {
            let mut state = lock(&self.state);
            if state.closed || !state.announced.contains_key(&index) {
                return;
            }
            state.announced.insert(index, track_id.to_string());
        }
        self.events.emit(ConnectionEvent::RemoteTrack {
            kind,
            stream_id: track_id.to_string(),
            label: label.to_string(),
        });
    }
}

#[async_trait]
impl PeerConnection for SimulatedConnection {
    async fn create_offer(&self) -> Result<SessionDescription, CallError> {
        let mut state = lock(&self.state);
        Self::ensure_open(&state)?;
        state.offers += 1;
        Ok(SessionDescription::offer(self.render_sdp(&mut state)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, CallError> {
        let mut state = lock(&self.state);
        Self::ensure_open(&state)?;
        if !state.have_remote_offer {
            return Err(CallError::Rtc("no remote offer to answer".into()));
        }
        state.answers += 1;
        Ok(SessionDescription::answer(self.render_sdp(&mut state)))
    }

    async fn set_local_description(&self, desc: &SessionDescription) -> Result<(), CallError> {
        let mut events = Vec::new();
        {
            let mut state = lock(&self.state);
            Self::ensure_open(&state)?;
            match desc.kind {
                SdpKind::Offer => state.have_local_offer = true,
                SdpKind::Answer => {
                    if !state.have_remote_offer {
                        return Err(CallError::Rtc("answer without remote offer".into()));
                    }
                    state.have_remote_offer = false;
                    state.stable_local = Some(desc.clone());
                }
            }
            state.local = Some(desc.clone());
            if !state.gathered {
                state.gathered = true;
                events.push(ConnectionEvent::LocalCandidate(IceCandidate {
                    candidate: format!(
                        "candidate:{} 1 udp 2122260223 192.0.2.{} {} typ host",
                        self.uid,
                        self.uid % 250 + 1,
                        50000 + self.uid % 10000
                    ),
                    sdp_mid: Some("0".into()),
                    sdp_m_line_index: Some(0),
                }));
            }
            if self.connectivity_due(&mut state) {
                events.push(ConnectionEvent::Connectivity(IceConnectivity::Connected));
            }
        }
        for event in events {
            self.events.emit(event);
        }
        Ok(())
    }

    async fn set_remote_description(&self, desc: &SessionDescription) -> Result<(), CallError> {
        let parsed = ParsedSdp::parse(&desc.sdp);
        let mut events = Vec::new();
        {
            let mut state = lock(&self.state);
            Self::ensure_open(&state)?;
            match desc.kind {
                SdpKind::Offer => {
                    if state.have_local_offer {
                        return Err(CallError::Rtc(
                            "remote offer while a local offer is pending".into(),
                        ));
                    }
                    state.have_remote_offer = true;
                }
                SdpKind::Answer => {
                    if !state.have_local_offer {
                        return Err(CallError::Rtc("answer without local offer".into()));
                    }
                    state.have_local_offer = false;
                    state.stable_local = state.local.clone();
                }
            }
            state.remote = Some(desc.clone());
            if parsed.origin.is_some() {
                state.counterpart = parsed.origin;
            }
            for (index, media) in parsed.media.into_iter().enumerate() {
                let (Some(kind), Some(track_id)) = (media.kind, media.track_id) else {
                    continue;
                };
                if state.announced.get(&index) == Some(&track_id) {
                    continue;
                }
                state.announced.insert(index, track_id.clone());
                events.push(ConnectionEvent::RemoteTrack {
                    kind,
                    stream_id: track_id,
                    label: media.label,
                });
            }
            if self.connectivity_due(&mut state) {
                events.push(ConnectionEvent::Connectivity(IceConnectivity::Connected));
            }
        }
        for event in events {
            self.events.emit(event);
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), CallError> {
        let mut state = lock(&self.state);
        Self::ensure_open(&state)?;
        state.have_local_offer = false;
        state.local = state.stable_local.clone();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), CallError> {
        let mut state = lock(&self.state);
        Self::ensure_open(&state)?;
        if state.remote.is_none() {
            return Err(CallError::Rtc(
                "candidate applied before remote description".into(),
            ));
        }
        state.applied.push(candidate.clone());
        Ok(())
    }

    async fn add_track(&self, track: &LocalTrack) -> Result<SenderId, CallError> {
        let mut state = lock(&self.state);
        Self::ensure_open(&state)?;
        state.senders.push(SimSender {
            kind: track.track_kind(),
            track: Some(track.clone()),
        });
        Ok(SenderId(state.senders.len() - 1))
    }

    async fn replace_track(
        &self,
        sender: SenderId,
        track: Option<&LocalTrack>,
    ) -> Result<(), CallError> {
        let counterpart = {
            let mut state = lock(&self.state);
            Self::ensure_open(&state)?;
            let slot = state
                .senders
                .get_mut(sender.0)
                .ok_or_else(|| CallError::Rtc(format!("unknown sender {}", sender.0)))?;
            if let Some(track) = track {
                if track.track_kind() != slot.kind {
                    return Err(CallError::Rtc(format!(
                        "cannot put {} track on {} sender",
                        track.track_kind(),
                        slot.kind
                    )));
                }
            }
            slot.track = track.cloned();
            state.counterpart
        };
        if let (Some(uid), Some(track)) = (counterpart, track) {
            if let Some(peer) = self.network.lookup(uid) {
                peer.deliver_replacement(sender.0, track.track_kind(), track.id(), track.label());
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), CallError> {
        lock(&self.state).closed = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SDP parsing
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ParsedMedia {
    kind: Option<TrackKind>,
    track_id: Option<String>,
    label: String,
}

#[derive(Default)]
struct ParsedSdp {
    origin: Option<u64>,
    media: Vec<ParsedMedia>,
}

impl ParsedSdp {
    fn parse(sdp: &str) -> Self {
        let mut parsed = ParsedSdp::default();
        for line in sdp.lines() {
            if let Some(rest) = line.strip_prefix("o=") {
                parsed.origin = rest.split_whitespace().nth(1).and_then(|v| v.parse().ok());
            } else if let Some(rest) = line.strip_prefix("m=") {
                parsed.media.push(ParsedMedia {
                    kind: rest.split_whitespace().next().and_then(TrackKind::parse),
                    ..Default::default()
                });
            } else if let Some(rest) = line.strip_prefix("a=msid:") {
                if let Some(media) = parsed.media.last_mut() {
                    media.track_id = Some(rest.trim().to_string());
                }
            } else if let Some(rest) = line.strip_prefix("a=x-label:") {
                if let Some(media) = parsed.media.last_mut() {
                    media.label = rest.to_string();
                }
            }
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use crate::rtc::PeerEvent;
    use tokio::sync::mpsc;

    async fn pair() -> (
        Arc<dyn PeerConnection>,
        mpsc::UnboundedReceiver<PeerEvent>,
        Arc<dyn PeerConnection>,
        mpsc::UnboundedReceiver<PeerEvent>,
    ) {
        let network = SimulatedNetwork::new();
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let a = SimulatedEngine::on_network(Arc::clone(&network))
            .create_connection(
                &"b".into(),
                &RtcConfig::default(),
                PeerEventSink::new("b".into(), 0, tx_a),
            )
            .await
            .unwrap();
        let b = SimulatedEngine::on_network(network)
            .create_connection(
                &"a".into(),
                &RtcConfig::default(),
                PeerEventSink::new("a".into(), 0, tx_b),
            )
            .await
            .unwrap();
        (a, rx_a, b, rx_b)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PeerEvent>) -> Vec<ConnectionEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev.event);
        }
        out
    }

    async fn negotiate(a: &Arc<dyn PeerConnection>, b: &Arc<dyn PeerConnection>) {
        let offer = a.create_offer().await.unwrap();
        a.set_local_description(&offer).await.unwrap();
        b.set_remote_description(&offer).await.unwrap();
        let answer = b.create_answer().await.unwrap();
        b.set_local_description(&answer).await.unwrap();
        a.set_remote_description(&answer).await.unwrap();
    }

    #[tokio::test]
    async fn negotiation_surfaces_tracks_and_connectivity() {
        let (a, mut rx_a, b, mut rx_b) = pair().await;
        let cam = LocalTrack::new(MediaKind::Camera, "Front Camera");
        a.add_track(&cam).await.unwrap();
        negotiate(&a, &b).await;

        let b_events = drain(&mut rx_b);
        assert!(b_events.contains(&ConnectionEvent::RemoteTrack {
            kind: TrackKind::Video,
            stream_id: cam.id().to_string(),
            label: "Front Camera".into(),
        }));
        assert!(b_events.contains(&ConnectionEvent::Connectivity(IceConnectivity::Connected)));

        let a_events = drain(&mut rx_a);
        assert!(a_events
            .iter()
            .any(|e| matches!(e, ConnectionEvent::LocalCandidate(_))));
        assert!(a_events.contains(&ConnectionEvent::Connectivity(IceConnectivity::Connected)));
    }

    #[tokio::test]
    async fn candidates_require_remote_description() {
        let (a, _rx_a, b, _rx_b) = pair().await;
        let err = a.add_ice_candidate(&IceCandidate::new("c1")).await.unwrap_err();
        assert!(matches!(err, CallError::Rtc(_)));

        negotiate(&a, &b).await;
        a.add_ice_candidate(&IceCandidate::new("c1")).await.unwrap();
    }

    #[tokio::test]
    async fn replace_track_reaches_counterpart_without_renegotiation() {
        let (a, _rx_a, b, mut rx_b) = pair().await;
        let cam = LocalTrack::new(MediaKind::Camera, "cam");
        let sender = a.add_track(&cam).await.unwrap();
        negotiate(&a, &b).await;
        drain(&mut rx_b);

        let screen = LocalTrack::new(MediaKind::Screen, "screen:0");
        a.replace_track(sender, Some(&screen)).await.unwrap();
        assert_eq!(
            drain(&mut rx_b),
            vec![ConnectionEvent::RemoteTrack {
                kind: TrackKind::Video,
                stream_id: screen.id().to_string(),
                label: "screen:0".into(),
            }]
        );
    }

    #[tokio::test]
    async fn replace_track_rejects_kind_mismatch() {
        let (a, _rx_a, _b, _rx_b) = pair().await;
        let mic = LocalTrack::new(MediaKind::Microphone, "mic");
        let sender = a.add_track(&mic).await.unwrap();
        let cam = LocalTrack::new(MediaKind::Camera, "cam");
        assert!(a.replace_track(sender, Some(&cam)).await.is_err());
        assert!(a.replace_track(SenderId(9), None).await.is_err());
    }

    #[tokio::test]
    async fn rollback_allows_remote_offer() {
        let (a, _rx_a, b, _rx_b) = pair().await;
        let offer_a = a.create_offer().await.unwrap();
        a.set_local_description(&offer_a).await.unwrap();

        let offer_b = b.create_offer().await.unwrap();
        assert!(a.set_remote_description(&offer_b).await.is_err());
        a.rollback().await.unwrap();
        a.set_remote_description(&offer_b).await.unwrap();
        let answer = a.create_answer().await.unwrap();
        a.set_local_description(&answer).await.unwrap();
    }

    #[tokio::test]
    async fn closed_connection_rejects_calls() {
        let (a, _rx_a, _b, _rx_b) = pair().await;
        a.close().await.unwrap();
        a.close().await.unwrap();
        assert!(a.create_offer().await.is_err());
    }

    #[test]
    fn parse_reads_origin_and_media() {
        let sdp = "v=0\r\no=- 42 1 IN IP4 127.0.0.1\r\nm=audio 9 X 96\r\na=msid:t1\r\na=x-label:Mic\r\nm=video 9 X 96\r\na=inactive\r\n";
        let parsed = ParsedSdp::parse(sdp);
        assert_eq!(parsed.origin, Some(42));
        assert_eq!(parsed.media.len(), 2);
        assert_eq!(parsed.media[0].track_id.as_deref(), Some("t1"));
        assert_eq!(parsed.media[0].label, "Mic");
        assert_eq!(parsed.media[1].kind, Some(TrackKind::Video));
        assert!(parsed.media[1].track_id.is_none());
    }
}
