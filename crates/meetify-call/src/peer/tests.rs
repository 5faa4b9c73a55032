use std::sync::Arc;

use meetify_common::ParticipantId;
use tokio::sync::mpsc;

use super::*;
use crate::error::CallError;
use crate::media::{LocalTrack, MediaKind, TrackKind};
use crate::protocol::{IceCandidate, OutboundMessage, SdpKind, SessionDescription, SignalPayload};
use crate::rtc::{
    PeerConnection, PeerEvent, PeerEventSink, RtcConfig, RtcEngine, SimulatedConnection,
    SimulatedEngine,
};
use crate::test_support::RecordingChannel;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    link: PeerLink,
    conn: Arc<SimulatedConnection>,
    _events: mpsc::UnboundedReceiver<PeerEvent>,
}

async fn harness(engine: &SimulatedEngine, remote: &str, initiator: bool) -> Harness {
    let (tx, rx) = mpsc::unbounded_channel();
    let remote_id = ParticipantId::from(remote);
    let connection: Arc<dyn PeerConnection> = engine
        .create_connection(
            &remote_id,
            &RtcConfig::default(),
            PeerEventSink::new(remote_id.clone(), 1, tx),
        )
        .await
        .unwrap();
    Harness {
        link: PeerLink::new(remote_id.clone(), 1, initiator, connection),
        conn: engine.connection(&remote_id).unwrap(),
        _events: rx,
    }
}

/// Two engines on a shared network: `a` is the earlier joiner, `b` the later.
async fn pair() -> (Harness, RecordingChannel, Harness, RecordingChannel) {
    let network = crate::rtc::SimulatedNetwork::new();
    let a = harness(&SimulatedEngine::on_network(Arc::clone(&network)), "b", false).await;
    let b = harness(&SimulatedEngine::on_network(network), "a", true).await;
    (a, RecordingChannel::new("a"), b, RecordingChannel::new("b"))
}

async fn connect(a: &mut Harness, a_chan: &RecordingChannel, b: &mut Harness, b_chan: &RecordingChannel) {
    b.link.create_offer(b_chan).await.unwrap();
    let offer = b_chan.take_descriptions().remove(0);
    a.link.receive_offer(offer, a_chan).await.unwrap();
    let answer = a_chan.take_descriptions().remove(0);
    b.link.receive_answer(answer, b_chan).await.unwrap();
}

// ---------------------------------------------------------------------------
// Negotiation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initiator_offer_and_answer_reach_stable() {
    let (mut a, a_chan, mut b, b_chan) = pair().await;

    b.link.create_offer(&b_chan).await.unwrap();
    assert_eq!(b.link.state(), LinkState::HaveLocalOffer);
    let offer = b_chan.take_descriptions().remove(0);
    assert_eq!(offer.kind, SdpKind::Offer);

    a.link.receive_offer(offer, &a_chan).await.unwrap();
    assert_eq!(a.link.state(), LinkState::Stable);
    let sent = a_chan.take();
    assert_eq!(sent.len(), 1);
    let OutboundMessage::Signal { to, payload: SignalPayload::Sdp(answer) } = &sent[0] else {
        panic!("expected answer, got {sent:?}");
    };
    assert_eq!(to.as_str(), "b");
    assert_eq!(answer.kind, SdpKind::Answer);

    b.link.receive_answer(answer.clone(), &b_chan).await.unwrap();
    assert_eq!(b.link.state(), LinkState::Stable);
    assert_eq!(a.conn.offers_created(), 0);
    assert_eq!(b.conn.offers_created(), 1);
}

#[tokio::test]
async fn create_offer_only_from_new() {
    let (mut a, a_chan, mut b, b_chan) = pair().await;
    connect(&mut a, &a_chan, &mut b, &b_chan).await;
    let err = b.link.create_offer(&b_chan).await.unwrap_err();
    assert!(matches!(err, CallError::InvalidState { op: "create offer", .. }));
}

#[tokio::test]
async fn unexpected_answer_is_invalid_signal() {
    let (mut a, a_chan, _b, _b_chan) = pair().await;
    let err = a
        .link
        .receive_answer(SessionDescription::answer("v=0"), &a_chan)
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::InvalidSignal(_)));
    assert_eq!(a.link.state(), LinkState::New);
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn early_candidates_apply_in_arrival_order() {
    let (mut a, a_chan, mut b, b_chan) = pair().await;

    for c in ["c1", "c2", "c3"] {
        a.link.receive_ice_candidate(IceCandidate::new(c)).await.unwrap();
    }
    assert_eq!(a.link.pending_candidates(), 3);
    assert!(a.conn.applied_candidates().is_empty());

    b.link.create_offer(&b_chan).await.unwrap();
    let offer = b_chan.take_descriptions().remove(0);
    a.link.receive_offer(offer, &a_chan).await.unwrap();
    assert_eq!(a.link.pending_candidates(), 0);
    assert_eq!(a.conn.applied_candidates(), vec!["c1", "c2", "c3"]);

    a.link.receive_ice_candidate(IceCandidate::new("c4")).await.unwrap();
    assert_eq!(a.conn.applied_candidates(), vec!["c1", "c2", "c3", "c4"]);
}

#[tokio::test]
async fn initiator_queues_until_answer() {
    let (mut a, a_chan, mut b, b_chan) = pair().await;
    b.link.create_offer(&b_chan).await.unwrap();
    b.link.receive_ice_candidate(IceCandidate::new("early")).await.unwrap();
    assert_eq!(b.link.pending_candidates(), 1);

    let offer = b_chan.take_descriptions().remove(0);
    a.link.receive_offer(offer, &a_chan).await.unwrap();
    let answer = a_chan.take_descriptions().remove(0);
    b.link.receive_answer(answer, &b_chan).await.unwrap();
    assert_eq!(b.conn.applied_candidates(), vec!["early"]);
}

#[tokio::test]
async fn candidates_after_close_are_rejected() {
    let (mut a, _a_chan, _b, _b_chan) = pair().await;
    a.link.close().await;
    assert!(a.link.receive_ice_candidate(IceCandidate::new("late")).await.is_err());
}

// ---------------------------------------------------------------------------
// Tracks and renegotiation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn attach_adds_then_replaces() {
    let (mut a, _a_chan, _b, _b_chan) = pair().await;
    let cam = LocalTrack::new(MediaKind::Camera, "cam");
    assert!(a.link.attach_track(TrackKind::Video, Some(&cam)).await.unwrap());
    assert_eq!(a.link.outgoing_track(TrackKind::Video), Some(cam.id()));

    let screen = LocalTrack::new(MediaKind::Screen, "screen:0");
    assert!(!a.link.attach_track(TrackKind::Video, Some(&screen)).await.unwrap());
    assert_eq!(a.conn.sender_count(), 1);
    assert_eq!(a.conn.outgoing_track(TrackKind::Video).as_deref(), Some(screen.id()));

    assert!(!a.link.attach_track(TrackKind::Video, None).await.unwrap());
    assert_eq!(a.link.outgoing_track(TrackKind::Video), None);
    assert!(!a.link.attach_track(TrackKind::Audio, None).await.unwrap());
}

#[tokio::test]
async fn renegotiation_when_stable_sends_new_offer() {
    let (mut a, a_chan, mut b, b_chan) = pair().await;
    connect(&mut a, &a_chan, &mut b, &b_chan).await;

    let mic = LocalTrack::new(MediaKind::Microphone, "mic");
    assert!(a.link.attach_track(TrackKind::Audio, Some(&mic)).await.unwrap());
    a.link.request_renegotiation(&a_chan).await.unwrap();
    assert_eq!(a.link.state(), LinkState::Renegotiating);

    let offer = a_chan.take_descriptions().remove(0);
    b.link.receive_offer(offer, &b_chan).await.unwrap();
    let answer = b_chan.take_descriptions().remove(0);
    a.link.receive_answer(answer, &a_chan).await.unwrap();
    assert_eq!(a.link.state(), LinkState::Stable);
    assert_eq!(a.conn.offers_created(), 1);
}

#[tokio::test]
async fn renegotiation_is_deferred_until_stable() {
    let (mut a, a_chan, mut b, b_chan) = pair().await;
    b.link.create_offer(&b_chan).await.unwrap();
    b.link.request_renegotiation(&b_chan).await.unwrap();
    assert!(b.link.renegotiation_pending());
    assert_eq!(b.link.state(), LinkState::HaveLocalOffer);
    let sent = b_chan.take_descriptions();
    assert_eq!(sent.len(), 1);

    a.link.receive_offer(sent[0].clone(), &a_chan).await.unwrap();
    let answer = a_chan.take_descriptions().remove(0);
    b.link.receive_answer(answer, &b_chan).await.unwrap();

    assert!(!b.link.renegotiation_pending());
    assert_eq!(b.link.state(), LinkState::Renegotiating);
    assert_eq!(b_chan.take_descriptions().len(), 1);
}

#[tokio::test]
async fn glare_initiator_keeps_its_offer() {
    let (mut a, a_chan, mut b, b_chan) = pair().await;
    connect(&mut a, &a_chan, &mut b, &b_chan).await;

    // Both sides renegotiate at once.
    a.link.request_renegotiation(&a_chan).await.unwrap();
    b.link.request_renegotiation(&b_chan).await.unwrap();
    let offer_from_a = a_chan.take_descriptions().remove(0);
    let offer_from_b = b_chan.take_descriptions().remove(0);

    let err = b.link.receive_offer(offer_from_a, &b_chan).await.unwrap_err();
    assert_eq!(err, CallError::NegotiationConflict("a".into()));
    assert_eq!(b.link.state(), LinkState::Renegotiating);

    a.link.receive_offer(offer_from_b, &a_chan).await.unwrap();
    let sent = a_chan.take_descriptions();
    assert_eq!(sent.len(), 2, "answer then re-offer");
    assert_eq!(sent[0].kind, SdpKind::Answer);
    assert_eq!(sent[1].kind, SdpKind::Offer);
    assert_eq!(a.link.state(), LinkState::Renegotiating);

    b.link.receive_answer(sent[0].clone(), &b_chan).await.unwrap();
    b.link.receive_offer(sent[1].clone(), &b_chan).await.unwrap();
    let answer = b_chan.take_descriptions().remove(0);
    a.link.receive_answer(answer, &a_chan).await.unwrap();
    assert_eq!(a.link.state(), LinkState::Stable);
    assert_eq!(b.link.state(), LinkState::Stable);
}

// ---------------------------------------------------------------------------
// Remote media, connectivity, close
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remote_tracks_replace_per_kind() {
    let (mut a, _a_chan, _b, _b_chan) = pair().await;
    let cam = a.link.on_remote_track(TrackKind::Video, "s1", "Camera");
    assert!(!cam.presentation);
    let screen = a.link.on_remote_track(TrackKind::Video, "s2", "Screen 1");
    assert!(screen.presentation);
    assert_eq!(a.link.remote_stream(TrackKind::Video), Some(&screen));
    assert_eq!(a.link.snapshot().remote_streams.len(), 1);
}

#[tokio::test]
async fn mark_connected_reports_once() {
    let (mut a, _a_chan, _b, _b_chan) = pair().await;
    assert!(a.link.mark_connected());
    assert!(!a.link.mark_connected());
    assert!(a.link.snapshot().connected);
}

#[tokio::test]
async fn close_is_idempotent() {
    let (mut a, a_chan, _b, _b_chan) = pair().await;
    a.link.receive_ice_candidate(IceCandidate::new("q")).await.unwrap();
    a.link.close().await;
    a.link.close().await;
    assert_eq!(a.link.state(), LinkState::Closed);
    assert_eq!(a.link.pending_candidates(), 0);
    assert!(a.conn.is_closed());
    let err = a
        .link
        .receive_offer(SessionDescription::offer("v=0"), &a_chan)
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::InvalidState { .. }));
}

#[tokio::test]
async fn registry_tracks_links_by_id() {
    let engine = SimulatedEngine::new();
    let mut registry = PeerRegistry::new();
    registry.insert(harness(&engine, "x", false).await.link);
    registry.insert(harness(&engine, "y", true).await.link);
    assert_eq!(registry.ids(), vec![ParticipantId::from("x"), ParticipantId::from("y")]);
    assert!(registry.contains(&"x".into()));

    let mut removed = registry.remove(&"x".into()).unwrap();
    removed.close().await;
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.drain().len(), 1);
    assert!(registry.is_empty());
}
