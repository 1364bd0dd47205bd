use pretty_assertions::assert_eq;
use propsync_sync::sse::MAX_EVENT_SIZE;
use propsync_sync::transport::mock::MockTransport;
use propsync_sync::{
    ConnectionState, NotificationChannel, ReconnectPolicy, RecordingAlertSink, Severity,
};
use propsync_types::{EventEnvelope, EventKind, Property, PropertyId, PropertyKind, PropertyStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

fn listing(id: u64, name: &str) -> Property {
    Property {
        id: PropertyId::new(id),
        name: name.to_string(),
        kind: PropertyKind::Sale,
        owner: "Jo Park".to_string(),
        price: 250_000.0,
        status: PropertyStatus::Available,
        latitude: 0.0,
        longitude: 0.0,
        description: None,
        bedrooms: None,
        bathrooms: None,
        square_feet: None,
        address: None,
        images: None,
        created_at: String::new(),
        updated_at: String::new(),
    }
}

struct Harness {
    transport: MockTransport,
    alerts: Arc<RecordingAlertSink>,
    channel: NotificationChannel,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn harness() -> Harness {
    init_tracing();
    let transport = MockTransport::new();
    let alerts = Arc::new(RecordingAlertSink::new());
    let channel = NotificationChannel::new(
        Arc::new(transport.clone()),
        ReconnectPolicy::default(),
        alerts.clone(),
    );
    Harness {
        transport,
        alerts,
        channel,
    }
}

/// Forwards every dispatched envelope into a channel the test can await.
fn collect(channel: &NotificationChannel) -> mpsc::UnboundedReceiver<EventEnvelope> {
    let (tx, rx) = mpsc::unbounded_channel();
    channel.registry().subscribe(move |envelope| {
        tx.send(envelope.clone())?;
        Ok(())
    });
    rx
}

async fn wait_for(channel: &NotificationChannel, state: ConnectionState) {
    let mut changes = channel.state_changes();
    tokio::time::timeout(Duration::from_secs(600), changes.wait_for(|s| *s == state))
        .await
        .expect("state not reached in time")
        .expect("channel dropped");
}

fn gaps_ms(instants: &[Instant]) -> Vec<u128> {
    instants
        .windows(2)
        .map(|w| (w[1] - w[0]).as_millis())
        .collect()
}

// ── Policy ──────────────────────────────────────────────────────

#[test]
fn default_policy_delays() {
    let policy = ReconnectPolicy::default();
    let delays: Vec<u128> = (1..=6).map(|a| policy.delay_for(a).as_millis()).collect();
    assert_eq!(delays, vec![2000, 4000, 8000, 16000, 30000, 30000]);
}

#[test]
fn new_channel_is_idle() {
    let h = harness();
    assert_eq!(h.channel.state(), ConnectionState::Idle);
    assert_eq!(h.channel.reconnect_attempts(), 0);
    assert!(!h.channel.is_connected());
}

// ── Connect / receive ───────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn receives_envelopes_in_order() {
    let h = harness();
    let stream = h.transport.accept_next();
    let mut rx = collect(&h.channel);

    h.channel.connect();
    wait_for(&h.channel, ConnectionState::Open).await;

    stream.send_data(r#"{"type":"connection","message":"Connected to real-time updates"}"#);
    stream.send_envelope(&EventEnvelope::PropertyCreated(listing(1, "Alpha")));

    assert_eq!(rx.recv().await.unwrap().kind(), EventKind::Connection);
    assert_eq!(
        rx.recv().await.unwrap(),
        EventEnvelope::PropertyCreated(listing(1, "Alpha"))
    );
    assert!(h.channel.is_connected());
}

#[tokio::test(start_paused = true)]
async fn malformed_message_between_valid_ones_is_dropped() {
    let h = harness();
    let stream = h.transport.accept_next();
    let mut rx = collect(&h.channel);

    h.channel.connect();
    wait_for(&h.channel, ConnectionState::Open).await;

    stream.send_envelope(&EventEnvelope::PropertyUpdated(listing(1, "Alpha")));
    stream.send_data("{not json");
    stream.send_data(r#"{"type":"property_updated"}"#);
    stream.send_envelope(&EventEnvelope::PropertyUpdated(listing(2, "Beta")));

    assert_eq!(rx.recv().await.unwrap().property_id(), Some(PropertyId::new(1)));
    assert_eq!(rx.recv().await.unwrap().property_id(), Some(PropertyId::new(2)));
    assert_eq!(h.channel.state(), ConnectionState::Open);
    assert_eq!(h.transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_kinds_and_named_events_are_skipped() {
    let h = harness();
    let stream = h.transport.accept_next();
    let mut rx = collect(&h.channel);

    h.channel.connect();
    wait_for(&h.channel, ConnectionState::Open).await;

    stream.send_data(r#"{"type":"heartbeat"}"#);
    stream.send_raw("event: ping\ndata: {\"type\":\"connection\"}\n\n");
    stream.send_raw(": keep-alive\n\n");
    stream.send_envelope(&EventEnvelope::PropertyDeleted(listing(3, "Gamma")));

    assert_eq!(rx.recv().await.unwrap().kind(), EventKind::PropertyDeleted);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn frames_split_across_chunks() {
    let h = harness();
    let stream = h.transport.accept_next();
    let mut rx = collect(&h.channel);

    h.channel.connect();
    wait_for(&h.channel, ConnectionState::Open).await;

    let payload = EventEnvelope::PropertyCreated(listing(4, "Delta"))
        .encode()
        .unwrap();
    let framed = format!("data: {payload}\r\n\r\n");
    let (head, tail) = framed.as_bytes().split_at(framed.len() / 2);
    stream.send_raw(head.to_vec());
    stream.send_raw(tail.to_vec());

    assert_eq!(rx.recv().await.unwrap().property_id(), Some(PropertyId::new(4)));
}

#[tokio::test(start_paused = true)]
async fn failing_subscriber_keeps_channel_open() {
    let h = harness();
    let stream = h.transport.accept_next();
    h.channel
        .registry()
        .subscribe(|_| Err(anyhow::anyhow!("listener bug")));
    h.channel.registry().subscribe(|_| panic!("listener panic"));
    let mut rx = collect(&h.channel);

    h.channel.connect();
    wait_for(&h.channel, ConnectionState::Open).await;

    stream.send_envelope(&EventEnvelope::PropertyCreated(listing(1, "Alpha")));
    stream.send_envelope(&EventEnvelope::PropertyCreated(listing(2, "Beta")));

    assert!(rx.recv().await.is_some());
    assert!(rx.recv().await.is_some());
    assert_eq!(h.channel.state(), ConnectionState::Open);
}

// ── Backoff ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn consecutive_failures_back_off_then_give_up() {
    let h = harness();

    h.channel.connect();
    wait_for(&h.channel, ConnectionState::GivenUp).await;

    assert_eq!(h.transport.open_count(), 6);
    assert_eq!(
        gaps_ms(&h.transport.open_instants()),
        vec![2000, 4000, 8000, 16000, 30000]
    );
    assert_eq!(h.channel.reconnect_attempts(), 5);

    let errors: Vec<_> = h
        .alerts
        .alerts()
        .into_iter()
        .filter(|a| a.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Lost connection to real-time updates");

    // Given up is terminal: no further attempts.
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.transport.open_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn successful_open_resets_the_counter() {
    let h = harness();
    h.transport.fail_next("refused");
    let stream = h.transport.accept_next();

    h.channel.connect();
    wait_for(&h.channel, ConnectionState::Open).await;
    assert_eq!(h.channel.reconnect_attempts(), 0);

    let dropped_at = Instant::now();
    drop(stream);
    wait_for(&h.channel, ConnectionState::BackingOff).await;
    assert_eq!(h.channel.reconnect_attempts(), 1);

    // Script is empty now, so the retry fails as well.
    wait_for(&h.channel, ConnectionState::GivenUp).await;

    let opens = h.transport.open_instants();
    assert_eq!((opens[1] - opens[0]).as_millis(), 2000);
    assert_eq!((opens[2] - dropped_at).as_millis(), 2000);
    assert_eq!((opens[3] - opens[2]).as_millis(), 4000);
}

#[tokio::test(start_paused = true)]
async fn server_closing_the_stream_triggers_reconnect() {
    let h = harness();
    let first = h.transport.accept_next();
    let second = h.transport.accept_next();
    let mut rx = collect(&h.channel);

    h.channel.connect();
    wait_for(&h.channel, ConnectionState::Open).await;
    first.fail("connection reset");

    wait_for(&h.channel, ConnectionState::BackingOff).await;
    wait_for(&h.channel, ConnectionState::Open).await;
    assert_eq!(h.transport.open_count(), 2);

    second.send_envelope(&EventEnvelope::PropertyCreated(listing(9, "Iota")));
    assert_eq!(rx.recv().await.unwrap().property_id(), Some(PropertyId::new(9)));
}

// ── Disconnect / reconnect ──────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reconnect() {
    let h = harness();
    h.transport.fail_next("refused");
    h.transport.accept_next();

    h.channel.connect();
    wait_for(&h.channel, ConnectionState::BackingOff).await;

    h.channel.disconnect();
    assert_eq!(h.channel.state(), ConnectionState::Idle);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.transport.open_count(), 1);
    assert_eq!(h.channel.state(), ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn disconnect_is_idempotent() {
    let h = harness();
    h.channel.disconnect();
    h.channel.disconnect();
    assert_eq!(h.channel.state(), ConnectionState::Idle);

    let stream = h.transport.accept_next();
    h.channel.connect();
    wait_for(&h.channel, ConnectionState::Open).await;
    h.channel.disconnect();
    h.channel.disconnect();
    assert_eq!(h.channel.state(), ConnectionState::Idle);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!stream.is_attached());
}

#[tokio::test(start_paused = true)]
async fn no_dispatch_after_disconnect() {
    let h = harness();
    let stream = h.transport.accept_next();
    let mut rx = collect(&h.channel);

    h.channel.connect();
    wait_for(&h.channel, ConnectionState::Open).await;
    h.channel.disconnect();

    stream.send_envelope(&EventEnvelope::PropertyCreated(listing(1, "Alpha")));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn subscriber_can_disconnect_during_dispatch() {
    init_tracing();
    let transport = MockTransport::new();
    let stream = transport.accept_next();
    let channel = Arc::new(NotificationChannel::new(
        Arc::new(transport.clone()),
        ReconnectPolicy::default(),
        Arc::new(RecordingAlertSink::new()),
    ));
    let weak = Arc::downgrade(&channel);
    channel.registry().subscribe(move |_| {
        if let Some(channel) = weak.upgrade() {
            channel.disconnect();
        }
        Ok(())
    });
    let mut rx = collect(&channel);

    channel.connect();
    wait_for(&channel, ConnectionState::Open).await;

    // Both frames arrive in one chunk; the first one's dispatch disconnects.
    let first = EventEnvelope::PropertyCreated(listing(1, "Alpha")).encode().unwrap();
    let second = EventEnvelope::PropertyCreated(listing(2, "Beta")).encode().unwrap();
    stream.send_raw(format!("data: {first}\n\ndata: {second}\n\n"));

    assert_eq!(rx.recv().await.unwrap().property_id(), Some(PropertyId::new(1)));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(channel.state(), ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn oversized_event_is_dropped_without_reconnecting() {
    let h = harness();
    let stream = h.transport.accept_next();
    let mut rx = collect(&h.channel);

    h.channel.connect();
    wait_for(&h.channel, ConnectionState::Open).await;

    let mut huge = b"data: ".to_vec();
    huge.resize(MAX_EVENT_SIZE + 16, b'x');
    stream.send_raw(huge);
    stream.send_raw("xxxx\n\n");
    stream.send_envelope(&EventEnvelope::PropertyUpdated(listing(5, "Epsilon")));

    assert_eq!(rx.recv().await.unwrap().property_id(), Some(PropertyId::new(5)));
    assert_eq!(h.channel.state(), ConnectionState::Open);
    assert_eq!(h.transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn connect_while_open_replaces_the_stream() {
    let h = harness();
    let first = h.transport.accept_next();
    let second = h.transport.accept_next();
    let mut rx = collect(&h.channel);

    h.channel.connect();
    wait_for(&h.channel, ConnectionState::Open).await;

    h.channel.connect();
    wait_for(&h.channel, ConnectionState::Open).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.transport.open_count(), 2);
    assert!(!first.is_attached());

    second.send_envelope(&EventEnvelope::PropertyCreated(listing(2, "Beta")));
    assert_eq!(rx.recv().await.unwrap().property_id(), Some(PropertyId::new(2)));
}

#[tokio::test(start_paused = true)]
async fn connect_after_give_up_starts_over() {
    let h = harness();
    h.channel.connect();
    wait_for(&h.channel, ConnectionState::GivenUp).await;
    assert_eq!(h.channel.reconnect_attempts(), 5);

    let _stream = h.transport.accept_next();
    h.channel.connect();
    assert_eq!(h.channel.reconnect_attempts(), 0);
    wait_for(&h.channel, ConnectionState::Open).await;
    assert_eq!(h.transport.open_count(), 7);
}

#[tokio::test(start_paused = true)]
async fn simulate_dispatches_locally() {
    let h = harness();
    let mut rx = collect(&h.channel);

    let report = h
        .channel
        .simulate(&EventEnvelope::PropertyUpdated(listing(5, "Epsilon")));

    assert_eq!(report.delivered, 1);
    assert_eq!(rx.recv().await.unwrap().property_id(), Some(PropertyId::new(5)));
    assert_eq!(h.transport.open_count(), 0);
}
