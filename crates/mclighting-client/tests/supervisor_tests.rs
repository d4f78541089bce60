//! Supervisor Tests
//!
//! Tests cover:
//! - Connect sequence (commit, startup status request)
//! - Status, greeting and mode list frames reaching the bus
//! - Color prefix selection and channel batching
//! - Liveness, close handling and reconnect timing
//! - Shutdown

use async_trait::async_trait;
use mclighting_client::bus::CONNECTION_STATE;
use mclighting_client::{
    ClientError, ConnectionState, Connector, DeviceConfig, LinkEvent, LinkReceiver, LinkSender,
    MemoryBus, Result, StateBus, StateChange, StateDeclaration, StateUpdate, Supervisor,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout, Instant};

// ============================================================================
// Mock link
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Text(String),
    Ping,
    Close,
}

struct MockSender {
    sent: mpsc::UnboundedSender<Sent>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl LinkSender for MockSender {
    async fn send_text(&self, text: &str) -> Result<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(ClientError::ConnectionClosed);
        }
        let _ = self.sent.send(Sent::Text(text.to_string()));
        Ok(())
    }

    async fn ping(&self, _payload: &[u8]) -> Result<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(ClientError::ConnectionClosed);
        }
        let _ = self.sent.send(Sent::Ping);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        let _ = self.sent.send(Sent::Close);
        Ok(())
    }
}

struct MockReceiver {
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

#[async_trait]
impl LinkReceiver for MockReceiver {
    async fn recv(&mut self) -> Option<LinkEvent> {
        self.events.recv().await
    }
}

/// Test side of one accepted connection
struct Peer {
    sent: mpsc::UnboundedReceiver<Sent>,
    events: mpsc::UnboundedSender<LinkEvent>,
    open: Arc<AtomicBool>,
}

impl Peer {
    fn reply(&self, text: &str) {
        self.events
            .send(LinkEvent::Text(text.to_string()))
            .expect("supervisor dropped the link");
    }

    /// Next text command, skipping heartbeats
    async fn next_text(&mut self) -> String {
        loop {
            match self.sent.recv().await {
                Some(Sent::Text(text)) => return text,
                Some(_) => continue,
                None => panic!("link dropped while waiting for a command"),
            }
        }
    }

    /// Wait until the supervisor closes this link
    async fn closed(&mut self) {
        loop {
            match self.sent.recv().await {
                Some(Sent::Close) | None => return,
                Some(_) => continue,
            }
        }
    }
}

struct MockConnector {
    peers: mpsc::UnboundedSender<Peer>,
    attempts: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
    /// Accept the socket but hand out links that are already closed
    dead_on_arrival: Arc<AtomicBool>,
}

#[async_trait]
impl Connector for MockConnector {
    type Sender = MockSender;
    type Receiver = MockReceiver;

    async fn connect(&self, url: &str) -> Result<(MockSender, MockReceiver)> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ClientError::ConnectionFailed(format!("{} refused", url)));
        }

        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(!self.dead_on_arrival.load(Ordering::SeqCst)));

        let _ = self.peers.send(Peer {
            sent: sent_rx,
            events: event_tx,
            open: open.clone(),
        });

        Ok((
            MockSender { sent: sent_tx, open },
            MockReceiver { events: event_rx },
        ))
    }
}

struct Harness {
    peers: mpsc::UnboundedReceiver<Peer>,
    attempts: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
    dead_on_arrival: Arc<AtomicBool>,
}

impl Harness {
    fn new() -> (MockConnector, Harness) {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let attempts = Arc::new(AtomicUsize::new(0));
        let refuse = Arc::new(AtomicBool::new(false));
        let dead_on_arrival = Arc::new(AtomicBool::new(false));

        let connector = MockConnector {
            peers: peers_tx,
            attempts: attempts.clone(),
            refuse: refuse.clone(),
            dead_on_arrival: dead_on_arrival.clone(),
        };
        let harness = Harness {
            peers: peers_rx,
            attempts,
            refuse,
            dead_on_arrival,
        };
        (connector, harness)
    }

    async fn accept(&mut self) -> Peer {
        self.peers.recv().await.expect("connector dropped")
    }
}

/// Bus whose reads can be made to fail
struct FlakyBus {
    inner: MemoryBus,
    fail_reads: AtomicBool,
}

#[async_trait]
impl StateBus for FlakyBus {
    async fn set_state(&self, name: &str, value: Value, ack: bool) -> Result<()> {
        self.inner.set_state(name, value, ack).await
    }

    async fn get_state(&self, name: &str) -> Result<Option<Value>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ClientError::Bus(format!("cannot read {}", name)));
        }
        self.inner.get_state(name).await
    }

    async fn declare_state(&self, declaration: &StateDeclaration) -> Result<()> {
        self.inner.declare_state(declaration).await
    }
}

async fn wait_for(updates: &mut broadcast::Receiver<StateUpdate>, name: &str) -> Value {
    let result = timeout(Duration::from_secs(3), async {
        loop {
            let update = updates.recv().await.expect("bus closed");
            if update.name == name {
                return update.value;
            }
        }
    })
    .await;
    result.unwrap_or_else(|_| panic!("no update for {}", name))
}

const STATIC_STATUS: &str = r#"{"mode":0,"brightness":128,"speed":200,"color":[1,2,3],"ws2812fx_mode":0,"ws2812fx_mode_name":"Static"}"#;
const EFFECT_STATUS: &str = r#"{"mode":1,"brightness":128,"speed":200,"color":[1,2,3],"ws2812fx_mode":12,"ws2812fx_mode_name":"Rainbow"}"#;

// ============================================================================
// Connect sequence
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_sends_commit_then_status_request() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let start = Instant::now();
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus);

    let mut peer = harness.accept().await;
    assert_eq!(peer.next_text().await, "$");
    assert_eq!(device.state(), ConnectionState::Connected);

    assert_eq!(peer.next_text().await, "~");
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(5), "status request after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(6), "status request after {:?}", elapsed);

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_connected_greeting_sets_connection_state() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut updates = bus.subscribe();
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus.clone());

    let peer = harness.accept().await;
    peer.reply("Connected");

    assert_eq!(wait_for(&mut updates, CONNECTION_STATE).await, json!(true));
    assert_eq!(bus.value(CONNECTION_STATE), Some(json!(true)));

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_optional_states_declared_for_rgbw() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let config = DeviceConfig {
        rgbw: true,
        ..DeviceConfig::default()
    };
    let mut device = Supervisor::spawn(config, connector, bus.clone());

    let _peer = harness.accept().await;
    assert!(bus.is_declared("color_RGBW"));
    assert!(bus.is_declared("range_RGBW"));
    assert!(bus.is_declared("color_W"));
    assert!(!bus.is_declared("color_RGB"));

    device.shutdown().await;
}

// ============================================================================
// Inbound frames
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_status_frame_published() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut updates = bus.subscribe();
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus.clone());

    let peer = harness.accept().await;
    peer.reply(STATIC_STATUS);

    assert_eq!(wait_for(&mut updates, "fx_mode_name").await, json!("Static"));
    assert_eq!(bus.value("brightness"), Some(json!(128)));
    assert_eq!(bus.value("speed"), Some(json!(200)));
    assert_eq!(bus.value("color_R"), Some(json!(1)));
    assert_eq!(bus.value("color_B"), Some(json!(3)));
    assert_eq!(bus.value("color_RGB"), Some(json!("010203")));
    assert_eq!(bus.value("color"), Some(json!("1,2,3")));
    assert_eq!(bus.value("fx_mode"), Some(json!(0)));

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_mode_list_published() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut updates = bus.subscribe();
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus);

    let peer = harness.accept().await;
    peer.reply(r#"[{"mode":0,"name":"Static"},{"mode":1,"name":"Blink"}]"#);

    let list = wait_for(&mut updates, "list_modes").await;
    let text = list.as_str().expect("list_modes is a string");
    assert!(text.contains("Blink"));

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_not_fatal() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut updates = bus.subscribe();
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus);

    let peer = harness.accept().await;
    peer.reply("{not json");
    peer.reply("Connected");

    assert_eq!(wait_for(&mut updates, CONNECTION_STATE).await, json!(true));
    assert_eq!(device.state(), ConnectionState::Connected);
    assert_eq!(harness.attempts.load(Ordering::SeqCst), 1);

    device.shutdown().await;
}

// ============================================================================
// Outbound commands
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_color_prefix_follows_snapshot() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut updates = bus.subscribe();
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus);

    let mut peer = harness.accept().await;
    assert_eq!(peer.next_text().await, "$");

    peer.reply(STATIC_STATUS);
    wait_for(&mut updates, "fx_mode_name").await;
    device
        .write(StateChange::new("mclighting.0.color", "1,2,3"))
        .await
        .unwrap();
    assert_eq!(peer.next_text().await, "*010203");
    assert_eq!(peer.next_text().await, "$");

    peer.reply(EFFECT_STATUS);
    wait_for(&mut updates, "fx_mode_name").await;
    device
        .write(StateChange::new("mclighting.0.color", "1,2,3"))
        .await
        .unwrap();
    assert_eq!(peer.next_text().await, "#010203");
    assert_eq!(peer.next_text().await, "$");

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_power_and_brightness_commands() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus);

    let mut peer = harness.accept().await;
    assert_eq!(peer.next_text().await, "$");

    device
        .write(StateChange::new("mclighting.0.power", true))
        .await
        .unwrap();
    assert_eq!(peer.next_text().await, "%255");
    assert_eq!(peer.next_text().await, "$");

    device
        .write(StateChange::new("mclighting.0.brightness", 300))
        .await
        .unwrap();
    assert_eq!(peer.next_text().await, "%255");
    assert_eq!(peer.next_text().await, "$");

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_acknowledged_writes_ignored() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus);

    let mut peer = harness.accept().await;
    assert_eq!(peer.next_text().await, "$");

    let mut echo = StateChange::new("mclighting.0.power", true);
    echo.ack = true;
    device.write(echo).await.unwrap();

    // Nothing until the startup status request
    assert_eq!(peer.next_text().await, "~");

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_channel_edits_coalesced() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus.clone());

    let mut peer = harness.accept().await;
    assert_eq!(peer.next_text().await, "$");

    let start = Instant::now();
    bus.set_state("color_R", json!(10), false).await.unwrap();
    device
        .write(StateChange::new("mclighting.0.color_R", 10))
        .await
        .unwrap();
    bus.set_state("color_G", json!(20), false).await.unwrap();
    device
        .write(StateChange::new("mclighting.0.color_G", 20))
        .await
        .unwrap();

    assert_eq!(peer.next_text().await, "#0a1400");
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(1000), "flushed after {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1500), "flushed after {:?}", elapsed);
    assert_eq!(peer.next_text().await, "$");
    assert_eq!(peer.next_text().await, "~");

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_commit_withheld_while_batch_open() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus.clone());

    let mut peer = harness.accept().await;
    assert_eq!(peer.next_text().await, "$");

    bus.set_state("color_R", json!(10), false).await.unwrap();
    device
        .write(StateChange::new("mclighting.0.color_R", 10))
        .await
        .unwrap();
    device
        .write(StateChange::new("mclighting.0.power", true))
        .await
        .unwrap();

    // The flush commits for the power command as well
    assert_eq!(peer.next_text().await, "%255");
    assert_eq!(peer.next_text().await, "#0a0000");
    assert_eq!(peer.next_text().await, "$");

    // Once the batch is closed, intents commit on their own again
    device
        .write(StateChange::new("mclighting.0.power", false))
        .await
        .unwrap();
    assert_eq!(peer.next_text().await, "%0");
    assert_eq!(peer.next_text().await, "$");

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_rgbw_status_and_batched_color() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut updates = bus.subscribe();
    let config = DeviceConfig {
        rgbw: true,
        ..DeviceConfig::default()
    };
    let mut device = Supervisor::spawn(config, connector, bus.clone());

    let mut peer = harness.accept().await;
    assert_eq!(peer.next_text().await, "$");

    peer.reply(
        r#"{"mode":0,"brightness":10,"color":[40,10,20,30],"ws2812fx_mode":0,"ws2812fx_mode_name":"Static"}"#,
    );
    wait_for(&mut updates, "fx_mode_name").await;
    assert_eq!(bus.value("color_W"), Some(json!(40)));
    assert_eq!(bus.value("color_R"), Some(json!(10)));
    assert_eq!(bus.value("color_G"), Some(json!(20)));
    assert_eq!(bus.value("color_B"), Some(json!(30)));
    assert_eq!(bus.value("color_RGBW"), Some(json!("280a141e")));
    assert_eq!(bus.value("color"), Some(json!("10,20,30,40")));
    assert_eq!(bus.value("color_RGB"), None);

    bus.set_state("color_R", json!(255), false).await.unwrap();
    device
        .write(StateChange::new("mclighting.0.color_R", 255))
        .await
        .unwrap();

    // White goes first on the wire
    assert_eq!(peer.next_text().await, "*28ff141e");
    assert_eq!(peer.next_text().await, "$");

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_read_back_drops_batch() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(FlakyBus {
        inner: MemoryBus::new(),
        fail_reads: AtomicBool::new(true),
    });
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus.clone());

    let mut peer = harness.accept().await;
    assert_eq!(peer.next_text().await, "$");

    device
        .write(StateChange::new("mclighting.0.color_R", 10))
        .await
        .unwrap();

    // The batch is due at 1s but produces no command
    assert_eq!(peer.next_text().await, "~");

    bus.fail_reads.store(false, Ordering::SeqCst);
    bus.set_state("color_B", json!(255), false).await.unwrap();
    device
        .write(StateChange::new("mclighting.0.color_B", 255))
        .await
        .unwrap();
    assert_eq!(peer.next_text().await, "#0000ff");
    assert_eq!(peer.next_text().await, "$");

    device.shutdown().await;
}

// ============================================================================
// Liveness and reconnect
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_silent_link_closed_once_then_reconnected() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut updates = bus.subscribe();
    let start = Instant::now();
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus);

    let mut peer = harness.accept().await;
    peer.closed().await;
    let closed_at = start.elapsed();
    assert!(closed_at >= Duration::from_secs(60), "closed after {:?}", closed_at);
    assert!(closed_at < Duration::from_secs(61), "closed after {:?}", closed_at);

    let _peer = harness.accept().await;
    let reconnected_at = start.elapsed();
    assert!(
        reconnected_at >= Duration::from_secs(70),
        "reconnected after {:?}",
        reconnected_at
    );
    assert_eq!(harness.attempts.load(Ordering::SeqCst), 2);

    let mut disconnects = 0;
    while let Ok(update) = updates.try_recv() {
        if update.name == CONNECTION_STATE && update.value == json!(false) {
            disconnects += 1;
        }
    }
    assert_eq!(disconnects, 1);

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_traffic_keeps_link_alive() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let start = Instant::now();
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus);

    let mut peer = harness.accept().await;
    sleep(Duration::from_secs(30)).await;
    peer.reply("OK");

    peer.closed().await;
    let closed_at = start.elapsed();
    assert!(closed_at >= Duration::from_secs(120), "closed after {:?}", closed_at);

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_remote_close_reconnects_after_delay() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut updates = bus.subscribe();
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus);

    let peer = harness.accept().await;
    let closed = Instant::now();
    peer.events
        .send(LinkEvent::Closed { reason: None })
        .unwrap();

    assert_eq!(wait_for(&mut updates, CONNECTION_STATE).await, json!(false));

    let _peer = harness.accept().await;
    assert!(closed.elapsed() >= Duration::from_secs(10));
    assert_eq!(harness.attempts.load(Ordering::SeqCst), 2);

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_send_on_closed_link_reconnects_immediately() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus.clone());

    let mut peer = harness.accept().await;
    assert_eq!(peer.next_text().await, "$");

    peer.open.store(false, Ordering::SeqCst);
    let failed = Instant::now();
    device
        .write(StateChange::new("mclighting.0.power", false))
        .await
        .unwrap();

    let mut peer = harness.accept().await;
    assert!(failed.elapsed() < Duration::from_secs(1));
    assert_eq!(harness.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(bus.value(CONNECTION_STATE), Some(json!(false)));
    assert_eq!(peer.next_text().await, "$");

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_link_closing_on_arrival_backs_off() {
    let (connector, mut harness) = Harness::new();
    harness.dead_on_arrival.store(true, Ordering::SeqCst);
    let bus = Arc::new(MemoryBus::new());
    let start = Instant::now();
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus);

    // First failure reconnects at once
    let _first = harness.accept().await;
    let _second = harness.accept().await;
    assert!(start.elapsed() < Duration::from_secs(1));

    // Second failure in a row waits for the regular delay
    let _third = harness.accept().await;
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert_eq!(harness.attempts.load(Ordering::SeqCst), 3);

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_explicit_reconnect() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus);

    let mut peer = harness.accept().await;
    device.reconnect().await.unwrap();
    peer.closed().await;

    let _peer = harness.accept().await;
    assert_eq!(harness.attempts.load(Ordering::SeqCst), 2);

    device.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_refused_connect_retried() {
    let (connector, mut harness) = Harness::new();
    harness.refuse.store(true, Ordering::SeqCst);
    let bus = Arc::new(MemoryBus::new());
    let start = Instant::now();
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus.clone());

    sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(device.state(), ConnectionState::Disconnected);
    assert_eq!(bus.value(CONNECTION_STATE), Some(json!(false)));

    harness.refuse.store(false, Ordering::SeqCst);
    let _peer = harness.accept().await;
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert_eq!(harness.attempts.load(Ordering::SeqCst), 2);

    device.shutdown().await;
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_batch() {
    let (connector, mut harness) = Harness::new();
    let bus = Arc::new(MemoryBus::new());
    let mut device = Supervisor::spawn(DeviceConfig::default(), connector, bus);

    let mut peer = harness.accept().await;
    assert_eq!(peer.next_text().await, "$");

    device
        .write(StateChange::new("mclighting.0.color_R", 10))
        .await
        .unwrap();
    device.shutdown().await;
    device.shutdown().await;
    assert_eq!(device.state(), ConnectionState::Disconnected);

    let mut rest = Vec::new();
    while let Some(sent) = peer.sent.recv().await {
        rest.push(sent);
    }
    assert_eq!(rest, vec![Sent::Close]);

    assert!(device
        .write(StateChange::new("mclighting.0.power", true))
        .await
        .is_err());
    assert_eq!(harness.attempts.load(Ordering::SeqCst), 1);
}
