//! Connection supervisor
//!
//! Owns the device link, the status snapshot and every timer around them
//! (ping, liveness, startup status request, reconnect, batch flush). All of
//! it runs on one task; callers interact through a [`DeviceHandle`].
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Closing -> Disconnected
//!       ^              |                                    |
//!       +-- failure ---+------ reconnect after delay -------+
//! ```

use mclighting_core::{
    parse_frame, CommandEncoder, DeviceMode, Frame, Intent, ModeList, StatusSnapshot, COMMIT,
    STATUS_REQUEST,
};
use serde_json::Value;
use std::future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, error, info, warn};

use crate::bus::{declare_optional_states, StateBus, StateChange, CONNECTION_STATE};
use crate::coalescer::{read_back_color, Coalescer};
use crate::config::DeviceConfig;
use crate::error::{ClientError, Result};
use crate::transport::{Connector, LinkEvent, LinkReceiver, LinkSender};

const PING_PAYLOAD: &[u8] = b"ping";

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

enum Control {
    Write(StateChange),
    Reconnect,
    Shutdown,
}

/// Handle to a running supervisor
pub struct DeviceHandle {
    control_tx: mpsc::Sender<Control>,
    state_rx: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<()>>,
}

impl DeviceHandle {
    /// Deliver a state write from the bus
    pub async fn write(&self, change: StateChange) -> Result<()> {
        self.control(Control::Write(change)).await
    }

    /// Drop the current link and connect again without waiting
    pub async fn reconnect(&self) -> Result<()> {
        self.control(Control::Reconnect).await
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch connection state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Cancel all timers, close the link and wait for the supervisor to
    /// stop. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        let _ = self.control_tx.send(Control::Shutdown).await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Supervisor task failed: {}", e);
            }
        }
    }

    async fn control(&self, control: Control) -> Result<()> {
        self.control_tx
            .send(control)
            .await
            .map_err(|_| ClientError::Other("supervisor stopped".to_string()))
    }
}

struct Link<C: Connector> {
    sender: C::Sender,
    receiver: C::Receiver,
}

#[derive(Default)]
struct Timers {
    ping: Option<Interval>,
    liveness: Option<Interval>,
    startup_refresh: Option<Pin<Box<Sleep>>>,
    reconnect: Option<Pin<Box<Sleep>>>,
}

impl Timers {
    fn cancel_link_timers(&mut self) {
        self.ping = None;
        self.liveness = None;
        self.startup_refresh = None;
    }

    fn cancel_all(&mut self) {
        self.cancel_link_timers();
        self.reconnect = None;
    }
}

fn repeating(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending::<()>().await,
    }
}

async fn expire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer.as_mut() {
        Some(deadline) => deadline.as_mut().await,
        None => future::pending::<()>().await,
    }
    *timer = None;
}

async fn next_event<C: Connector>(link: &mut Option<Link<C>>) -> Option<LinkEvent> {
    match link {
        Some(link) => link.receiver.recv().await,
        None => future::pending().await,
    }
}

/// The device protocol client
pub struct Supervisor<C: Connector, B: StateBus> {
    config: DeviceConfig,
    connector: C,
    bus: Arc<B>,
    encoder: CommandEncoder,
    link: Option<Link<C>>,
    alive: bool,
    /// Set by an immediate reconnect; cleared once the device talks again
    reconnected_now: bool,
    snapshot: Option<StatusSnapshot>,
    mode_list: Option<ModeList>,
    timers: Timers,
    coalescer: Coalescer,
    control_rx: mpsc::Receiver<Control>,
    state_tx: watch::Sender<ConnectionState>,
}

impl<C: Connector, B: StateBus + 'static> Supervisor<C, B> {
    /// Start supervising the device described by `config`
    pub fn spawn(config: DeviceConfig, connector: C, bus: Arc<B>) -> DeviceHandle {
        let (control_tx, control_rx) = mpsc::channel(100);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let supervisor = Self {
            encoder: CommandEncoder::new(config.rgbw),
            coalescer: Coalescer::new(config.batch_window()),
            config,
            connector,
            bus,
            link: None,
            alive: false,
            reconnected_now: false,
            snapshot: None,
            mode_list: None,
            timers: Timers::default(),
            control_rx,
            state_tx,
        };

        let task = tokio::spawn(supervisor.run());

        DeviceHandle {
            control_tx,
            state_rx,
            task: Some(task),
        }
    }

    async fn run(mut self) {
        declare_optional_states(self.bus.as_ref(), self.encoder.rgbw()).await;
        self.connect().await;

        loop {
            tokio::select! {
                control = self.control_rx.recv() => match control {
                    Some(Control::Write(change)) => self.handle_write(change).await,
                    Some(Control::Reconnect) => self.reconnect_now("reconnect requested").await,
                    Some(Control::Shutdown) | None => break,
                },
                event = next_event(&mut self.link) => self.handle_event(event).await,
                _ = tick(&mut self.timers.ping) => self.ping().await,
                _ = tick(&mut self.timers.liveness) => self.check_liveness().await,
                _ = expire(&mut self.timers.startup_refresh) => self.send(STATUS_REQUEST).await,
                _ = expire(&mut self.timers.reconnect) => self.connect().await,
                _ = self.coalescer.expired() => self.flush_batch().await,
            }
        }

        self.shutdown().await;
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!("Connection state {:?} -> {:?}", previous, state);
        }
    }

    fn device_mode(&self) -> DeviceMode {
        self.snapshot
            .as_ref()
            .map(StatusSnapshot::device_mode)
            .unwrap_or_default()
    }

    async fn connect(&mut self) {
        self.timers.reconnect = None;
        if let Some(link) = self.link.take() {
            self.timers.cancel_link_timers();
            let _ = link.sender.close().await;
        }

        self.set_state(ConnectionState::Connecting);
        let url = self.config.url();
        info!(
            "McLighting connect to: {}{}",
            url,
            if self.encoder.rgbw() { " with RGBW" } else { "" }
        );

        match timeout(self.config.connect_timeout(), self.connector.connect(&url)).await {
            Ok(Ok((sender, receiver))) => {
                self.link = Some(Link { sender, receiver });
                self.on_open(&url).await;
            }
            Ok(Err(e)) => self.on_connect_failed(e).await,
            Err(_) => self.on_connect_failed(ClientError::Timeout).await,
        }
    }

    async fn on_open(&mut self, url: &str) {
        info!("{} McLighting connected", url);
        self.set_state(ConnectionState::Connected);
        self.alive = false;

        self.timers.startup_refresh = Some(Box::pin(sleep(self.config.startup_refresh())));
        self.timers.ping = repeating(self.config.ping_interval());
        self.timers.liveness = repeating(self.config.liveness_interval());

        self.send(COMMIT).await;
    }

    async fn on_connect_failed(&mut self, e: ClientError) {
        warn!("McLighting connection failed: {}", e);
        self.publish_connection(false).await;
        self.set_state(ConnectionState::Disconnected);
        self.schedule_reconnect(self.config.reconnect_delay());
    }

    fn schedule_reconnect(&mut self, delay: Duration) {
        if !delay.is_zero() {
            info!("McLighting reconnect after {} seconds", delay.as_secs());
        }
        self.timers.reconnect = Some(Box::pin(sleep(delay)));
    }

    /// Close the link ourselves and go through the regular close path
    async fn close_link(&mut self, reason: &str) {
        let Some(link) = self.link.take() else {
            return;
        };
        self.set_state(ConnectionState::Closing);
        if let Err(e) = link.sender.close().await {
            debug!("Error closing link: {}", e);
        }
        drop(link);
        self.handle_close(Some(reason.to_string())).await;
    }

    async fn handle_close(&mut self, reason: Option<String>) {
        self.link = None;
        self.timers.cancel_link_timers();
        info!("McLighting connection closed: {}", reason.as_deref().unwrap_or("no reason"));
        self.publish_connection(false).await;
        self.set_state(ConnectionState::Disconnected);
        self.schedule_reconnect(self.config.reconnect_delay());
    }

    async fn reconnect_now(&mut self, reason: &str) {
        info!("McLighting reconnecting: {}", reason);
        if let Some(link) = self.link.take() {
            let _ = link.sender.close().await;
        }
        self.timers.cancel_link_timers();
        self.publish_connection(false).await;
        self.set_state(ConnectionState::Disconnected);

        // Only one immediate attempt until the device answers again
        let delay = if self.reconnected_now {
            self.config.reconnect_delay()
        } else {
            Duration::ZERO
        };
        self.reconnected_now = true;
        self.schedule_reconnect(delay);
    }

    async fn shutdown(&mut self) {
        debug!("Cleaning up McLighting connection");
        self.timers.cancel_all();
        self.coalescer.cancel();
        if let Some(link) = self.link.take() {
            let _ = link.sender.close().await;
        }
        self.set_state(ConnectionState::Disconnected);
    }

    async fn ping(&mut self) {
        if let Some(link) = self.link.as_ref() {
            if let Err(e) = link.sender.ping(PING_PAYLOAD).await {
                debug!("Ping failed: {}", e);
            }
        }
    }

    async fn check_liveness(&mut self) {
        if self.alive {
            self.alive = false;
            return;
        }
        warn!("No response from McLighting since last check, closing connection");
        self.close_link("liveness timeout").await;
    }

    async fn send(&mut self, data: &str) {
        let Some(link) = self.link.as_ref() else {
            debug!("Not connected, dropping command {{{}}}", data);
            return;
        };

        let result = link.sender.send_text(data).await;
        match result {
            Ok(()) => debug!("Send command: {{{}}}", data),
            Err(ClientError::ConnectionClosed) => {
                error!("Send command: {{{}}}, ERROR - connection closed", data);
                self.reconnect_now("send on closed connection").await;
            }
            Err(e) => error!("Send command: {{{}}}, ERROR - {}", data, e),
        }
    }

    async fn handle_event(&mut self, event: Option<LinkEvent>) {
        match event {
            Some(LinkEvent::Text(text)) => {
                self.alive = true;
                self.reconnected_now = false;
                self.handle_frame(&text).await;
            }
            Some(LinkEvent::Pong(payload)) => {
                self.alive = true;
                self.reconnected_now = false;
                debug!("Received pong: {}", String::from_utf8_lossy(&payload));
            }
            Some(LinkEvent::Error(e)) => debug!("Error WS - {}", e),
            Some(LinkEvent::Closed { reason }) => self.handle_close(reason).await,
            None => self.handle_close(None).await,
        }
    }

    async fn handle_frame(&mut self, text: &str) {
        debug!("Response message - {}", text);

        match parse_frame(text, self.encoder.rgbw()) {
            Ok(Frame::Ack) => {}
            Ok(Frame::Connected) => self.publish_connection(true).await,
            Ok(Frame::Status(report)) => {
                self.snapshot = Some(report.snapshot);
                for (name, value) in report.values {
                    self.publish(&name, value).await;
                }
            }
            Ok(Frame::ModeList(list)) => {
                self.publish("list_modes", Value::String(list.raw.clone())).await;
                let count = list.modes.len();
                if let Some(previous) = self.mode_list.replace(list) {
                    debug!("Mode list updated: {} -> {} modes", previous.modes.len(), count);
                }
            }
            Ok(Frame::Unrecognized) => debug!("Ignoring unrecognized frame"),
            Err(e) => debug!("Error parse - {}", e),
        }
    }

    async fn handle_write(&mut self, change: StateChange) {
        if change.ack {
            return;
        }
        debug!(
            "state {} changed: {} (ack = {})",
            change.id, change.value, change.ack
        );

        let Some(intent) = Intent::from_state(change.command(), &change.value, self.encoder.rgbw())
        else {
            debug!("No command for state {}", change.id);
            return;
        };

        if intent.is_deferred() {
            if self.coalescer.open() {
                debug!("Collecting color channel edits");
            }
            return;
        }

        match self.encoder.encode(&intent, self.device_mode()) {
            Ok(commands) => {
                for command in &commands {
                    self.send(command).await;
                }
                // The batch flush commits for everything sent while it is open
                if !self.coalescer.is_open() {
                    self.send(COMMIT).await;
                }
            }
            Err(e) => warn!("Cannot encode {}: {}", change.id, e),
        }
    }

    async fn flush_batch(&mut self) {
        match read_back_color(self.bus.as_ref(), self.encoder.rgbw()).await {
            Ok(color) => {
                let command = self.encoder.color(&color, self.device_mode());
                self.send(&command).await;
                self.send(COMMIT).await;
            }
            Err(e) => warn!("Color read-back failed, skipping batched color: {}", e),
        }
    }

    async fn publish(&self, name: &str, value: Value) {
        debug!("set state name: {} val: {}", name, value);
        if let Err(e) = self.bus.get_state(name).await {
            warn!("Send this data to developers {}: {}", name, e);
            return;
        }
        if let Err(e) = self.bus.set_state(name, value, true).await {
            warn!("Cannot set state {}: {}", name, e);
        }
    }

    async fn publish_connection(&self, connected: bool) {
        if let Err(e) = self
            .bus
            .set_state(CONNECTION_STATE, Value::Bool(connected), true)
            .await
        {
            warn!("Cannot set {}: {}", CONNECTION_STATE, e);
        }
    }
}
