//! Device link
//!
//! The supervisor talks to the controller through a [`Connector`] that
//! yields a sender/receiver pair. [`WebSocketConnector`] is the real one.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tracing::{debug, error, info};

use crate::error::{ClientError, Result};

/// Events coming up from the link
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Text frame from the controller
    Text(String),
    /// Reply to a heartbeat ping
    Pong(Vec<u8>),
    /// Link is gone (either side closed or the socket failed)
    Closed { reason: Option<String> },
    /// Socket level error; a `Closed` event follows when fatal
    Error(String),
}

/// Outbound half of a link
#[async_trait]
pub trait LinkSender: Send + Sync {
    /// Send one protocol command. Fails with [`ClientError::ConnectionClosed`]
    /// once the link is closed.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Send a heartbeat ping
    async fn ping(&self, payload: &[u8]) -> Result<()>;

    /// Start closing the link
    async fn close(&self) -> Result<()>;
}

/// Inbound half of a link
#[async_trait]
pub trait LinkReceiver: Send + Sync {
    /// Next event, or `None` once the link is torn down
    async fn recv(&mut self) -> Option<LinkEvent>;
}

/// Opens links to the controller
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Sender: LinkSender + 'static;
    type Receiver: LinkReceiver + 'static;

    async fn connect(&self, url: &str) -> Result<(Self::Sender, Self::Receiver)>;
}

/// WebSocket link sender
pub struct WebSocketSender {
    tx: mpsc::Sender<WsMessage>,
    connected: Arc<Mutex<bool>>,
}

impl WebSocketSender {
    async fn push(&self, msg: WsMessage) -> Result<()> {
        if !*self.connected.lock() {
            return Err(ClientError::ConnectionClosed);
        }

        self.tx
            .send(msg)
            .await
            .map_err(|_| ClientError::ConnectionClosed)
    }
}

#[async_trait]
impl LinkSender for WebSocketSender {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.push(WsMessage::Text(text.to_string())).await
    }

    async fn ping(&self, payload: &[u8]) -> Result<()> {
        self.push(WsMessage::Ping(payload.to_vec())).await
    }

    async fn close(&self) -> Result<()> {
        let _ = self.tx.send(WsMessage::Close(None)).await;
        *self.connected.lock() = false;
        Ok(())
    }
}

/// WebSocket link receiver. Dropping it stops the reader task.
pub struct WebSocketReceiver {
    rx: mpsc::Receiver<LinkEvent>,
    reader: JoinHandle<()>,
}

#[async_trait]
impl LinkReceiver for WebSocketReceiver {
    async fn recv(&mut self) -> Option<LinkEvent> {
        self.rx.recv().await
    }
}

impl Drop for WebSocketReceiver {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Connects over `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn connect(&self, url: &str) -> Result<(Self::Sender, Self::Receiver)> {
        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;

        debug!("WebSocket connected, response: {:?}", response.status());

        let (write, read) = ws_stream.split();

        let (send_tx, mut send_rx) = mpsc::channel::<WsMessage>(100);
        let (event_tx, event_rx) = mpsc::channel::<LinkEvent>(100);

        let connected = Arc::new(Mutex::new(true));
        let connected_write = connected.clone();
        let connected_read = connected.clone();

        // Writer task
        tokio::spawn(async move {
            let mut write = write;
            while let Some(msg) = send_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    error!("WebSocket write error: {}", e);
                    break;
                }
            }
            *connected_write.lock() = false;
        });

        // Reader task
        let reader = tokio::spawn(async move {
            let mut read = read;
            let mut reason = None;

            while let Some(result) = read.next().await {
                match result {
                    Ok(WsMessage::Text(text)) => {
                        let _ = event_tx.send(LinkEvent::Text(text)).await;
                    }
                    Ok(WsMessage::Binary(data)) => match String::from_utf8(data) {
                        Ok(text) => {
                            let _ = event_tx.send(LinkEvent::Text(text)).await;
                        }
                        Err(_) => debug!("Dropping non-UTF-8 binary frame"),
                    },
                    Ok(WsMessage::Pong(data)) => {
                        let _ = event_tx.send(LinkEvent::Pong(data)).await;
                    }
                    Ok(WsMessage::Ping(_)) => {
                        // tungstenite answers pings itself
                    }
                    Ok(WsMessage::Close(frame)) => {
                        reason = frame.map(|f| f.reason.to_string());
                        info!("WebSocket closed: {:?}", reason);
                        break;
                    }
                    Ok(WsMessage::Frame(_)) => {}
                    Err(e) => {
                        let _ = event_tx.send(LinkEvent::Error(e.to_string())).await;
                        reason = Some(e.to_string());
                        break;
                    }
                }
            }

            *connected_read.lock() = false;
            let _ = event_tx.send(LinkEvent::Closed { reason }).await;
        });

        let sender = WebSocketSender {
            tx: send_tx,
            connected,
        };
        let receiver = WebSocketReceiver {
            rx: event_rx,
            reader,
        };

        Ok((sender, receiver))
    }
}
