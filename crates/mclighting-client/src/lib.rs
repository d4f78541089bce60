//! McLighting Client
//!
//! Keeps one WebSocket connection to a McLighting controller alive and
//! bridges it to a home-automation state bus.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mclighting_client::{DeviceConfig, MemoryBus, StateChange, Supervisor, WebSocketConnector};
//!
//! #[tokio::main]
//! async fn main() -> mclighting_client::Result<()> {
//!     let bus = Arc::new(MemoryBus::new());
//!     let mut device = Supervisor::spawn(DeviceConfig::default(), WebSocketConnector, bus);
//!
//!     device.write(StateChange::new("mclighting.0.brightness", 128)).await?;
//!     device.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod coalescer;
pub mod config;
pub mod error;
pub mod supervisor;
pub mod transport;

pub use bus::{MemoryBus, StateBus, StateChange, StateDeclaration, StateKind, StateUpdate};
pub use config::DeviceConfig;
pub use error::{ClientError, Result};
pub use supervisor::{ConnectionState, DeviceHandle, Supervisor};
pub use transport::{Connector, LinkEvent, LinkReceiver, LinkSender, WebSocketConnector};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::bus::{MemoryBus, StateBus, StateChange};
    pub use crate::config::DeviceConfig;
    pub use crate::error::{ClientError, Result};
    pub use crate::supervisor::{ConnectionState, DeviceHandle, Supervisor};
    pub use crate::transport::WebSocketConnector;
    pub use mclighting_core::{Color, DeviceMode, Intent};
}
