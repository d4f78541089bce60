//! Device connection configuration

use mclighting_core::{DEFAULT_HOST, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for one controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Controller host name or address
    #[serde(default = "default_host")]
    pub host: String,
    /// Controller WebSocket port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Controller drives RGBW strips
    #[serde(default)]
    pub rgbw: bool,
    /// Heartbeat ping interval in seconds (0 to disable)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u32,
    /// Liveness check interval in seconds (0 to disable)
    #[serde(default = "default_liveness_interval")]
    pub liveness_interval_secs: u32,
    /// Delay before reconnecting after a close
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u32,
    /// Delay before requesting a full status after connecting
    #[serde(default = "default_startup_refresh")]
    pub startup_refresh_secs: u32,
    /// Window in which single color channel edits are merged
    #[serde(default = "default_batch_window")]
    pub batch_window_ms: u64,
    /// Upper bound for one connection attempt
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u32,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_ping_interval() -> u32 {
    10
}

fn default_liveness_interval() -> u32 {
    60
}

fn default_reconnect_delay() -> u32 {
    10
}

fn default_startup_refresh() -> u32 {
    5
}

fn default_batch_window() -> u64 {
    1000
}

fn default_connect_timeout() -> u32 {
    10
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            rgbw: false,
            ping_interval_secs: default_ping_interval(),
            liveness_interval_secs: default_liveness_interval(),
            reconnect_delay_secs: default_reconnect_delay(),
            startup_refresh_secs: default_startup_refresh(),
            batch_window_ms: default_batch_window(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl DeviceConfig {
    /// WebSocket URL of the controller. An empty host or a zero port fall
    /// back to the defaults.
    pub fn url(&self) -> String {
        let host = if self.host.trim().is_empty() {
            DEFAULT_HOST
        } else {
            self.host.trim()
        };
        let port = if self.port == 0 { DEFAULT_PORT } else { self.port };
        format!("ws://{}:{}", host, port)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs as u64)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_interval_secs as u64)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs as u64)
    }

    pub fn startup_refresh(&self) -> Duration {
        Duration::from_secs(self.startup_refresh_secs as u64)
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs as u64)
    }
}
