//! Pending-write coalescer
//!
//! A color picker on the bus writes `color_R`, `color_G`, `color_B` (and
//! `color_W`) as separate states in quick succession. The first of them
//! opens a batch; when the window expires the supervisor reads all
//! components back and sends a single color command.

use mclighting_core::{Color, ColorChannel};
use serde_json::Value;
use std::future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, Sleep};

use crate::bus::StateBus;
use crate::error::Result;

pub struct Coalescer {
    window: Duration,
    flush: Option<Pin<Box<Sleep>>>,
}

impl Coalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            flush: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.flush.is_some()
    }

    /// Register a single channel edit. Returns `true` when this edit opened
    /// a new batch, `false` when it joined the pending one.
    pub fn open(&mut self) -> bool {
        if self.is_open() {
            return false;
        }
        self.flush = Some(Box::pin(sleep(self.window)));
        true
    }

    /// Resolves when the pending batch is due, closing it. Pending forever
    /// while no batch is open.
    pub async fn expired(&mut self) {
        if let Some(flush) = self.flush.as_mut() {
            flush.as_mut().await;
        } else {
            future::pending::<()>().await;
        }
        self.flush = None;
    }

    /// Drop the pending batch without flushing
    pub fn cancel(&mut self) {
        self.flush = None;
    }
}

/// Read the current color back from the bus. Missing states count as 0;
/// any failed read aborts the whole color.
pub async fn read_back_color<B: StateBus + ?Sized>(bus: &B, rgbw: bool) -> Result<Color> {
    let r = read_component(bus, ColorChannel::Red).await?;
    let g = read_component(bus, ColorChannel::Green).await?;
    let b = read_component(bus, ColorChannel::Blue).await?;
    let w = if rgbw {
        Some(read_component(bus, ColorChannel::White).await?)
    } else {
        None
    };

    Ok(Color { r, g, b, w })
}

async fn read_component<B: StateBus + ?Sized>(bus: &B, channel: ColorChannel) -> Result<u8> {
    let value = bus.get_state(channel.state_name()).await?;
    Ok(value.as_ref().and_then(component).unwrap_or(0))
}

fn component(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(n.clamp(0.0, 255.0) as u8)
}
