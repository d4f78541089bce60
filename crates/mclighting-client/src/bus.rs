//! State bus boundary
//!
//! The home-automation side is reached only through [`StateBus`]. Writes
//! coming from it are delivered to the supervisor as [`StateChange`]s.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Name of the connectivity indicator
pub const CONNECTION_STATE: &str = "info.connection";

/// A write event delivered by the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// Fully qualified state id, e.g. `mclighting.0.brightness`
    pub id: String,
    pub value: Value,
    /// Already acknowledged writes are echoes, not intents
    #[serde(default)]
    pub ack: bool,
}

impl StateChange {
    /// An unacknowledged write
    pub fn new(id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            ack: false,
        }
    }

    /// Last segment of the dotted id
    pub fn command(&self) -> &str {
        self.id.rsplit('.').next().unwrap_or(&self.id)
    }
}

/// Value type of a declared state
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StateKind {
    String,
    Number { min: i64, max: i64 },
}

/// Declaration of an optional state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: StateKind,
}

/// An outbound state write, as observed on [`MemoryBus`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateUpdate {
    pub name: String,
    pub value: Value,
    pub ack: bool,
}

/// Host state bus
#[async_trait]
pub trait StateBus: Send + Sync {
    /// Write a named value
    async fn set_state(&self, name: &str, value: Value, ack: bool) -> Result<()>;

    /// Read back the last value of a named state
    async fn get_state(&self, name: &str) -> Result<Option<Value>>;

    /// Declare a state; a no-op when it already exists
    async fn declare_state(&self, declaration: &StateDeclaration) -> Result<()>;
}

/// States whose names depend on the RGBW setting
pub fn optional_states(rgbw: bool) -> Vec<StateDeclaration> {
    let string = |name_rgb: &'static str, name_rgbw: &'static str, description: &'static str| {
        StateDeclaration {
            name: if rgbw { name_rgbw } else { name_rgb },
            description,
            kind: StateKind::String,
        }
    };

    let mut states = vec![
        string("color_RGB", "color_RGBW", "Set default color of the lamp"),
        string(
            "set_all_RGB",
            "set_all_RGBW",
            "Set default color of the lamp and light all LEDs in that color",
        ),
        string("single_RGB", "single_RGBW", "Light single LEDs in the given color"),
        string("array_RGB", "array_RGBW", "Light multiple LEDs in the given colors"),
        string(
            "range_RGB",
            "range_RGBW",
            "Light multiple LED ranges in the given colors",
        ),
    ];

    if rgbw {
        states.push(StateDeclaration {
            name: "color_W",
            description: "Set default White of the lamp",
            kind: StateKind::Number { min: 0, max: 255 },
        });
    }

    states
}

/// Declare every optional state. Failures are logged and skipped.
pub async fn declare_optional_states<B: StateBus + ?Sized>(bus: &B, rgbw: bool) {
    for declaration in optional_states(rgbw) {
        if let Err(e) = bus.declare_state(&declaration).await {
            warn!("Cannot declare state {}: {}", declaration.name, e);
        }
    }
}

/// In-process state bus
pub struct MemoryBus {
    values: DashMap<String, Value>,
    declarations: DashMap<String, StateDeclaration>,
    updates: broadcast::Sender<StateUpdate>,
}

impl MemoryBus {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(256);
        Self {
            values: DashMap::new(),
            declarations: DashMap::new(),
            updates,
        }
    }

    /// Feed of every write made through this bus
    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdate> {
        self.updates.subscribe()
    }

    /// Current value of a state
    pub fn value(&self, name: &str) -> Option<Value> {
        self.values.get(name).map(|v| v.clone())
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declarations.contains_key(name)
    }

    pub fn declarations(&self) -> Vec<StateDeclaration> {
        self.declarations.iter().map(|d| d.value().clone()).collect()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateBus for MemoryBus {
    async fn set_state(&self, name: &str, value: Value, ack: bool) -> Result<()> {
        if name.is_empty() {
            return Err(ClientError::Bus("empty state name".to_string()));
        }

        debug!("set state name: {} val: {}", name, value);
        self.values.insert(name.to_string(), value.clone());
        // No subscribers is fine
        let _ = self.updates.send(StateUpdate {
            name: name.to_string(),
            value,
            ack,
        });
        Ok(())
    }

    async fn get_state(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.value(name))
    }

    async fn declare_state(&self, declaration: &StateDeclaration) -> Result<()> {
        self.declarations
            .entry(declaration.name.to_string())
            .or_insert_with(|| declaration.clone());
        Ok(())
    }
}
