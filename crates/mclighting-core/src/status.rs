//! Inbound frame decoding
//!
//! The controller answers with the plain tokens `OK` / `Connected`, a full
//! status object, or a list of mode descriptors. Status objects are
//! flattened into named values for the state bus.

use serde_json::{Map, Value};

use crate::color::Color;
use crate::command::{integer, DeviceMode};
use crate::error::Result;

pub const TOKEN_OK: &str = "OK";
pub const TOKEN_CONNECTED: &str = "Connected";

const EFFECT_ID: &str = "ws2812fx_mode";
const EFFECT_NAME: &str = "ws2812fx_mode_name";

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `OK` acknowledgement
    Ack,
    /// `Connected` greeting
    Connected,
    /// Full status object
    Status(StatusReport),
    /// Mode descriptor list
    ModeList(ModeList),
    /// Valid JSON of no known shape
    Unrecognized,
}

/// Most recent full status frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    fields: Map<String, Value>,
}

impl StatusSnapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn mode(&self) -> Option<i64> {
        self.fields.get("mode").and_then(integer)
    }

    pub fn brightness(&self) -> Option<i64> {
        self.fields.get("brightness").and_then(integer)
    }

    pub fn effect_id(&self) -> Option<i64> {
        self.fields.get(EFFECT_ID).and_then(integer)
    }

    pub fn effect_name(&self) -> Option<&str> {
        self.fields.get(EFFECT_NAME).and_then(Value::as_str)
    }

    /// Mode used to pick the color prefix: the effect id when reported,
    /// otherwise the top-level mode.
    pub fn device_mode(&self) -> DeviceMode {
        self.effect_id()
            .or_else(|| self.mode())
            .map(DeviceMode::from_id)
            .unwrap_or_default()
    }
}

/// A full status frame plus its flattened values
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub snapshot: StatusSnapshot,
    pub values: Vec<(String, Value)>,
}

/// Mode descriptors and their serialized form
#[derive(Debug, Clone, PartialEq)]
pub struct ModeList {
    pub modes: Vec<Value>,
    pub raw: String,
}

/// Decode one inbound text frame.
///
/// Plain tokens are recognized before any JSON decoding is attempted.
pub fn parse_frame(text: &str, rgbw: bool) -> Result<Frame> {
    match text {
        TOKEN_OK => return Ok(Frame::Ack),
        TOKEN_CONNECTED => return Ok(Frame::Connected),
        _ => {}
    }

    let frame = match serde_json::from_str::<Value>(text)? {
        Value::Object(fields) if is_full_status(&fields) => {
            let values = project_status(&fields, rgbw);
            Frame::Status(StatusReport {
                snapshot: StatusSnapshot { fields },
                values,
            })
        }
        Value::Array(modes) if matches!(modes.first(), Some(Value::Object(_))) => {
            let raw = serde_json::to_string(&modes)?;
            Frame::ModeList(ModeList { modes, raw })
        }
        _ => Frame::Unrecognized,
    };

    Ok(frame)
}

fn is_full_status(fields: &Map<String, Value>) -> bool {
    let present = |key: &str| fields.get(key).is_some_and(|v| !v.is_null());
    present("mode") && present("brightness")
}

fn project_status(fields: &Map<String, Value>, rgbw: bool) -> Vec<(String, Value)> {
    let mut values = Vec::with_capacity(fields.len() + 6);

    for (key, value) in fields {
        if key == "color" {
            if let Value::Array(components) = value {
                project_color(components, rgbw, &mut values);
            }
            continue;
        }

        values.push((key.clone(), value.clone()));
        match key.as_str() {
            EFFECT_ID => values.push(("fx_mode".to_string(), value.clone())),
            EFFECT_NAME => values.push(("fx_mode_name".to_string(), value.clone())),
            _ => {}
        }
    }

    values
}

/// RGB devices report `[r, g, b]`; RGBW devices report `[w, r, g, b]`.
fn project_color(components: &[Value], rgbw: bool, out: &mut Vec<(String, Value)>) {
    let bytes: Option<Vec<u8>> = components
        .iter()
        .map(|c| c.as_u64().map(|v| v.min(255) as u8))
        .collect();
    let Some(bytes) = bytes else {
        return;
    };

    let color = match bytes.as_slice() {
        [w, r, g, b, ..] if rgbw => Color::rgbw(*r, *g, *b, *w),
        [r, g, b, ..] => Color::rgb(*r, *g, *b),
        _ => return,
    };

    out.push(("color_R".to_string(), Value::from(color.r)));
    out.push(("color_G".to_string(), Value::from(color.g)));
    out.push(("color_B".to_string(), Value::from(color.b)));
    match color.w {
        Some(w) => {
            out.push(("color_W".to_string(), Value::from(w)));
            out.push(("color_RGBW".to_string(), Value::from(color.to_wire_hex())));
        }
        None if !rgbw => {
            out.push(("color_RGB".to_string(), Value::from(color.to_wire_hex())));
        }
        None => {}
    }
    out.push(("color".to_string(), Value::from(color.to_csv())));
}
