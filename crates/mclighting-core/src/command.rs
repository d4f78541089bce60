//! Command encoding
//!
//! Lighting intents arrive from the state bus as a state name plus a JSON
//! value. [`Intent::from_state`] selects the typed intent once at that
//! boundary; [`CommandEncoder`] turns it into wire strings.

use serde_json::Value;

use crate::color::{reorder_white_first, ChunkLayout, Color};
use crate::error::Result;

const POWER: char = '%';
const BRIGHTNESS: char = '%';
const MODE: char = '=';
const FX_MODE: char = '/';
const SPEED: char = '?';
const STATIC_COLOR: char = '*';
const EFFECT_COLOR: char = '#';
const SINGLE_PIXEL: char = '!';
const ARRAY_DELIMITER: char = '+';
const RANGE_DELIMITER: char = 'R';

/// Operating mode reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceMode {
    /// Fixed color (mode 0)
    Static,
    /// Animation running
    Effect(i64),
    /// No status frame received yet
    #[default]
    Unknown,
}

impl DeviceMode {
    pub fn from_id(id: i64) -> Self {
        if id == 0 {
            DeviceMode::Static
        } else {
            DeviceMode::Effect(id)
        }
    }

    /// Prefix for plain color writes in this mode
    pub fn color_prefix(self) -> char {
        match self {
            DeviceMode::Static => STATIC_COLOR,
            _ => EFFECT_COLOR,
        }
    }
}

/// One component written on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChannel {
    Red,
    Green,
    Blue,
    White,
}

impl ColorChannel {
    pub fn state_name(self) -> &'static str {
        match self {
            ColorChannel::Red => "color_R",
            ColorChannel::Green => "color_G",
            ColorChannel::Blue => "color_B",
            ColorChannel::White => "color_W",
        }
    }
}

/// A high-level lighting request.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Power(bool),
    Mode(i64),
    FxMode(i64),
    Speed(i64),
    Brightness(i64),
    /// `r,g,b[,w]` decimal text
    Color(String),
    /// Deferred to the write coalescer
    Channel(ColorChannel),
    /// Hex color for the default color
    ColorHex(String),
    /// Hex color applied to every pixel
    SetAll(String),
    /// Pixel index plus hex color
    SinglePixel(String),
    /// `+`-delimited pixel list, or a bracketed/CSV list
    PixelArray(String),
    /// `R`-delimited range list, or a bracketed/CSV list
    PixelRange(String),
}

impl Intent {
    /// Select the intent for a write to state `command`.
    ///
    /// The hex-carrying states are named `*_RGBW` on RGBW devices and
    /// `*_RGB` otherwise; the other variant is not an intent.
    pub fn from_state(command: &str, value: &Value, rgbw: bool) -> Option<Self> {
        let suffix = if rgbw { "RGBW" } else { "RGB" };

        let intent = match command {
            "power" => Intent::Power(truthy(value)),
            "mode" => Intent::Mode(integer(value)?),
            "fx_mode" => Intent::FxMode(integer(value)?),
            "speed" => Intent::Speed(integer(value)?),
            "brightness" => Intent::Brightness(integer(value)?),
            "color" => Intent::Color(text(value)),
            "color_R" => Intent::Channel(ColorChannel::Red),
            "color_G" => Intent::Channel(ColorChannel::Green),
            "color_B" => Intent::Channel(ColorChannel::Blue),
            "color_W" => Intent::Channel(ColorChannel::White),
            other => {
                let (name, variant) = other.rsplit_once('_')?;
                if variant != suffix {
                    return None;
                }
                match name {
                    "color" => Intent::ColorHex(text(value)),
                    "set_all" => Intent::SetAll(text(value)),
                    "single" => Intent::SinglePixel(text(value)),
                    "array" => Intent::PixelArray(text(value)),
                    "range" => Intent::PixelRange(text(value)),
                    _ => return None,
                }
            }
        };

        Some(intent)
    }

    /// Whether this intent is held back for the write coalescer
    pub fn is_deferred(&self) -> bool {
        matches!(self, Intent::Channel(_))
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "false" && s != "0",
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Integer view of a numeric or numeric-string value
pub(crate) fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Turns intents into wire commands. The commit token is not included;
/// the connection appends it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandEncoder {
    rgbw: bool,
}

impl CommandEncoder {
    pub fn new(rgbw: bool) -> Self {
        Self { rgbw }
    }

    pub fn rgbw(&self) -> bool {
        self.rgbw
    }

    /// Encode one intent. Deferred intents and colors with fewer than three
    /// components produce no commands.
    pub fn encode(&self, intent: &Intent, mode: DeviceMode) -> Result<Vec<String>> {
        let command = match intent {
            Intent::Power(on) => format!("{}{}", POWER, if *on { 255 } else { 0 }),
            Intent::Mode(id) => format!("{}{}", MODE, id),
            Intent::FxMode(id) => format!("{}{}", FX_MODE, id),
            Intent::Speed(v) => format!("{}{}", SPEED, clamp_byte(*v)),
            Intent::Brightness(v) => format!("{}{}", BRIGHTNESS, clamp_byte(*v)),
            Intent::Color(csv) => match Color::from_csv(csv, self.rgbw) {
                Ok(color) => self.color(&color, mode),
                Err(_) => return Ok(Vec::new()),
            },
            Intent::Channel(_) => return Ok(Vec::new()),
            Intent::ColorHex(hex) => {
                format!("{}{}", mode.color_prefix(), self.bulk_hex(hex)?)
            }
            Intent::SetAll(hex) => format!("{}{}", STATIC_COLOR, self.bulk_hex(hex)?),
            Intent::SinglePixel(hex) => {
                let hex = hex.replacen('#', "", 1);
                let hex = if self.rgbw {
                    reorder_white_first(&hex, ChunkLayout::Single)?
                } else {
                    hex
                };
                format!("{}{}", SINGLE_PIXEL, hex)
            }
            Intent::PixelArray(list) => {
                self.pixels(list, ARRAY_DELIMITER, ChunkLayout::Array)?
            }
            Intent::PixelRange(list) => {
                self.pixels(list, RANGE_DELIMITER, ChunkLayout::Range)?
            }
        };

        Ok(vec![command])
    }

    /// Plain color write using the prefix for the current mode.
    /// White is dropped unless this is an RGBW device.
    pub fn color(&self, color: &Color, mode: DeviceMode) -> String {
        let w = if self.rgbw { color.w } else { None };
        let color = Color { w, ..*color };
        format!("{}{}", mode.color_prefix(), color.to_wire_hex())
    }

    fn bulk_hex(&self, hex: &str) -> Result<String> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if self.rgbw {
            reorder_white_first(hex, ChunkLayout::Bulk)
        } else {
            Ok(hex.to_string())
        }
    }

    fn pixels(&self, list: &str, delimiter: char, layout: ChunkLayout) -> Result<String> {
        let normalized = normalize_pixel_list(list, delimiter);
        if self.rgbw {
            reorder_white_first(&normalized, layout)
        } else {
            Ok(normalized)
        }
    }
}

fn clamp_byte(value: i64) -> i64 {
    value.clamp(0, 255)
}

/// Bring a pixel list into `<delim>`-led form.
///
/// Lists already containing the delimiter only get a leading delimiter.
/// Anything else is treated as a bracketed or CSV list: whitespace and
/// brackets are removed and the first comma becomes the delimiter.
pub fn normalize_pixel_list(list: &str, delimiter: char) -> String {
    if list.contains(delimiter) {
        if list.starts_with(delimiter) {
            list.to_string()
        } else {
            format!("{}{}", delimiter, list)
        }
    } else {
        let compact: String = list
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '[' && *c != ']')
            .collect();
        format!(
            "{}{}",
            delimiter,
            compact.replacen(',', &delimiter.to_string(), 1)
        )
    }
}
