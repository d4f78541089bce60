//! Color codec
//!
//! Conversions between color components and the controller's hex pixel
//! encoding. The controller expects RGBW pixels with the white byte first
//! (`WWRRGGBB`), while the state bus and user input carry it last, so
//! every RGBW payload is rewritten chunk by chunk before it hits the wire.

use crate::error::{Error, Result};

/// A single pixel color. `w` is only populated on RGBW devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub w: Option<u8>,
}

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, w: None }
    }

    pub fn rgbw(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self { r, g, b, w: Some(w) }
    }

    /// Parse a comma-separated `r,g,b[,w]` string.
    ///
    /// At least three components are required. The fourth is only kept
    /// when `rgbw` is set. Components that are empty or not numeric count
    /// as 0; out-of-range values are clamped to 0..=255.
    pub fn from_csv(text: &str, rgbw: bool) -> Result<Self> {
        let parts: Vec<&str> = text.split(',').collect();
        if parts.len() < 3 {
            return Err(Error::InvalidColor(format!(
                "expected at least 3 components, got {}",
                parts.len()
            )));
        }

        let w = if rgbw && parts.len() >= 4 {
            Some(csv_component(parts[3]))
        } else {
            None
        };

        Ok(Self {
            r: csv_component(parts[0]),
            g: csv_component(parts[1]),
            b: csv_component(parts[2]),
            w,
        })
    }

    /// Decode a wire hex color: `rrggbb`, or `wwrrggbb` for RGBW.
    pub fn from_wire_hex(hex: &str) -> Result<Self> {
        match hex.len() {
            6 => Ok(Self::rgb(
                hex_byte(hex, 0)?,
                hex_byte(hex, 2)?,
                hex_byte(hex, 4)?,
            )),
            8 => Ok(Self::rgbw(
                hex_byte(hex, 2)?,
                hex_byte(hex, 4)?,
                hex_byte(hex, 6)?,
                hex_byte(hex, 0)?,
            )),
            n => Err(Error::InvalidHex(format!(
                "color must be 6 or 8 hex digits, got {}",
                n
            ))),
        }
    }

    /// Wire hex form, white first.
    pub fn to_wire_hex(&self) -> String {
        rgbw_to_hex(self.r, self.g, self.b, self.w)
    }

    /// Comma-separated decimal form, white last.
    pub fn to_csv(&self) -> String {
        match self.w {
            Some(w) => format!("{},{},{},{}", self.r, self.g, self.b, w),
            None => format!("{},{},{}", self.r, self.g, self.b),
        }
    }
}

fn csv_component(part: &str) -> u8 {
    part.trim()
        .parse::<i64>()
        .map(|v| v.clamp(0, 255) as u8)
        .unwrap_or(0)
}

fn hex_byte(text: &str, offset: usize) -> Result<u8> {
    let digits = text
        .get(offset..offset + 2)
        .ok_or_else(|| Error::InvalidHex(text.to_string()))?;
    u8::from_str_radix(digits, 16).map_err(|_| Error::InvalidHex(text.to_string()))
}

/// Two-digit lowercase hex for one component; absent components encode as
/// an empty string.
pub fn component_to_hex(component: Option<u8>) -> String {
    match component {
        Some(c) => format!("{:02x}", c),
        None => String::new(),
    }
}

/// Hex-encode a color as `w r g b`. Without `w` this is plain `rrggbb`.
pub fn rgbw_to_hex(r: u8, g: u8, b: u8, w: Option<u8>) -> String {
    let mut hex = component_to_hex(w);
    hex.push_str(&component_to_hex(Some(r)));
    hex.push_str(&component_to_hex(Some(g)));
    hex.push_str(&component_to_hex(Some(b)));
    hex
}

/// Fixed-width pixel record shapes used by the RGBW commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkLayout {
    /// Bare color, no index
    Bulk,
    /// Two hex digits of pixel index
    Single,
    /// `+` and a two-digit pixel index
    Array,
    /// `R` and a two-digit start and end index
    Range,
}

impl ChunkLayout {
    /// Number of characters identifying the pixel(s)
    pub const fn prefix_len(self) -> usize {
        match self {
            ChunkLayout::Bulk => 0,
            ChunkLayout::Single => 2,
            ChunkLayout::Array => 3,
            ChunkLayout::Range => 5,
        }
    }

    /// Full chunk width: prefix plus four hex-encoded components
    pub const fn width(self) -> usize {
        self.prefix_len() + 8
    }
}

/// One RGBW pixel record: its index prefix and color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelChunk {
    pub index: String,
    pub color: Color,
}

impl PixelChunk {
    /// Parse a chunk laid out as `index rr gg bb ww` (bus order).
    pub fn parse_white_last(chunk: &str, layout: ChunkLayout) -> Result<Self> {
        let p = Self::check_width(chunk, layout)?;
        Ok(Self {
            index: chunk[..p].to_string(),
            color: Color::rgbw(
                hex_byte(chunk, p)?,
                hex_byte(chunk, p + 2)?,
                hex_byte(chunk, p + 4)?,
                hex_byte(chunk, p + 6)?,
            ),
        })
    }

    /// Parse a chunk laid out as `index ww rr gg bb` (wire order).
    pub fn parse_white_first(chunk: &str, layout: ChunkLayout) -> Result<Self> {
        let p = Self::check_width(chunk, layout)?;
        Ok(Self {
            index: chunk[..p].to_string(),
            color: Color::rgbw(
                hex_byte(chunk, p + 2)?,
                hex_byte(chunk, p + 4)?,
                hex_byte(chunk, p + 6)?,
                hex_byte(chunk, p)?,
            ),
        })
    }

    /// Serialize in wire order.
    pub fn to_white_first(&self) -> String {
        format!("{}{}", self.index, self.color.to_wire_hex())
    }

    /// Serialize in bus order.
    pub fn to_white_last(&self) -> String {
        format!(
            "{}{}{}",
            self.index,
            rgbw_to_hex(self.color.r, self.color.g, self.color.b, None),
            component_to_hex(self.color.w)
        )
    }

    fn check_width(chunk: &str, layout: ChunkLayout) -> Result<usize> {
        if chunk.len() != layout.width() || !chunk.is_ascii() {
            return Err(Error::InvalidHex(format!(
                "pixel chunk {:?} is not {} ascii characters",
                chunk,
                layout.width()
            )));
        }
        Ok(layout.prefix_len())
    }
}

/// Rewrite every full chunk of `payload` from bus order to wire order.
///
/// A trailing fragment shorter than one chunk is passed through untouched.
pub fn reorder_white_first(payload: &str, layout: ChunkLayout) -> Result<String> {
    if !payload.is_ascii() {
        return Err(Error::InvalidHex(payload.to_string()));
    }

    let width = layout.width();
    let mut out = String::with_capacity(payload.len());
    let mut offset = 0;

    while offset + width <= payload.len() {
        let chunk = PixelChunk::parse_white_last(&payload[offset..offset + width], layout)?;
        out.push_str(&chunk.to_white_first());
        offset += width;
    }
    out.push_str(&payload[offset..]);

    Ok(out)
}
