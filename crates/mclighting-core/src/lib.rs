//! McLighting Core
//!
//! Wire protocol primitives for McLighting addressable LED controllers.
//!
//! This crate provides:
//! - Color conversions and the RGBW pixel reordering ([`color`])
//! - Typed lighting intents and their wire encoding ([`Intent`], [`CommandEncoder`])
//! - Inbound status frame decoding ([`parse_frame`], [`StatusSnapshot`])
//!
//! Nothing in here performs I/O; the connection lives in `mclighting-client`.

pub mod color;
pub mod command;
pub mod error;
pub mod status;

pub use color::{component_to_hex, rgbw_to_hex, ChunkLayout, Color, PixelChunk};
pub use command::{ColorChannel, CommandEncoder, DeviceMode, Intent};
pub use error::{Error, Result};
pub use status::{parse_frame, Frame, ModeList, StatusReport, StatusSnapshot};

/// Default controller WebSocket port
pub const DEFAULT_PORT: u16 = 81;

/// Default controller host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Token that makes the controller display the buffered pixel state
pub const COMMIT: &str = "$";

/// Token requesting a full status frame
pub const STATUS_REQUEST: &str = "~";
