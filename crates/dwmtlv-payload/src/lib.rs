//! Typed decoding of DWM1001 TLV response values.
//!
//! A pure function of `(type tag, value bytes)`: no I/O, no state. The frame
//! layer guarantees `value.len()` matches the length byte; this crate turns
//! those bytes into positions and anchor-distance records.

pub mod decode;
pub mod error;
pub mod types;

pub use decode::{
    decode, decode_anchor_distances, decode_anchor_distances_with_position, decode_position,
    decode_with, DecodeConfig, Payload, RecordStride, ANCHOR_DISTANCE_LEN,
    ANCHOR_DISTANCE_WITH_POSITION_LEN, POSITION_LEN,
};
pub use error::{DecodeError, Result};
pub use types::{AnchorDistance, AnchorDistanceWithPosition, NodeAddress, Position, StatusCode};
