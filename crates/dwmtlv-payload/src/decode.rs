use bytes::Buf;
use dwmtlv_frame::{TLV_TYPE_DUMMY, TLV_TYPE_POS_XYZ, TLV_TYPE_RNG_AN_DIST, TLV_TYPE_RNG_AN_POS_DIST};
use serde::Serialize;

use crate::error::{DecodeError, Result};
use crate::types::{AnchorDistance, AnchorDistanceWithPosition, NodeAddress, Position};

/// Position value: x (4) + y (4) + z (4) + quality (1).
pub const POSITION_LEN: usize = 13;

/// `RNG_AN_DIST` record: address (8) + distance (4) + quality (1).
pub const ANCHOR_DISTANCE_LEN: usize = 13;

/// `RNG_AN_POS_DIST` record: address (2) + distance (4) + quality (1) + position (13).
pub const ANCHOR_DISTANCE_WITH_POSITION_LEN: usize = 20;

/// Spacing between consecutive `RNG_AN_POS_DIST` records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordStride {
    /// Records laid end to end, 20 bytes apart.
    #[default]
    Packed,
    /// Records 13 bytes apart, overlapping each other. Reproduces what the
    /// earlier tooling parsed, for comparing output against it.
    Legacy,
}

impl RecordStride {
    fn bytes(self) -> usize {
        match self {
            RecordStride::Packed => ANCHOR_DISTANCE_WITH_POSITION_LEN,
            RecordStride::Legacy => ANCHOR_DISTANCE_LEN,
        }
    }
}

/// Decoder options.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeConfig {
    pub with_position_stride: RecordStride,
}

/// A decoded TLV value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Filler,
    Position(Position),
    AnchorDistances(Vec<AnchorDistance>),
    AnchorDistancesWithPosition(Vec<AnchorDistanceWithPosition>),
}

/// Decode a 13-byte position value.
pub fn decode_position(value: &[u8; POSITION_LEN]) -> Position {
    let mut buf = &value[..];
    Position {
        x: buf.get_i32_le(),
        y: buf.get_i32_le(),
        z: buf.get_i32_le(),
        quality: buf.get_u8(),
    }
}

/// Decode an `RNG_AN_DIST` value: a count byte followed by 13-byte records
/// with 8-byte anchor addresses.
pub fn decode_anchor_distances(value: &[u8]) -> Result<Vec<AnchorDistance>> {
    let records = records(
        TLV_TYPE_RNG_AN_DIST,
        value,
        ANCHOR_DISTANCE_LEN,
        ANCHOR_DISTANCE_LEN,
    )?;

    Ok(records
        .map(|mut rec| {
            let mut address = [0u8; 8];
            rec.copy_to_slice(&mut address);
            AnchorDistance {
                address: NodeAddress::Long(address),
                distance: rec.get_u32_le(),
                quality: rec.get_u8(),
            }
        })
        .collect())
}

/// Decode an `RNG_AN_POS_DIST` value: a count byte followed by records of a
/// 2-byte address, distance, quality and the anchor's position.
pub fn decode_anchor_distances_with_position(
    value: &[u8],
    stride: RecordStride,
) -> Result<Vec<AnchorDistanceWithPosition>> {
    let records = records(
        TLV_TYPE_RNG_AN_POS_DIST,
        value,
        stride.bytes(),
        ANCHOR_DISTANCE_WITH_POSITION_LEN,
    )?;

    Ok(records
        .map(|mut rec| {
            let mut address = [0u8; 2];
            rec.copy_to_slice(&mut address);
            let distance = rec.get_u32_le();
            let quality = rec.get_u8();
            let mut position = [0u8; POSITION_LEN];
            rec.copy_to_slice(&mut position);
            AnchorDistanceWithPosition {
                address: NodeAddress::Short(address),
                distance,
                quality,
                position: decode_position(&position),
            }
        })
        .collect())
}

/// Decode a value by tag with default options.
pub fn decode(tlv_type: u8, value: &[u8]) -> Result<Payload> {
    decode_with(tlv_type, value, &DecodeConfig::default())
}

/// Decode a value by tag.
pub fn decode_with(tlv_type: u8, value: &[u8], config: &DecodeConfig) -> Result<Payload> {
    match tlv_type {
        TLV_TYPE_DUMMY => Ok(Payload::Filler),
        TLV_TYPE_POS_XYZ => {
            let bytes = value
                .first_chunk::<POSITION_LEN>()
                .ok_or(DecodeError::ShortPayload {
                    tag: tlv_type,
                    needed: POSITION_LEN,
                    actual: value.len(),
                })?;
            Ok(Payload::Position(decode_position(bytes)))
        }
        TLV_TYPE_RNG_AN_DIST => decode_anchor_distances(value).map(Payload::AnchorDistances),
        TLV_TYPE_RNG_AN_POS_DIST => {
            decode_anchor_distances_with_position(value, config.with_position_stride)
                .map(Payload::AnchorDistancesWithPosition)
        }
        other => Err(DecodeError::UnsupportedType(other)),
    }
}

/// Split a count-prefixed value into exactly `count` record slices.
///
/// Record `i` starts at `1 + stride * i` and is `width` bytes long; bytes past
/// the last record are ignored.
fn records(
    tag: u8,
    value: &[u8],
    stride: usize,
    width: usize,
) -> Result<impl Iterator<Item = &[u8]>> {
    let Some((&count, _)) = value.split_first() else {
        return Err(DecodeError::ShortPayload {
            tag,
            needed: 1,
            actual: 0,
        });
    };
    let count = count as usize;

    let needed = match count {
        0 => 1,
        n => 1 + stride * (n - 1) + width,
    };
    if value.len() < needed {
        return Err(DecodeError::ShortPayload {
            tag,
            needed,
            actual: value.len(),
        });
    }

    Ok((0..count).map(move |i| {
        let start = 1 + stride * i;
        &value[start..start + width]
    }))
}
