use std::fmt;

use serde::{Serialize, Serializer};

/// A position fix: millimetre-scale coordinates plus a quality factor.
///
/// Coordinates are signed: a tag can sit on either side of the anchor origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Confidence, nominally 0 to 100.
    pub quality: u8,
}

impl Position {
    pub fn new(x: i32, y: i32, z: i32, quality: u8) -> Self {
        Self { x, y, z, quality }
    }

    /// Wire layout: `x:i32le, y:i32le, z:i32le, q:u8`.
    pub fn to_bytes(&self) -> [u8; 13] {
        let mut out = [0u8; 13];
        out[0..4].copy_from_slice(&self.x.to_le_bytes());
        out[4..8].copy_from_slice(&self.y.to_le_bytes());
        out[8..12].copy_from_slice(&self.z.to_le_bytes());
        out[12] = self.quality;
        out
    }
}

/// UWB node identifier, kept in wire byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeAddress {
    Short([u8; 2]),
    Long([u8; 8]),
}

impl NodeAddress {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            NodeAddress::Short(b) => b,
            NodeAddress::Long(b) => b,
        }
    }
}

impl fmt::Display for NodeAddress {
    /// Lowercase hex of the wire bytes, in wire order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.as_bytes() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl Serialize for NodeAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Distance from the node to one anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnchorDistance {
    pub address: NodeAddress,
    pub distance: u32,
    pub quality: u8,
}

/// Distance to one anchor together with that anchor's own position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnchorDistanceWithPosition {
    pub address: NodeAddress,
    pub distance: u32,
    pub quality: u8,
    pub position: Position,
}

/// Device return value carried in the status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    /// Unknown command or broken TLV frame.
    UnknownCommand,
    InternalError,
    InvalidParameter,
    Busy,
    NotPermitted,
    Unknown(u8),
}

impl StatusCode {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => StatusCode::Ok,
            1 => StatusCode::UnknownCommand,
            2 => StatusCode::InternalError,
            3 => StatusCode::InvalidParameter,
            4 => StatusCode::Busy,
            5 => StatusCode::NotPermitted,
            other => StatusCode::Unknown(other),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::UnknownCommand => 1,
            StatusCode::InternalError => 2,
            StatusCode::InvalidParameter => 3,
            StatusCode::Busy => 4,
            StatusCode::NotPermitted => 5,
            StatusCode::Unknown(b) => *b,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, StatusCode::Ok)
    }
}

impl From<u8> for StatusCode {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Ok => f.write_str("ok"),
            StatusCode::UnknownCommand => f.write_str("unknown command or broken TLV frame"),
            StatusCode::InternalError => f.write_str("internal error"),
            StatusCode::InvalidParameter => f.write_str("invalid parameter"),
            StatusCode::Busy => f.write_str("busy"),
            StatusCode::NotPermitted => f.write_str("operation not permitted"),
            StatusCode::Unknown(b) => write!(f, "unknown status {b:#04x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_both_ways() {
        for byte in 0..=u8::MAX {
            assert_eq!(StatusCode::from_byte(byte).as_byte(), byte);
        }
        assert!(StatusCode::from(0).is_ok());
        assert_eq!(StatusCode::from(3), StatusCode::InvalidParameter);
        assert_eq!(StatusCode::from(9), StatusCode::Unknown(9));
    }

    #[test]
    fn address_renders_as_wire_hex() {
        assert_eq!(NodeAddress::Short([0x1a, 0x2b]).to_string(), "1a2b");
        assert_eq!(
            NodeAddress::Long([0, 1, 2, 3, 4, 5, 6, 0xff]).to_string(),
            "00010203040506ff"
        );
    }

    #[test]
    fn address_serializes_as_string() {
        let record = AnchorDistance {
            address: NodeAddress::Short([0xbe, 0xef]),
            distance: 1500,
            quality: 100,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"address":"beef","distance":1500,"quality":100}"#);
    }

    #[test]
    fn position_bytes_are_little_endian() {
        let bytes = Position::new(100, -2, 300, 90).to_bytes();
        assert_eq!(&bytes[0..4], &[100, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&bytes[8..12], &[0x2C, 0x01, 0, 0]);
        assert_eq!(bytes[12], 90);
    }
}
