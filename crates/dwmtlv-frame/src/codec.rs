use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::tag::{is_filler, DWM_LOC_GET, DWM_POS_GET};

/// Frame header: type (1) + length (1) = 2 bytes.
pub const HEADER_SIZE: usize = 2;

/// Largest value a 1-byte length field can describe.
pub const MAX_VALUE_LEN: usize = u8::MAX as usize;

/// Default slice a blocking read waits before re-checking cancellation.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A TLV frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The type tag.
    pub tlv_type: u8,
    /// The raw value bytes.
    pub value: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(tlv_type: u8, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// A request frame with no value, such as `dwm_loc_get`.
    pub fn request(tlv_type: u8) -> Self {
        Self::new(tlv_type, Bytes::new())
    }

    /// The `dwm_loc_get` request (`0x0C 0x00`).
    pub fn loc_get() -> Self {
        Self::request(DWM_LOC_GET)
    }

    /// The `dwm_pos_get` request (`0x02 0x00`).
    pub fn pos_get() -> Self {
        Self::request(DWM_POS_GET)
    }

    /// Value length as carried in the length byte.
    ///
    /// Frames built by the reader always fit; oversized values are rejected on encode.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// The total wire size of this frame (header + value).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.value.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────┬──────────────────┐
/// │ Type     │ Length   │ Value            │
/// │ (1B)     │ (1B)     │ (Length bytes)   │
/// └──────────┴──────────┴──────────────────┘
/// ```
pub fn encode_frame(tlv_type: u8, value: &[u8], dst: &mut BytesMut) -> Result<()> {
    if value.len() > MAX_VALUE_LEN {
        return Err(FrameError::ValueTooLarge {
            size: value.len(),
            max: MAX_VALUE_LEN,
        });
    }
    dst.reserve(HEADER_SIZE + value.len());
    dst.put_u8(tlv_type);
    dst.put_u8(value.len() as u8);
    dst.put_slice(value);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Leading filler bytes are consumed and dropped. Returns `Ok(None)` if the
/// buffer doesn't contain a complete frame yet; on success, consumes the
/// frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Frame>> {
    let fillers = src.iter().take_while(|b| is_filler(**b)).count();
    src.advance(fillers);

    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let tlv_type = src[0];
    let value_len = src[1] as usize;
    if src.len() < HEADER_SIZE + value_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let value = src.split_to(value_len).freeze();

    Ok(Some(Frame { tlv_type, value }))
}

/// Configuration for frame reads.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Upper bound on the wait for one whole frame, filler included.
    /// `None` waits indefinitely.
    pub frame_timeout: Option<Duration>,
    /// How long a single blocking read waits before the reader re-checks
    /// cancellation and the frame deadline.
    pub poll_interval: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}
