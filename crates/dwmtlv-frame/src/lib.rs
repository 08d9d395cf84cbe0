//! TLV framing for the DWM1001 UART API.
//!
//! Every request and response on the wire is a TLV frame:
//! - A 1-byte type tag
//! - A 1-byte value length
//! - Exactly that many value bytes
//!
//! While the module is still computing a response it emits `0x00` filler
//! bytes. The reader absorbs them, so callers only ever see real frames.

pub mod cancel;
pub mod codec;
pub mod error;
pub mod reader;
pub mod tag;
pub mod writer;

pub use cancel::CancelToken;
pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, HEADER_SIZE, MAX_VALUE_LEN};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use tag::{
    tag_name, DWM_LOC_GET, DWM_POS_GET, TLV_TYPE_DUMMY, TLV_TYPE_POS_XYZ, TLV_TYPE_RET_VAL,
    TLV_TYPE_RNG_AN_DIST, TLV_TYPE_RNG_AN_POS_DIST,
};
pub use writer::FrameWriter;
