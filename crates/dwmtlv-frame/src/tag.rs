//! TLV type tags used by the DWM1001 UART API.
//!
//! Request tags select a command; response tags identify the payload shape.

/// `dwm_pos_get`: request the node's own position.
pub const DWM_POS_GET: u8 = 0x02;

/// `dwm_loc_get`: request position plus ranging distances.
pub const DWM_LOC_GET: u8 = 0x0C;

/// Placeholder emitted while no response is ready yet (also the SPI dummy byte).
pub const TLV_TYPE_DUMMY: u8 = 0x00;

/// Status frame carrying the 1-byte error code of the request.
pub const TLV_TYPE_RET_VAL: u8 = 0x40;

/// Position x, y, z with quality factor (13 bytes).
pub const TLV_TYPE_POS_XYZ: u8 = 0x41;

/// Ranging anchor distances.
pub const TLV_TYPE_RNG_AN_DIST: u8 = 0x48;

/// Ranging anchor distances with anchor positions.
pub const TLV_TYPE_RNG_AN_POS_DIST: u8 = 0x49;

/// Returns a human-readable name for a tag.
pub fn tag_name(tag: u8) -> &'static str {
    match tag {
        TLV_TYPE_DUMMY => "DUMMY",
        DWM_POS_GET => "POS_GET",
        DWM_LOC_GET => "LOC_GET",
        TLV_TYPE_RET_VAL => "RET_VAL",
        TLV_TYPE_POS_XYZ => "POS_XYZ",
        TLV_TYPE_RNG_AN_DIST => "RNG_AN_DIST",
        TLV_TYPE_RNG_AN_POS_DIST => "RNG_AN_POS_DIST",
        _ => "UNKNOWN",
    }
}

/// Returns true for the filler tag.
pub fn is_filler(tag: u8) -> bool {
    tag == TLV_TYPE_DUMMY
}
