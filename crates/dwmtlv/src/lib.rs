//! Talk to a Decawave DWM1001 UWB module over its serial TLV API.
//!
//! dwmtlv sends location requests to the module, reads back the TLV frames it
//! answers with, and decodes them into positions and anchor distances.
//!
//! # Crate Structure
//!
//! - [`transport`]: Raw serial port access
//! - [`frame`]: TLV framing with filler skipping
//! - [`payload`]: Typed decoding of response values
//! - [`client`]: Request/response cycles and the location loop

/// Re-export transport types.
pub mod transport {
    pub use dwmtlv_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use dwmtlv_frame::*;
}

/// Re-export payload types.
pub mod payload {
    pub use dwmtlv_payload::*;
}

/// Re-export client types.
pub mod client {
    pub use dwmtlv_client::*;
}
