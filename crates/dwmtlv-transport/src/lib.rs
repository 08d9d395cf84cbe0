//! Serial transport for the DWM1001 UART TLV interface.
//!
//! Provides the byte-stream collaborator the protocol layers build on:
//! - [`Connection`]: any `Read + Write` stream whose pending input can be discarded
//! - [`SerialPort`]: a raw-mode POSIX serial device (`/dev/ttyACM0` and friends)
//!
//! This is the lowest layer of dwmtlv. Framing lives in `dwmtlv-frame`.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod serial;

#[cfg(all(target_os = "linux", any(test, feature = "test-util")))]
pub mod testing;

pub use error::{Result, TransportError};
pub use traits::Connection;

#[cfg(unix)]
pub use serial::{SerialConfig, SerialPort};

/// Port the module enumerates as over USB on Linux.
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// Baud rate of the DWM1001 UART API.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
