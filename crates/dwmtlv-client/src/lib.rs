//! Request/response cycles against a DWM1001 module.
//!
//! One cycle sends a single request frame and consumes the status, position
//! and (for `dwm_loc_get`) distance frames that answer it. The [`Locator`]
//! repeats cycles over a serial connection until cancelled.

#[cfg(unix)]
pub mod connector;
pub mod cycle;
pub mod error;
pub mod locator;

#[cfg(unix)]
pub use connector::{open, open_with_config};
pub use cycle::{
    AbortReason, AnchorRecord, CycleOutcome, CycleState, LocationCycle, LocationReport,
    RequestKind, Step,
};
pub use error::{ClientError, Result};
pub use locator::{Locator, LocatorConfig, ReportSink, DEFAULT_CYCLE_INTERVAL};
