//! The request/response state machine for one location cycle.
//!
//! ```text
//! Idle ─sent─▶ AwaitingStatus ─ok─▶ AwaitingPosition ─▶ AwaitingDistances ─▶ Complete
//!                    │                      │
//!                    └──── not ok ──────────┴── no position ──▶ Aborted
//! ```
//!
//! The machine is pure: it is fed frames and says what to do next. I/O and
//! input flushing are the caller's job (see [`Locator`](crate::Locator)).

use std::fmt;

use dwmtlv_frame::{tag_name, Frame, DWM_LOC_GET, DWM_POS_GET, TLV_TYPE_RET_VAL};
use dwmtlv_payload::{
    decode_with, AnchorDistance, AnchorDistanceWithPosition, DecodeConfig, Payload, Position,
    StatusCode, POSITION_LEN,
};
use serde::Serialize;
use tracing::{debug, warn};

/// Minimum value length of a data frame worth decoding.
const MIN_DATA_LEN: usize = POSITION_LEN;

/// Which request a cycle issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// `dwm_loc_get`: position plus anchor distances.
    Location,
    /// `dwm_pos_get`: position only.
    Position,
}

impl RequestKind {
    pub fn request_frame(self) -> Frame {
        match self {
            RequestKind::Location => Frame::request(DWM_LOC_GET),
            RequestKind::Position => Frame::request(DWM_POS_GET),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    AwaitingStatus,
    AwaitingPosition,
    AwaitingDistances,
    Complete,
    Aborted,
}

impl CycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CycleState::Complete | CycleState::Aborted)
    }
}

/// One anchor entry of a report, in whichever shape the device sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnchorRecord {
    Distance(AnchorDistance),
    DistanceWithPosition(AnchorDistanceWithPosition),
}

impl AnchorRecord {
    pub fn distance(&self) -> u32 {
        match self {
            AnchorRecord::Distance(r) => r.distance,
            AnchorRecord::DistanceWithPosition(r) => r.distance,
        }
    }
}

/// Result of a successful cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocationReport {
    pub position: Option<Position>,
    pub anchors: Vec<AnchorRecord>,
}

/// Why a cycle ended without a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    /// The device answered with a non-OK status.
    Status { code: StatusCode },
    /// The status frame did not carry exactly one byte.
    MalformedStatus { length: usize },
    /// The position frame was too short to hold a position.
    NoPosition { length: usize },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Status { code } => write!(f, "device returned error: {code}"),
            AbortReason::MalformedStatus { length } => {
                write!(f, "status frame carried {length} bytes, expected 1")
            }
            AbortReason::NoPosition { length } => {
                write!(f, "no position received ({length} bytes)")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Complete(LocationReport),
    Aborted(AbortReason),
}

/// What the driver should do after feeding a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Read another frame.
    Continue,
    /// The cycle finished with a report.
    Complete(LocationReport),
    /// The cycle failed; pending input must be flushed.
    Abort(AbortReason),
}

/// State of one request/response exchange.
#[derive(Debug)]
pub struct LocationCycle {
    kind: RequestKind,
    state: CycleState,
    decode: DecodeConfig,
    report: LocationReport,
}

impl LocationCycle {
    pub fn new(kind: RequestKind, decode: DecodeConfig) -> Self {
        Self {
            kind,
            state: CycleState::Idle,
            decode,
            report: LocationReport::default(),
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// The request frame went out.
    pub fn on_sent(&mut self) {
        if self.state == CycleState::Idle {
            self.transition(CycleState::AwaitingStatus);
        }
    }

    /// Give up on the cycle, e.g. after a transport failure.
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.transition(CycleState::Aborted);
        }
    }

    /// Feed the next frame received from the device.
    pub fn on_frame(&mut self, frame: &Frame) -> Step {
        match self.state {
            CycleState::AwaitingStatus => self.on_status(frame),
            CycleState::AwaitingPosition => self.on_position(frame),
            CycleState::AwaitingDistances => self.on_distances(frame),
            state => {
                warn!(?state, tag = tag_name(frame.tlv_type), "frame outside of cycle ignored");
                Step::Continue
            }
        }
    }

    fn on_status(&mut self, frame: &Frame) -> Step {
        if frame.tlv_type != TLV_TYPE_RET_VAL {
            warn!(
                tlv_type = format_args!("{:#04x}", frame.tlv_type),
                "unexpected tag for status frame"
            );
        }

        let [byte] = &frame.value[..] else {
            return self.fail(AbortReason::MalformedStatus {
                length: frame.len(),
            });
        };

        let code = StatusCode::from_byte(*byte);
        if !code.is_ok() {
            return self.fail(AbortReason::Status { code });
        }

        self.transition(CycleState::AwaitingPosition);
        Step::Continue
    }

    fn on_position(&mut self, frame: &Frame) -> Step {
        if frame.len() < MIN_DATA_LEN {
            return self.fail(AbortReason::NoPosition {
                length: frame.len(),
            });
        }

        match decode_with(frame.tlv_type, &frame.value, &self.decode) {
            Ok(Payload::Position(position)) => self.report.position = Some(position),
            Ok(other) => warn!(payload = ?other, "expected a position, frame discarded"),
            Err(err) => warn!(error = %err, "position frame discarded"),
        }

        match self.kind {
            RequestKind::Position => self.finish(),
            RequestKind::Location => {
                self.transition(CycleState::AwaitingDistances);
                Step::Continue
            }
        }
    }

    fn on_distances(&mut self, frame: &Frame) -> Step {
        if frame.len() < MIN_DATA_LEN {
            debug!(length = frame.len(), "no distances received");
            return self.finish();
        }

        match decode_with(frame.tlv_type, &frame.value, &self.decode) {
            Ok(Payload::AnchorDistances(records)) => {
                self.report.anchors = records.into_iter().map(AnchorRecord::Distance).collect();
            }
            Ok(Payload::AnchorDistancesWithPosition(records)) => {
                self.report.anchors = records
                    .into_iter()
                    .map(AnchorRecord::DistanceWithPosition)
                    .collect();
            }
            Ok(other) => warn!(payload = ?other, "expected anchor distances, frame discarded"),
            Err(err) => warn!(error = %err, "distances frame discarded"),
        }

        self.finish()
    }

    fn finish(&mut self) -> Step {
        self.transition(CycleState::Complete);
        Step::Complete(std::mem::take(&mut self.report))
    }

    fn fail(&mut self, reason: AbortReason) -> Step {
        self.transition(CycleState::Aborted);
        Step::Abort(reason)
    }

    fn transition(&mut self, next: CycleState) {
        debug!(from = ?self.state, to = ?next, "cycle transition");
        self.state = next;
    }
}
