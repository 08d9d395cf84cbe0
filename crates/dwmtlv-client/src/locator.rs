use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use dwmtlv_frame::{CancelToken, FrameConfig, FrameReader, FrameWriter};
use dwmtlv_payload::DecodeConfig;
use dwmtlv_transport::Connection;
use tracing::{debug, info, warn};

use crate::cycle::{AbortReason, CycleOutcome, LocationCycle, LocationReport, RequestKind, Step};
use crate::error::{ClientError, Result};

/// Pause between cycles when none is configured.
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_millis(100);

/// Locator behavior configuration.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    pub frame: FrameConfig,
    pub decode: DecodeConfig,
    /// Pause after each cycle in [`Locator::run`].
    pub cycle_interval: Duration,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            decode: DecodeConfig::default(),
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
        }
    }
}

/// Receives the result of each cycle driven by [`Locator::run`].
///
/// Returning `ControlFlow::Break` ends the loop after the current cycle.
pub trait ReportSink {
    fn report(&mut self, report: &LocationReport) -> ControlFlow<()>;

    fn aborted(&mut self, _reason: AbortReason) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// A cycle failed without losing the connection, e.g. the device stayed silent.
    fn cycle_failed(&mut self, _error: &ClientError) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Drives location cycles over one device connection.
///
/// Reader and writer are separate handles onto the same device. Requests are
/// strictly sequential: a new one is only sent after the previous cycle ended.
#[derive(Debug)]
pub struct Locator<C> {
    reader: FrameReader<C>,
    writer: FrameWriter<C>,
    config: LocatorConfig,
    completed: u64,
}

impl<C: Connection> Locator<C> {
    pub fn from_parts(reader: FrameReader<C>, writer: FrameWriter<C>, config: LocatorConfig) -> Self {
        Self {
            reader,
            writer,
            config,
            completed: 0,
        }
    }

    /// Run one `dwm_loc_get` cycle.
    pub fn locate(&mut self) -> Result<CycleOutcome> {
        self.run_cycle(RequestKind::Location)
    }

    /// Run one `dwm_pos_get` cycle.
    pub fn position(&mut self) -> Result<CycleOutcome> {
        self.run_cycle(RequestKind::Position)
    }

    /// Send the request for `kind` and consume frames until the cycle ends.
    ///
    /// A device-reported failure is `Ok(CycleOutcome::Aborted(..))`, after the
    /// input queue has been flushed. `Err` means the exchange itself broke.
    pub fn run_cycle(&mut self, kind: RequestKind) -> Result<CycleOutcome> {
        let mut cycle = LocationCycle::new(kind, self.config.decode);

        self.writer.send(&kind.request_frame())?;
        cycle.on_sent();

        loop {
            let frame = match self.reader.read_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    cycle.abort();
                    return Err(err.into());
                }
            };

            match cycle.on_frame(&frame) {
                Step::Continue => {}
                Step::Complete(report) => {
                    self.completed += 1;
                    debug!(
                        anchors = report.anchors.len(),
                        has_position = report.position.is_some(),
                        "cycle complete"
                    );
                    return Ok(CycleOutcome::Complete(report));
                }
                Step::Abort(reason) => {
                    warn!(%reason, "cycle aborted");
                    if let Err(err) = self.writer.discard_input() {
                        warn!(%reason, error = %err, "input flush after abort failed");
                        return Err(err.into());
                    }
                    return Ok(CycleOutcome::Aborted(reason));
                }
            }
        }
    }

    /// Repeat cycles of `kind` until `cancel` trips, the sink breaks, or the
    /// connection is lost.
    ///
    /// Cancellation is observed before every read and during the pause between
    /// cycles. Cancelling between frames ends the loop with `Ok(())`. Cancelling
    /// mid-frame leaves the stream unusable and is returned as
    /// `Err(FrameError::Cancelled { partial: true })`, like any other
    /// connection loss, so the caller can drop or reopen the device.
    pub fn run(
        &mut self,
        kind: RequestKind,
        sink: &mut dyn ReportSink,
        cancel: &CancelToken,
    ) -> Result<()> {
        self.reader.set_cancel_token(Some(cancel.clone()));
        let result = self.run_loop(kind, sink, cancel);
        self.reader.set_cancel_token(None);
        result
    }

    fn run_loop(
        &mut self,
        kind: RequestKind,
        sink: &mut dyn ReportSink,
        cancel: &CancelToken,
    ) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                info!("cancelled, stopping");
                return Ok(());
            }

            let flow = match self.run_cycle(kind) {
                Ok(CycleOutcome::Complete(report)) => sink.report(&report),
                Ok(CycleOutcome::Aborted(reason)) => sink.aborted(reason),
                Err(err) if err.is_connection_lost() => return Err(err),
                Err(err) if err.is_cancelled() => {
                    info!("cancelled while waiting for the device");
                    return Ok(());
                }
                Err(err) => {
                    warn!(error = %err, "cycle failed");
                    sink.cycle_failed(&err)
                }
            };

            if flow.is_break() {
                return Ok(());
            }
            self.pause(cancel);
        }
    }

    /// Sleep for the cycle interval in poll-sized slices.
    fn pause(&self, cancel: &CancelToken) {
        let until = Instant::now() + self.config.cycle_interval;
        let slice = self.config.frame.poll_interval.max(Duration::from_millis(1));
        loop {
            if cancel.is_cancelled() {
                return;
            }
            let now = Instant::now();
            if now >= until {
                return;
            }
            std::thread::sleep(slice.min(until - now));
        }
    }

    /// Number of cycles that completed with a report.
    pub fn completed_cycles(&self) -> u64 {
        self.completed
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Split back into reader and writer.
    pub fn into_parts(self) -> (FrameReader<C>, FrameWriter<C>) {
        (self.reader, self.writer)
    }
}
