use std::time::{Duration, Instant};

use dwmtlv_client::{LocatorConfig, RequestKind};
use dwmtlv_frame::{CancelToken, FrameConfig};
use dwmtlv_payload::{DecodeConfig, RecordStride};

use crate::cmd::{parse_duration, CycleArgs};
use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

/// Wait before each attempt to reopen a lost port.
#[cfg_attr(not(unix), allow(dead_code))]
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub fn run(args: CycleArgs, kind: RequestKind, format: OutputFormat) -> CliResult<i32> {
    let config = locator_config(&args)?;
    run_locator(args, kind, config, format)
}

fn locator_config(args: &CycleArgs) -> CliResult<LocatorConfig> {
    let frame_timeout = match &args.frame_timeout {
        Some(raw) => {
            let timeout = parse_duration(raw)?;
            if timeout.is_zero() {
                return Err(CliError::new(USAGE, "frame timeout must be greater than zero"));
            }
            Some(timeout)
        }
        None => None,
    };

    let with_position_stride = if args.legacy_stride {
        RecordStride::Legacy
    } else {
        RecordStride::Packed
    };

    Ok(LocatorConfig {
        frame: FrameConfig {
            frame_timeout,
            ..FrameConfig::default()
        },
        decode: DecodeConfig {
            with_position_stride,
        },
        cycle_interval: parse_duration(&args.interval)?,
    })
}

#[cfg(unix)]
fn run_locator(
    args: CycleArgs,
    kind: RequestKind,
    config: LocatorConfig,
    format: OutputFormat,
) -> CliResult<i32> {
    use dwmtlv_client::open_with_config;
    use dwmtlv_transport::SerialConfig;
    use tracing::{info, warn};

    use crate::exit::{client_error, CANCELLED, SUCCESS};
    use crate::output::ReportPrinter;

    let serial = SerialConfig {
        baud_rate: args.baud,
        read_timeout: None,
    };

    let cancel = CancelToken::new();
    install_ctrlc_handler(cancel.clone())?;

    let mut locator = open_with_config(&args.port, &serial, config.clone())
        .map_err(|err| client_error("open failed", err))?;
    let mut printer = ReportPrinter::new(std::io::stdout().lock(), format, args.count);

    info!(port = %args.port.display(), request = ?kind, "starting cycles");
    loop {
        let err = match locator.run(kind, &mut printer, &cancel) {
            Ok(()) => break,
            Err(err) => err,
        };
        if err.is_cancelled() {
            // Cancelled mid-frame; the port is out of sync and is not reopened.
            info!(error = %err, "cancelled inside a frame, closing port");
            return Ok(CANCELLED);
        }
        if !args.reconnect {
            return Err(client_error("connection lost", err));
        }

        warn!(error = %err, "connection lost, reopening");
        drop(locator);
        locator = loop {
            if !sleep_unless_cancelled(RECONNECT_DELAY, &cancel) {
                return Ok(CANCELLED);
            }
            match open_with_config(&args.port, &serial, config.clone()) {
                Ok(locator) => break locator,
                Err(err) => info!(error = %err, "port not available yet"),
            }
        };
    }

    if cancel.is_cancelled() {
        Ok(CANCELLED)
    } else {
        Ok(SUCCESS)
    }
}

#[cfg(not(unix))]
fn run_locator(
    _args: CycleArgs,
    _kind: RequestKind,
    _config: LocatorConfig,
    _format: OutputFormat,
) -> CliResult<i32> {
    Err(CliError::new(
        crate::exit::TRANSPORT_ERROR,
        "serial access is only implemented for Unix targets",
    ))
}

/// Returns false once `cancel` trips.
#[cfg_attr(not(unix), allow(dead_code))]
fn sleep_unless_cancelled(duration: Duration, cancel: &CancelToken) -> bool {
    let until = Instant::now() + duration;
    while !cancel.is_cancelled() {
        let now = Instant::now();
        if now >= until {
            return true;
        }
        std::thread::sleep((until - now).min(Duration::from_millis(50)));
    }
    false
}

#[cfg_attr(not(unix), allow(dead_code))]
fn install_ctrlc_handler(cancel: CancelToken) -> CliResult<()> {
    ctrlc::set_handler(move || cancel.cancel()).map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
