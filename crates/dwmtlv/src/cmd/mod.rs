use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use dwmtlv_client::RequestKind;
use dwmtlv_transport::{DEFAULT_BAUD_RATE, DEFAULT_PORT};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod doctor;
pub mod locate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Repeatedly request position and anchor distances (dwm_loc_get).
    Loc(CycleArgs),
    /// Repeatedly request the node position only (dwm_pos_get).
    Pos(CycleArgs),
    /// Check that the serial port is present and usable.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Loc(args) => locate::run(args, RequestKind::Location, format),
        Command::Pos(args) => locate::run(args, RequestKind::Position, format),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct CycleArgs {
    /// Serial device of the module.
    #[arg(env = "DWMTLV_PORT", default_value = DEFAULT_PORT)]
    pub port: PathBuf,
    /// Line speed.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Exit after N reports.
    #[arg(long, short = 'n')]
    pub count: Option<u64>,
    /// Pause between cycles (e.g. 100ms, 1s, 0).
    #[arg(long, default_value = "100ms")]
    pub interval: String,
    /// Give up on a frame after this long (e.g. 2s). Default: wait indefinitely.
    #[arg(long)]
    pub frame_timeout: Option<String>,
    /// Read anchor-with-position records 13 bytes apart instead of 20.
    #[arg(long)]
    pub legacy_stride: bool,
    /// Reopen the port after the device goes away instead of exiting.
    #[arg(long)]
    pub reconnect: bool,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Serial device to check.
    #[arg(env = "DWMTLV_PORT", default_value = DEFAULT_PORT)]
    pub port: PathBuf,
    /// Line speed to configure.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `150ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}
