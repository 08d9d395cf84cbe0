use std::path::Path;

use serde::Serialize;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: &'static str,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    port: String,
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let checks = run_checks(&args.port, args.baud);

    let has_fail = checks.iter().any(|c| c.status == CheckStatus::Fail);
    let output = DoctorOutput {
        port: args.port.display().to_string(),
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn run_checks(port: &Path, baud: u32) -> Vec<CheckResult> {
    let mut checks = vec![platform_transport_check()];

    let exists = port_exists_check(port);
    let present = exists.status == CheckStatus::Pass;
    checks.push(exists);

    if present {
        checks.push(char_device_check(port));
        checks.push(open_configure_check(port, baud));
    } else {
        checks.push(CheckResult::new("char_device", CheckStatus::Skip, "port missing"));
        checks.push(CheckResult::new("open_configure", CheckStatus::Skip, "port missing"));
    }

    checks.push(compiled_features_check());
    checks
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("dwmtlv doctor ({})\n", output.port);
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<18} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}

fn platform_transport_check() -> CheckResult {
    if cfg!(unix) {
        CheckResult::new("platform_transport", CheckStatus::Pass, "POSIX termios available")
    } else {
        CheckResult::new(
            "platform_transport",
            CheckStatus::Fail,
            "serial backend not implemented on this platform",
        )
    }
}

fn port_exists_check(port: &Path) -> CheckResult {
    match std::fs::metadata(port) {
        Ok(_) => CheckResult::new("port_exists", CheckStatus::Pass, "device node present"),
        Err(err) => CheckResult::new(
            "port_exists",
            CheckStatus::Fail,
            format!("{}: {err}", port.display()),
        ),
    }
}

#[cfg(unix)]
fn char_device_check(port: &Path) -> CheckResult {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::metadata(port) {
        Ok(meta) if meta.file_type().is_char_device() => {
            CheckResult::new("char_device", CheckStatus::Pass, "character device")
        }
        Ok(_) => CheckResult::new("char_device", CheckStatus::Fail, "not a character device"),
        Err(err) => CheckResult::new("char_device", CheckStatus::Fail, err.to_string()),
    }
}

#[cfg(not(unix))]
fn char_device_check(_port: &Path) -> CheckResult {
    CheckResult::new("char_device", CheckStatus::Skip, "not checked on this platform")
}

#[cfg(unix)]
fn open_configure_check(port: &Path, baud: u32) -> CheckResult {
    use dwmtlv_transport::{SerialConfig, SerialPort};

    let config = SerialConfig {
        baud_rate: baud,
        ..SerialConfig::default()
    };
    match SerialPort::open(port, &config) {
        Ok(_) => CheckResult::new(
            "open_configure",
            CheckStatus::Pass,
            format!("raw mode at {baud} baud"),
        ),
        Err(err) => CheckResult::new("open_configure", CheckStatus::Fail, err.to_string()),
    }
}

#[cfg(not(unix))]
fn open_configure_check(_port: &Path, _baud: u32) -> CheckResult {
    CheckResult::new("open_configure", CheckStatus::Skip, "not checked on this platform")
}

fn compiled_features_check() -> CheckResult {
    let mut features = Vec::new();
    if cfg!(feature = "cli") {
        features.push("cli");
    }

    CheckResult::new("compiled_features", CheckStatus::Info, features.join(", "))
}
