use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    target: String,
    rustc: &'static str,
    git_hash: &'static str,
    default_port: &'static str,
    default_baud_rate: u32,
    features: Vec<&'static str>,
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.extended {
        println!("dwmtlv {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let output = VersionOutput {
        name: "dwmtlv",
        version: env!("CARGO_PKG_VERSION"),
        target: target_triple(),
        rustc: option_env!("RUSTC_VERSION").unwrap_or("unknown"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        default_port: dwmtlv_transport::DEFAULT_PORT,
        default_baud_rate: dwmtlv_transport::DEFAULT_BAUD_RATE,
        features: active_features(),
    };

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&output).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty | OutputFormat::Raw => {
            println!("name: {}", output.name);
            println!("version: {}", output.version);
            println!("target: {}", output.target);
            println!("rustc: {}", output.rustc);
            println!("git_hash: {}", output.git_hash);
            println!("default_port: {}", output.default_port);
            println!("default_baud_rate: {}", output.default_baud_rate);
            println!("features: {}", output.features.join(", "));
        }
    }

    Ok(SUCCESS)
}

fn target_triple() -> String {
    if let Some(target) = option_env!("DWMTLV_BUILD_TARGET") {
        return target.to_string();
    }

    match (std::env::consts::ARCH, std::env::consts::OS) {
        ("aarch64", "macos") => "aarch64-apple-darwin".to_string(),
        ("x86_64", "macos") => "x86_64-apple-darwin".to_string(),
        ("aarch64", "linux") => "aarch64-unknown-linux-gnu".to_string(),
        ("x86_64", "linux") => "x86_64-unknown-linux-gnu".to_string(),
        ("arm", "linux") => "arm-unknown-linux-gnueabihf".to_string(),
        (arch, os) => format!("{arch}-unknown-{os}"),
    }
}

fn active_features() -> Vec<&'static str> {
    let mut features = Vec::new();
    if cfg!(feature = "cli") {
        features.push("cli");
    }
    features
}
