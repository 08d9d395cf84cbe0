//! Run a single location cycle and print the result.
//!
//! Run with:
//!   cargo run --example locate-once -- /dev/ttyACM0

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use dwmtlv::client::{open, CycleOutcome};

    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| dwmtlv::transport::DEFAULT_PORT.to_string());

    let mut locator = open(&port)?;
    eprintln!("Connected to {port}");

    match locator.locate()? {
        CycleOutcome::Complete(report) => {
            match report.position {
                Some(p) => println!("x: {}\t y: {}\t z: {}\t q: {}", p.x, p.y, p.z, p.quality),
                None => println!("no position"),
            }
            for anchor in &report.anchors {
                println!("{anchor:?}");
            }
        }
        CycleOutcome::Aborted(reason) => eprintln!("Cycle aborted: {reason}"),
    }

    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("serial access is only implemented for Unix targets");
}
