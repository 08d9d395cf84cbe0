use std::io::{IsTerminal, Write};
use std::ops::ControlFlow;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dwmtlv_client::{AbortReason, AnchorRecord, ClientError, LocationReport, ReportSink};
use dwmtlv_payload::Position;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReportOutput<'a> {
    cycle: u64,
    timestamp: String,
    position: Option<&'a Position>,
    anchors: &'a [AnchorRecord],
}

#[derive(Serialize)]
struct AbortOutput {
    cycle: u64,
    timestamp: String,
    aborted: AbortReason,
}

/// Prints each cycle result to `out` and stops after `limit` reports.
pub struct ReportPrinter<W> {
    out: W,
    format: OutputFormat,
    limit: Option<u64>,
    cycle: u64,
    reports: u64,
}

impl<W: Write> ReportPrinter<W> {
    pub fn new(out: W, format: OutputFormat, limit: Option<u64>) -> Self {
        Self {
            out,
            format,
            limit,
            cycle: 0,
            reports: 0,
        }
    }

    /// Reports printed so far.
    pub fn reports(&self) -> u64 {
        self.reports
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.reports >= limit)
    }

    fn write_report(&mut self, report: &LocationReport) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let out = ReportOutput {
                    cycle: self.cycle,
                    timestamp: now_unix_millis(),
                    position: report.position.as_ref(),
                    anchors: &report.anchors,
                };
                let line = serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string());
                writeln!(self.out, "{line}")
            }
            OutputFormat::Table => writeln!(self.out, "{}", report_table(report)),
            OutputFormat::Pretty => write_pretty(&mut self.out, report),
            OutputFormat::Raw => writeln!(self.out, "{}", raw_line(report)),
        }?;
        self.out.flush()
    }

    fn write_abort(&mut self, reason: AbortReason) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let out = AbortOutput {
                    cycle: self.cycle,
                    timestamp: now_unix_millis(),
                    aborted: reason,
                };
                let line = serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string());
                writeln!(self.out, "{line}")?;
                self.out.flush()
            }
            _ => {
                eprintln!("cycle {} aborted: {reason}", self.cycle);
                Ok(())
            }
        }
    }
}

impl<W: Write> ReportSink for ReportPrinter<W> {
    fn report(&mut self, report: &LocationReport) -> ControlFlow<()> {
        self.cycle += 1;
        if self.write_report(report).is_err() {
            // stdout closed.
            return ControlFlow::Break(());
        }
        self.reports += 1;
        if self.limit_reached() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn aborted(&mut self, reason: AbortReason) -> ControlFlow<()> {
        self.cycle += 1;
        match self.write_abort(reason) {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        }
    }

    fn cycle_failed(&mut self, error: &ClientError) -> ControlFlow<()> {
        self.cycle += 1;
        eprintln!("cycle {} failed: {error}", self.cycle);
        ControlFlow::Continue(())
    }
}

fn report_table(report: &LocationReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["NODE", "DISTANCE", "DQ", "X", "Y", "Z", "Q"]);

    if let Some(p) = &report.position {
        let mut row = vec!["self".to_string(), "-".to_string(), "-".to_string()];
        row.extend(position_cells(p));
        table.add_row(row);
    }

    for anchor in &report.anchors {
        let row = match anchor {
            AnchorRecord::Distance(a) => {
                let mut row = vec![a.address.to_string(), a.distance.to_string(), a.quality.to_string()];
                row.extend(["-", "-", "-", "-"].map(String::from));
                row
            }
            AnchorRecord::DistanceWithPosition(a) => {
                let mut row = vec![a.address.to_string(), a.distance.to_string(), a.quality.to_string()];
                row.extend(position_cells(&a.position));
                row
            }
        };
        table.add_row(row);
    }
    table
}

fn position_cells(p: &Position) -> [String; 4] {
    [
        p.x.to_string(),
        p.y.to_string(),
        p.z.to_string(),
        p.quality.to_string(),
    ]
}

/// Fixed-width columns under an underlined header.
fn write_pretty(out: &mut impl Write, report: &LocationReport) -> std::io::Result<()> {
    match &report.position {
        Some(p) => {
            writeln!(out, "{:_<15} {:_<15} {:_<15} {:_<5}", "x", "y", "z", "q")?;
            writeln!(out, "{:<15} {:<15} {:<15} {:<5}", p.x, p.y, p.z, p.quality)?;
        }
        None => writeln!(out, "no position")?,
    }

    match report.anchors.first() {
        None => writeln!(out, "no distances")?,
        Some(AnchorRecord::Distance(_)) => {
            writeln!(out, "{:=<16} {:=<15} {:=<5}", "addr", "d", "dq")?;
        }
        Some(AnchorRecord::DistanceWithPosition(_)) => writeln!(
            out,
            "{:=<16} {:=<15} {:=<5} {:=<15} {:=<15} {:=<15} {:=<5}",
            "addr", "d", "dq", "x", "y", "z", "q"
        )?,
    }
    for anchor in &report.anchors {
        match anchor {
            AnchorRecord::Distance(a) => {
                writeln!(
                    out,
                    "{:<16} {:<15} {:<5}",
                    a.address.to_string(),
                    a.distance,
                    a.quality
                )?;
            }
            AnchorRecord::DistanceWithPosition(a) => writeln!(
                out,
                "{:<16} {:<15} {:<5} {:<15} {:<15} {:<15} {:<5}",
                a.address.to_string(),
                a.distance,
                a.quality,
                a.position.x,
                a.position.y,
                a.position.z,
                a.position.quality
            )?,
        }
    }
    writeln!(out)
}

/// One whitespace-separated line: `x y z q` then `addr:d:dq` per anchor.
fn raw_line(report: &LocationReport) -> String {
    let mut fields = Vec::with_capacity(4 + report.anchors.len());
    match &report.position {
        Some(p) => fields.extend(position_cells(p)),
        None => fields.extend(["-", "-", "-", "-"].map(String::from)),
    }
    for anchor in &report.anchors {
        fields.push(match anchor {
            AnchorRecord::Distance(a) => format!("{}:{}:{}", a.address, a.distance, a.quality),
            AnchorRecord::DistanceWithPosition(a) => {
                format!("{}:{}:{}", a.address, a.distance, a.quality)
            }
        });
    }
    fields.join(" ")
}

fn now_unix_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
