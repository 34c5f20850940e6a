//! Output formatting for CLI

use clap::ValueEnum;
use geotest_driver::{Capability, Driver, DriverManager};
use geotest_harness::{FailureEntry, RunContext, RunCounters};
use serde::Serialize;
use std::io::Write;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// The console report
    #[default]
    Text,
    /// JSON document on stdout
    Json,
}

#[derive(Serialize)]
struct SessionReport<'a> {
    totals: RunCounters,
    failures: Vec<&'a FailureEntry>,
}

/// Session totals and failures as one JSON document.
pub fn write_session_json<W: Write>(out: &mut W, ctx: &RunContext) -> anyhow::Result<()> {
    let report = SessionReport {
        totals: ctx.session_totals(),
        failures: ctx.summary().failures().collect(),
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

#[derive(Serialize)]
struct DriverRow {
    short_name: String,
    long_name: String,
    capabilities: Vec<Capability>,
}

impl DriverRow {
    fn of(driver: &dyn Driver) -> Self {
        Self {
            short_name: driver.short_name().to_string(),
            long_name: driver.long_name().to_string(),
            capabilities: Capability::ALL
                .into_iter()
                .filter(|c| driver.has_capability(*c))
                .collect(),
        }
    }
}

pub fn write_drivers<W: Write>(out: &mut W, manager: &DriverManager, format: OutputFormat) -> anyhow::Result<()> {
    let rows: Vec<_> = manager.drivers().map(|d| DriverRow::of(d.as_ref())).collect();
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &rows)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            for row in rows {
                let caps: Vec<_> = row.capabilities.iter().map(ToString::to_string).collect();
                writeln!(out, "{:<8} {:<24} {}", row.short_name, row.long_name, caps.join(","))?;
            }
        }
    }
    Ok(())
}
