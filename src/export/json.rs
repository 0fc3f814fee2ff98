use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use crate::state::{SessionStats, Summary, Target};

/// JSON document written by `--json`
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    target: &'a Target,
    started_at: String,
    summary: Summary,
    samples_ms: &'a [f64],
}

/// Export a finished run as JSON
pub fn export_json<W: Write>(target: &Target, stats: &SessionStats, writer: W) -> Result<()> {
    let report = JsonReport {
        target,
        started_at: stats.started_at.to_rfc3339(),
        summary: stats.summary(),
        samples_ms: &stats.samples,
    };
    serde_json::to_writer_pretty(writer, &report)?;
    Ok(())
}
