// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Human and machine renderings of the catalog and of run reports.

use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

use crate::benchmark::Descriptor;
use crate::result::{RunResult, Status, SuiteReport};

/// Report output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "table" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format `{}` (expected text or json)", other)),
        }
    }
}

/// One line per benchmark, in registry order.
pub fn render_catalog(descriptors: &[Arc<Descriptor>]) -> String {
    let id_width = descriptors
        .iter()
        .map(|d| d.id.len())
        .max()
        .unwrap_or(0)
        .max("ID".len());

    let mut out = String::new();
    let _ = writeln!(out, "{:<id_width$}  {:<5}  {:<20}  TITLE", "ID", "LEVEL", "CATEGORY");
    for d in descriptors {
        let _ = writeln!(
            out,
            "{:<id_width$}  {:<5}  {:<20}  {}",
            d.id,
            d.profile_level.get(),
            d.category_name,
            d.title
        );
    }
    let _ = writeln!(out, "\n{} benchmark(s)", descriptors.len());
    out
}

/// Render a finished run.
///
/// Text output shows remediation for every `Fail` and the cause for every
/// `Error`. JSON output is the serialized report.
pub fn render_report(report: &SuiteReport, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report),
        OutputFormat::Text => Ok(render_text(report)),
    }
}

fn render_text(report: &SuiteReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Run {} started {}",
        report.run_id,
        report.started_at.format("%Y-%m-%dT%H:%M:%SZ")
    );
    if report.cancelled {
        let _ = writeln!(out, "Run was interrupted; unfinished benchmarks were skipped.");
    }
    let _ = writeln!(out);

    for result in &report.results {
        render_result(&mut out, result);
    }

    let s = &report.summary;
    let _ = writeln!(
        out,
        "\n{} passed, {} failed, {} errored, {} skipped ({} total)",
        s.passed, s.failed, s.errored, s.skipped, s.total
    );
    out
}

fn render_result(out: &mut String, result: &RunResult) {
    let _ = writeln!(
        out,
        "[{:<5}] {} {} ({:.1}s)",
        label(result.status),
        result.id,
        result.title,
        result.duration.as_secs_f64()
    );
    match result.status {
        Status::Fail => {
            if let Some(finding) = &result.finding {
                let _ = writeln!(out, "        finding: {}", finding);
            }
            if let Some(remediation) = &result.remediation {
                let _ = writeln!(out, "        remediation: {}", remediation);
            }
        }
        Status::Error | Status::Skip => {
            if let Some(cause) = &result.cause {
                let _ = writeln!(out, "        cause: {}", cause);
            }
        }
        Status::Pass => {}
    }
    for warning in &result.warnings {
        let _ = writeln!(out, "        warning: {}", warning);
    }
}

fn label(status: Status) -> &'static str {
    match status {
        Status::Pass => "PASS",
        Status::Fail => "FAIL",
        Status::Error => "ERROR",
        Status::Skip => "SKIP",
    }
}
