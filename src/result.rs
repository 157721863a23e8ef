// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-benchmark results and suite-level aggregation.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::benchmark::{BenchmarkError, ProfileLevel};
use crate::engine::namespace::RunId;
use crate::probe::ProbeError;

/// Terminal status of one benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pass,
    Fail,
    Error,
    Skip,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Error => "error",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a benchmark ended in `Error` or `Skip`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorCause {
    Probe { error: ProbeError },
    /// The engine's per-benchmark deadline elapsed.
    Timeout {
        #[serde(with = "duration_secs")]
        after: Duration,
    },
    Precondition { detail: String },
    Logic { detail: String },
    Cancelled,
    Panicked { detail: String },
    /// The benchmark task ended without producing a result.
    Aborted { detail: String },
}

impl ErrorCause {
    /// Engine deadline or a probe call that timed out.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Probe { error } => error.is_timeout(),
            _ => false,
        }
    }
}

impl From<BenchmarkError> for ErrorCause {
    fn from(err: BenchmarkError) -> Self {
        match err {
            BenchmarkError::Probe(error) => Self::Probe { error },
            BenchmarkError::Precondition(detail) => Self::Precondition { detail },
            BenchmarkError::Logic(detail) => Self::Logic { detail },
        }
    }
}

impl From<ProbeError> for ErrorCause {
    fn from(error: ProbeError) -> Self {
        Self::Probe { error }
    }
}

impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probe { error } => write!(f, "probe error ({})", error),
            Self::Timeout { after } => write!(f, "timed out after {:?}", after),
            Self::Precondition { detail } => write!(f, "precondition not met: {}", detail),
            Self::Logic { detail } => write!(f, "benchmark logic error: {}", detail),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Panicked { detail } => write!(f, "panicked: {}", detail),
            Self::Aborted { detail } => write!(f, "aborted: {}", detail),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

/// Outcome of one benchmark. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub id: String,
    pub title: String,
    pub category: String,
    pub profile_level: ProfileLevel,
    pub namespace: String,
    pub status: Status,
    /// Remediation guidance; present only on `Fail`.
    pub remediation: Option<String>,
    /// What the benchmark observed on `Fail`.
    pub finding: Option<String>,
    pub cause: Option<ErrorCause>,
    /// Cleanup problems. Never change `status`.
    pub warnings: Vec<String>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

/// Counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
    pub total: usize,
}

impl Summary {
    fn count(&mut self, status: Status) {
        match status {
            Status::Pass => self.passed += 1,
            Status::Fail => self.failed += 1,
            Status::Error => self.errored += 1,
            Status::Skip => self.skipped += 1,
        }
        self.total += 1;
    }

    pub fn of(results: &[RunResult]) -> Self {
        let mut summary = Self::default();
        for r in results {
            summary.count(r.status);
        }
        summary
    }
}

/// Everything one run produced. Owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    /// In selection order.
    pub results: Vec<RunResult>,
    pub summary: Summary,
    /// The run was interrupted before every benchmark finished.
    pub cancelled: bool,
}

impl SuiteReport {
    /// No benchmark failed or errored.
    pub fn is_success(&self) -> bool {
        self.summary.failed == 0 && self.summary.errored == 0
    }

    pub fn result(&self, id: &str) -> Option<&RunResult> {
        self.results.iter().find(|r| r.id == id)
    }
}

/// Collects results from concurrent producers.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Mutex<Vec<RunResult>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, result: RunResult) {
        self.results.lock().push(result);
    }

    pub fn summary(&self) -> Summary {
        Summary::of(&self.results.lock())
    }

    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.lock().is_empty()
    }

    /// Copy of the results collected so far, in arrival order.
    pub fn snapshot(&self) -> Vec<RunResult> {
        self.results.lock().clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.results.lock().iter().any(|r| r.id == id)
    }

    /// Drain into a report, ordering results by position of their id in
    /// `order`. Ids missing from `order` go last, in arrival order.
    pub fn into_report(
        self,
        run_id: RunId,
        started_at: DateTime<Utc>,
        order: &[&str],
        cancelled: bool,
    ) -> SuiteReport {
        let rank: HashMap<&str, usize> = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut results = self.results.into_inner();
        results.sort_by_key(|r| rank.get(r.id.as_str()).copied().unwrap_or(usize::MAX));
        let summary = Summary::of(&results);
        SuiteReport {
            run_id,
            started_at,
            results,
            summary,
            cancelled,
        }
    }
}

impl From<Vec<RunResult>> for ResultAggregator {
    fn from(results: Vec<RunResult>) -> Self {
        Self {
            results: Mutex::new(results),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn result(id: &str, status: Status) -> RunResult {
        RunResult {
            id: id.to_string(),
            title: id.to_string(),
            category: "X".to_string(),
            profile_level: ProfileLevel::MIN,
            namespace: format!("ns-{}", id),
            status,
            remediation: None,
            finding: None,
            cause: None,
            warnings: Vec::new(),
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_summary_counts() {
        let agg = ResultAggregator::new();
        agg.add(result("a", Status::Pass));
        agg.add(result("b", Status::Error));
        agg.add(result("c", Status::Pass));
        agg.add(result("d", Status::Skip));
        assert_eq!(
            agg.summary(),
            Summary { passed: 2, failed: 0, errored: 1, skipped: 1, total: 4 }
        );
    }

    #[test]
    fn test_report_sorted_into_selection_order() {
        let agg = ResultAggregator::new();
        agg.add(result("c", Status::Pass));
        agg.add(result("a", Status::Fail));
        agg.add(result("b", Status::Pass));

        let report = agg.into_report(RunId::from_seed(1), Utc::now(), &["a", "b", "c"], false);
        let ids: Vec<_> = report.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(!report.is_success());
    }

    #[test]
    fn test_concurrent_producers() {
        let agg = Arc::new(ResultAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let agg = agg.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        agg.add(result(&format!("{}-{}", i, j), Status::Pass));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(agg.summary().total, 400);
    }

    #[test]
    fn test_skip_only_report_is_success() {
        let agg = ResultAggregator::new();
        agg.add(result("a", Status::Skip));
        let report = agg.into_report(RunId::from_seed(1), Utc::now(), &["a"], false);
        assert!(report.is_success());
    }

    #[test]
    fn test_cause_timeout_predicate() {
        assert!(ErrorCause::Timeout { after: Duration::from_secs(1) }.is_timeout());
        assert!(ErrorCause::from(ProbeError::timeout("slow")).is_timeout());
        assert!(!ErrorCause::Cancelled.is_timeout());
    }

    #[test]
    fn test_report_serializes() {
        let mut r = result("a", Status::Error);
        r.cause = Some(ErrorCause::Timeout { after: Duration::from_secs(60) });
        let agg = ResultAggregator::new();
        agg.add(r);
        let report = agg.into_report(RunId::from_seed(3), Utc::now(), &["a"], false);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"][0]["status"], "error");
        assert_eq!(json["results"][0]["cause"]["type"], "timeout");
        assert_eq!(json["results"][0]["cause"]["after"], 60.0);
        assert_eq!(json["summary"]["errored"], 1);
    }
}
