// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-benchmark state machine.
//!
//! ```text
//! Pending → PreChecking → SettingUp → Running → Verifying → CleaningUp → Done
//! ```
//!
//! The active stages (PreChecking through Verifying) share one deadline and
//! race the run's cancellation token. Cleanup runs exactly once on every path
//! that got past Pending, under its own grace deadline, and its problems only
//! ever become warnings.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use crate::benchmark::{BenchContext, Descriptor, Verdict};
use crate::result::{ErrorCause, RunResult, Status};
use crate::telemetry::{self, BenchmarkSpan, SpanExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    PreChecking,
    SettingUp,
    Running,
    Verifying,
    CleaningUp,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::PreChecking => "pre_checking",
            Self::SettingUp => "setting_up",
            Self::Running => "running",
            Self::Verifying => "verifying",
            Self::CleaningUp => "cleaning_up",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Current stage, readable after the driving future has been dropped.
#[derive(Debug)]
pub(crate) struct StageTracker(Mutex<Stage>);

impl StageTracker {
    pub(crate) fn new() -> Self {
        Self(Mutex::new(Stage::Pending))
    }

    pub(crate) fn enter(&self, next: Stage) {
        let mut stage = self.0.lock();
        let prev = *stage;
        debug!(from = %prev, to = %next, "stage transition");
        *stage = next;
    }

    pub(crate) fn current(&self) -> Stage {
        *self.0.lock()
    }
}

/// Deadlines applied to one execution.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    pub benchmark_timeout: Duration,
    pub cleanup_grace: Duration,
}

/// How the active stages ended.
#[derive(Debug)]
enum Outcome {
    Judged(Verdict),
    Skipped(ErrorCause),
    Errored(ErrorCause),
}

/// Active stages. Returns as soon as one fails.
async fn drive(desc: &Descriptor, ctx: &BenchContext, stage: &StageTracker) -> Outcome {
    let behavior = desc.behavior();

    stage.enter(Stage::PreChecking);
    if let Err(e) = behavior.pre_run(ctx).await {
        return Outcome::Skipped(e.into());
    }

    stage.enter(Stage::SettingUp);
    if let Err(e) = ctx.provision_primary().await {
        return Outcome::Errored(e.into());
    }
    if let Err(e) = behavior.setup(ctx).await {
        return Outcome::Errored(e.into());
    }

    stage.enter(Stage::Running);
    let verdict = match behavior.run(ctx).await {
        Ok(verdict) => verdict,
        Err(e) => return Outcome::Errored(e.into()),
    };

    stage.enter(Stage::Verifying);
    match behavior.verify(ctx, verdict).await {
        Ok(verdict) => Outcome::Judged(verdict),
        Err(e) => Outcome::Errored(e.into()),
    }
}

/// Cleanup hook, then every engine-owned namespace. Returns warnings.
async fn release(desc: &Descriptor, ctx: &BenchContext) -> Vec<String> {
    let mut warnings = Vec::new();

    // A panicking hook must not keep the namespaces from being deleted.
    match AssertUnwindSafe(desc.behavior().cleanup(ctx)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warnings.push(format!("cleanup hook failed: {}", e)),
        Err(payload) => {
            warnings.push(format!("cleanup hook panicked: {}", panic_detail(payload)))
        }
    }
    for namespace in ctx.owned_namespaces() {
        match ctx.probe().delete_namespace(&namespace).await {
            Ok(()) => debug!(namespace = %namespace, "namespace deleted"),
            Err(e) if e.is_not_found() => {}
            Err(e) => warnings.push(format!("failed to delete namespace {}: {}", namespace, e)),
        }
    }
    warnings
}

fn panic_detail(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run one benchmark through its whole lifecycle and produce its result.
pub(crate) async fn execute(
    desc: Arc<Descriptor>,
    ctx: BenchContext,
    limits: Limits,
    cancel: CancellationToken,
) -> RunResult {
    let span = BenchmarkSpan::new(ctx.run_id().as_str(), &desc.id, ctx.namespace());
    let recorder = span.clone();

    async move {
        let started = Instant::now();
        let stage = StageTracker::new();

        let active = AssertUnwindSafe(drive(&desc, &ctx, &stage)).catch_unwind();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(stage = %stage.current(), "cancelled while in flight");
                Outcome::Errored(ErrorCause::Cancelled)
            }
            res = tokio::time::timeout(limits.benchmark_timeout, active) => match res {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(payload)) => {
                    let detail = panic_detail(payload);
                    warn!(stage = %stage.current(), panic = %detail, "benchmark panicked");
                    Outcome::Errored(ErrorCause::Panicked { detail })
                }
                Err(_) => {
                    warn!(
                        stage = %stage.current(),
                        timeout_secs = limits.benchmark_timeout.as_secs_f64(),
                        "benchmark timed out"
                    );
                    Outcome::Errored(ErrorCause::Timeout { after: limits.benchmark_timeout })
                }
            },
        };

        stage.enter(Stage::CleaningUp);
        let warnings = match tokio::time::timeout(limits.cleanup_grace, release(&desc, &ctx)).await {
            Ok(warnings) => warnings,
            Err(_) => vec![format!(
                "cleanup did not finish within {:?}; cluster objects may remain",
                limits.cleanup_grace
            )],
        };
        for w in &warnings {
            warn!(warning = %w, "cleanup problem");
        }
        stage.enter(Stage::Done);

        let result = finish(&desc, &ctx, outcome, warnings, started.elapsed());
        recorder.record_outcome(&result);
        telemetry::record_benchmark_result(result.status, result.duration);
        telemetry::record_cleanup_warnings(result.warnings.len());
        debug!(status = %result.status, "benchmark finished");
        result
    }
    .instrument(span)
    .await
}

fn finish(
    desc: &Descriptor,
    ctx: &BenchContext,
    outcome: Outcome,
    warnings: Vec<String>,
    duration: Duration,
) -> RunResult {
    let (status, finding, cause) = match outcome {
        Outcome::Judged(Verdict::Pass) => (Status::Pass, None, None),
        Outcome::Judged(Verdict::Fail(finding)) => (Status::Fail, Some(finding), None),
        Outcome::Skipped(cause) => (Status::Skip, None, Some(cause)),
        Outcome::Errored(cause) => (Status::Error, None, Some(cause)),
    };
    RunResult {
        id: desc.id.clone(),
        title: desc.title.clone(),
        category: desc.category.clone(),
        profile_level: desc.profile_level,
        namespace: ctx.namespace().to_string(),
        status,
        remediation: (status == Status::Fail).then(|| desc.remediation.clone()),
        finding,
        cause,
        warnings,
        duration,
    }
}

/// Result for a benchmark that never left Pending.
pub(crate) fn not_started(desc: &Descriptor, namespace: String, cause: ErrorCause) -> RunResult {
    RunResult {
        id: desc.id.clone(),
        title: desc.title.clone(),
        category: desc.category.clone(),
        profile_level: desc.profile_level,
        namespace,
        status: Status::Skip,
        remediation: None,
        finding: None,
        cause: Some(cause),
        warnings: Vec::new(),
        duration: Duration::ZERO,
    }
}

/// Result for a benchmark whose task ended without reporting, e.g. when the
/// runtime aborted it.
pub(crate) fn lost(desc: &Descriptor, namespace: String, detail: String) -> RunResult {
    RunResult {
        status: Status::Error,
        ..not_started(desc, namespace, ErrorCause::Aborted { detail })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::{Benchmark, BenchmarkError};

    struct Idle;

    #[async_trait::async_trait]
    impl Benchmark for Idle {
        async fn run(&self, _ctx: &BenchContext) -> Result<Verdict, BenchmarkError> {
            Ok(Verdict::Pass)
        }
    }

    #[test]
    fn test_stage_tracker() {
        let tracker = StageTracker::new();
        assert_eq!(tracker.current(), Stage::Pending);
        tracker.enter(Stage::Running);
        assert_eq!(tracker.current(), Stage::Running);
        assert_eq!(Stage::CleaningUp.to_string(), "cleaning_up");
    }

    #[test]
    fn test_lost_task_is_error_not_panic() {
        let desc = Descriptor::builder("T-1", "Lost")
            .category("TST", "Test")
            .build(Idle);
        let result = lost(&desc, "mtb-t-1".to_string(), "task 7 was cancelled".to_string());

        assert_eq!(result.status, Status::Error);
        assert_eq!(
            result.cause,
            Some(ErrorCause::Aborted { detail: "task 7 was cancelled".to_string() })
        );
        assert!(result.remediation.is_none());
    }

    #[test]
    fn test_panic_detail() {
        assert_eq!(panic_detail(Box::new("boom")), "boom");
        assert_eq!(panic_detail(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_detail(Box::new(7u8)), "non-string panic payload");
    }
}
