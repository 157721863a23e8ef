// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Span factory and result recording for benchmark executions.

use tracing::{info_span, Span};

use crate::result::RunResult;

/// Extension trait for recording outcomes into a span.
pub trait SpanExt {
    /// Record a finished benchmark's status, duration and cause.
    fn record_outcome(&self, result: &RunResult);
}

impl SpanExt for Span {
    fn record_outcome(&self, result: &RunResult) {
        self.record("status", result.status.as_str());
        self.record("duration_ms", result.duration.as_millis() as u64);
        if let Some(cause) = &result.cause {
            self.record("error.message", cause.to_string().as_str());
        }
    }
}

/// Factory for benchmark spans.
pub struct BenchmarkSpan;

impl BenchmarkSpan {
    /// Fields `status`, `error.message` and `duration_ms` are filled in by
    /// [`SpanExt::record_outcome`].
    pub fn new(run_id: &str, benchmark_id: &str, namespace: &str) -> Span {
        info_span!(
            "benchmark",
            run_id = %run_id,
            benchmark_id = %benchmark_id,
            namespace = %namespace,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        )
    }
}
