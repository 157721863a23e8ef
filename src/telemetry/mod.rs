// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structured logging, per-benchmark spans and metrics.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    init_metrics, record_benchmark_result, record_cleanup_warnings, CLEANUP_WARNINGS_TOTAL,
    DURATION_SECONDS, RESULTS_TOTAL,
};
pub use spans::{BenchmarkSpan, SpanExt};
