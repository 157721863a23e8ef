// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metrics emitted through the `metrics` facade.
//!
//! No recorder is installed by this crate; embedders that install one get
//! these series, everyone else pays a no-op.

use std::time::Duration;

use ::metrics::{counter, describe_counter, describe_histogram, histogram};

use crate::result::Status;

pub const RESULTS_TOTAL: &str = "mtb_benchmark_results_total";
pub const DURATION_SECONDS: &str = "mtb_benchmark_duration_seconds";
pub const CLEANUP_WARNINGS_TOTAL: &str = "mtb_cleanup_warnings_total";

/// Register metric descriptions with the installed recorder.
pub fn init_metrics() {
    describe_counter!(RESULTS_TOTAL, "Benchmarks finished, by status");
    describe_histogram!(DURATION_SECONDS, "Wall time of one benchmark lifecycle");
    describe_counter!(CLEANUP_WARNINGS_TOTAL, "Cleanup problems recorded as warnings");
}

pub fn record_benchmark_result(status: Status, duration: Duration) {
    counter!(RESULTS_TOTAL, "status" => status.as_str()).increment(1);
    histogram!(DURATION_SECONDS, "status" => status.as_str()).record(duration.as_secs_f64());
}

pub fn record_cleanup_warnings(count: usize) {
    if count > 0 {
        counter!(CLEANUP_WARNINGS_TOTAL).increment(count as u64);
    }
}
