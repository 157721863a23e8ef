// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Execution engine.
//!
//! Runs a selection of benchmarks against a [`ClusterProbe`], each through
//! the lifecycle in [`lifecycle`], with:
//! - a bounded worker pool (`concurrency` permits; tasks start in selection
//!   order)
//! - a per-benchmark deadline and a separate cleanup grace period
//! - panic containment per benchmark
//! - external cancellation through a [`CancellationToken`]
//!
//! Results are re-sorted into selection order before the report is returned.

pub mod lifecycle;
pub mod namespace;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::benchmark::{BenchContext, Descriptor, PollConfig};
use crate::probe::{ClusterProbe, TenantIdentity};
use crate::result::{ErrorCause, ResultAggregator, SuiteReport};
use crate::shutdown::ShutdownCoordinator;

pub use lifecycle::Stage;
pub use namespace::RunId;

use lifecycle::Limits;

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum benchmarks in flight. 1 runs sequentially.
    pub concurrency: usize,
    /// Deadline for PreChecking through Verifying.
    pub benchmark_timeout: Duration,
    /// Deadline for cleanup, also the drain budget after cancellation.
    pub cleanup_grace: Duration,
    pub poll: PollConfig,
    pub tenant: TenantIdentity,
    /// Fixed run suffix; a fresh one is generated per run when unset.
    pub run_id: Option<RunId>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            benchmark_timeout: Duration::from_secs(60),
            cleanup_grace: Duration::from_secs(30),
            poll: PollConfig::default(),
            tenant: TenantIdentity::default(),
            run_id: None,
        }
    }
}

pub struct ExecutionEngine {
    probe: Arc<dyn ClusterProbe>,
    config: EngineConfig,
    shutdown: ShutdownCoordinator,
}

impl ExecutionEngine {
    pub fn new(probe: Arc<dyn ClusterProbe>, config: EngineConfig) -> Self {
        Self {
            probe,
            config,
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// Share in-flight tracking with an outer coordinator.
    pub fn with_shutdown(mut self, shutdown: ShutdownCoordinator) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Run `selection` to completion.
    pub async fn run(&self, selection: &[Arc<Descriptor>]) -> SuiteReport {
        self.run_with_cancel(selection, CancellationToken::new()).await
    }

    /// Run `selection`, stopping early when `cancel` fires.
    ///
    /// Benchmarks not yet started when `cancel` fires are reported as `Skip`;
    /// in-flight ones as `Error`, after their cleanup has had its grace period.
    pub async fn run_with_cancel(
        &self,
        selection: &[Arc<Descriptor>],
        cancel: CancellationToken,
    ) -> SuiteReport {
        let run_id = self.config.run_id.clone().unwrap_or_else(RunId::generate);
        let started_at = Utc::now();
        let concurrency = self.config.concurrency.max(1);
        let limits = Limits {
            benchmark_timeout: self.config.benchmark_timeout,
            cleanup_grace: self.config.cleanup_grace,
        };

        info!(
            run_id = %run_id,
            benchmarks = selection.len(),
            concurrency,
            "starting benchmark run"
        );

        let aggregator = Arc::new(ResultAggregator::new());
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();

        for desc in selection {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let admitted = match permit {
                Some(permit) => self.shutdown.track().map(|guard| (permit, guard)),
                None => None,
            };
            let Some((permit, guard)) = admitted else {
                aggregator.add(lifecycle::not_started(
                    desc,
                    run_id.namespace_for(&desc.id),
                    ErrorCause::Cancelled,
                ));
                continue;
            };

            let ctx = BenchContext::new(
                self.probe.clone(),
                &desc.id,
                run_id.clone(),
                self.config.tenant.clone(),
                self.config.poll,
            );
            let desc = desc.clone();
            let cancel = cancel.clone();
            let aggregator = aggregator.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let _guard = guard;
                let result = lifecycle::execute(desc, ctx, limits, cancel).await;
                aggregator.add(result);
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "benchmark task failed");
                failures.push(e.to_string());
            }
        }

        // Every task has been joined, so this is the last handle.
        let aggregator = Arc::try_unwrap(aggregator)
            .unwrap_or_else(|shared| ResultAggregator::from(shared.snapshot()));

        for desc in selection {
            if !aggregator.contains(&desc.id) {
                let detail = if failures.is_empty() {
                    "task ended without reporting".to_string()
                } else {
                    failures.join("; ")
                };
                aggregator.add(lifecycle::lost(desc, run_id.namespace_for(&desc.id), detail));
            }
        }

        let order: Vec<&str> = selection.iter().map(|d| d.id.as_str()).collect();
        let report = aggregator.into_report(run_id, started_at, &order, cancel.is_cancelled());
        info!(
            run_id = %report.run_id,
            passed = report.summary.passed,
            failed = report.summary.failed,
            errored = report.summary.errored,
            skipped = report.summary.skipped,
            "benchmark run finished"
        );
        report
    }
}
