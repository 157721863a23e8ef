// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Multi-tenancy benchmark engine.
//!
//! Checks whether a Kubernetes cluster enforces tenant isolation by running a
//! catalog of small benchmarks, each against its own throwaway namespace.
//!
//! # Pieces
//!
//! - **Registry**: every known [`Descriptor`], validated and read-only after
//!   init
//! - **Selector**: filters the registry by profile level and category,
//!   preserving registration order
//! - **Execution engine**: drives each benchmark through
//!   PreCheck, Setup, Run, Verify and Cleanup with timeouts, cancellation and
//!   panic containment
//! - **Cluster probe**: the only way benchmarks reach the cluster, either
//!   the Kubernetes API or an in-memory simulation
//! - **Result aggregator**: collects results and returns them in selection
//!   order
//!
//! # Guarantees
//!
//! - Cleanup runs once for every benchmark that got past scheduling,
//!   whatever happened before it
//! - Cleanup failures become warnings and never change a status
//! - A benchmark that panics or hangs never affects its siblings

pub mod benchmark;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod engine;
pub mod probe;
pub mod registry;
pub mod result;
pub mod selector;
pub mod shutdown;
pub mod suite;
pub mod telemetry;

pub use benchmark::{
    BenchContext, Benchmark, BenchmarkError, BenchmarkType, Descriptor, ProfileLevel, Verdict,
};
pub use engine::{EngineConfig, ExecutionEngine, RunId};
pub use probe::{ClusterProbe, InMemoryCluster, KubeApiProbe, ProbeError, ProbeErrorKind};
pub use registry::{Registry, RegistryError};
pub use result::{ErrorCause, ResultAggregator, RunResult, Status, Summary, SuiteReport};
pub use selector::{ConfigurationError, SelectionCriteria};
pub use suite::Suite;
