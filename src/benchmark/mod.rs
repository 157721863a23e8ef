// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark descriptors and the behavior contract every check implements.
//!
//! A [`Descriptor`] couples static catalog metadata (id, title, category,
//! profile level, remediation) with a boxed [`Benchmark`] that carries the
//! check's logic. The engine drives the behavior through a fixed lifecycle:
//!
//! ```text
//! pre_run → (engine provisions namespace) → setup → run → verify → cleanup
//! ```
//!
//! Only `run` is mandatory; the other hooks default to no-ops.

mod context;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::probe::ProbeError;

pub use context::{BenchContext, PollConfig};

/// Strictness tier. Lower levels are more fundamental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileLevel(u8);

impl ProfileLevel {
    pub const MIN: ProfileLevel = ProfileLevel(1);
    pub const MAX: ProfileLevel = ProfileLevel(3);

    pub const fn new(level: u8) -> Self {
        Self(level)
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Whether this level is one of the defined tiers.
    pub fn is_defined(&self) -> bool {
        (Self::MIN..=Self::MAX).contains(self)
    }
}

impl fmt::Display for ProfileLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a benchmark gathers evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BenchmarkType {
    /// Inspects cluster configuration (objects, access reviews).
    ConfigurationCheck,
    /// Attempts an action as the tenant and observes enforcement.
    BehavioralCheck,
}

impl fmt::Display for BenchmarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigurationCheck => f.write_str("Configuration Check"),
            Self::BehavioralCheck => f.write_str("Behavioral Check"),
        }
    }
}

/// The substantive judgment of a benchmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Isolation is enforced.
    Pass,
    /// Isolation is violated; carries what was observed.
    Fail(String),
}

impl Verdict {
    pub fn fail(finding: impl Into<String>) -> Self {
        Self::Fail(finding.into())
    }
}

/// Errors raised by benchmark hooks.
#[derive(Debug, Clone, Error)]
pub enum BenchmarkError {
    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),

    /// The cluster lacks something the benchmark needs (e.g. an API group).
    #[error("precondition not met: {0}")]
    Precondition(String),

    /// The benchmark itself misbehaved (unexpected response shape, etc.).
    #[error("benchmark logic error: {0}")]
    Logic(String),
}

/// Behavior of one benchmark.
///
/// Implementations are shared read-only across runs, so per-run state lives
/// in the cluster (under the engine-provided namespace), never in `self`.
#[async_trait]
pub trait Benchmark: Send + Sync {
    /// Check prerequisites. Any error marks the benchmark `Skip`.
    async fn pre_run(&self, _ctx: &BenchContext) -> Result<(), BenchmarkError> {
        Ok(())
    }

    /// Create benchmark-specific fixtures in the provisioned namespace.
    async fn setup(&self, _ctx: &BenchContext) -> Result<(), BenchmarkError> {
        Ok(())
    }

    async fn run(&self, ctx: &BenchContext) -> Result<Verdict, BenchmarkError>;

    /// Confirm or overturn the verdict from `run`.
    async fn verify(&self, _ctx: &BenchContext, verdict: Verdict) -> Result<Verdict, BenchmarkError> {
        Ok(verdict)
    }

    /// Release anything `setup`/`run` created outside the engine's namespaces.
    async fn cleanup(&self, _ctx: &BenchContext) -> Result<(), BenchmarkError> {
        Ok(())
    }
}

/// Static catalog entry plus behavior.
pub struct Descriptor {
    pub id: String,
    pub title: String,
    pub description: String,
    pub benchmark_type: BenchmarkType,
    /// Short filter tag, e.g. `CPI`.
    pub category: String,
    /// Grouping label, e.g. `Control Plane Isolation`.
    pub category_name: String,
    pub profile_level: ProfileLevel,
    pub remediation: String,
    behavior: Box<dyn Benchmark>,
}

impl Descriptor {
    pub fn builder(id: impl Into<String>, title: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            benchmark_type: BenchmarkType::BehavioralCheck,
            category: String::new(),
            category_name: String::new(),
            profile_level: ProfileLevel::MIN,
            remediation: String::new(),
        }
    }

    pub fn behavior(&self) -> &dyn Benchmark {
        self.behavior.as_ref()
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("category", &self.category)
            .field("profile_level", &self.profile_level)
            .finish_non_exhaustive()
    }
}

/// Fluent constructor for [`Descriptor`].
pub struct DescriptorBuilder {
    id: String,
    title: String,
    description: String,
    benchmark_type: BenchmarkType,
    category: String,
    category_name: String,
    profile_level: ProfileLevel,
    remediation: String,
}

impl DescriptorBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn benchmark_type(mut self, benchmark_type: BenchmarkType) -> Self {
        self.benchmark_type = benchmark_type;
        self
    }

    pub fn category(mut self, tag: impl Into<String>, name: impl Into<String>) -> Self {
        self.category = tag.into();
        self.category_name = name.into();
        self
    }

    pub fn profile_level(mut self, level: u8) -> Self {
        self.profile_level = ProfileLevel::new(level);
        self
    }

    pub fn remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = remediation.into();
        self
    }

    pub fn build(self, behavior: impl Benchmark + 'static) -> Descriptor {
        Descriptor {
            id: self.id,
            title: self.title,
            description: self.description,
            benchmark_type: self.benchmark_type,
            category: self.category,
            category_name: self.category_name,
            profile_level: self.profile_level,
            remediation: self.remediation,
            behavior: Box::new(behavior),
        }
    }
}
