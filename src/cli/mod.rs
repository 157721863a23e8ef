// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI glue for the `kubectl-mtb` binary.
//!
//! Nothing here terminates the process. Argument problems come back as
//! [`CliError`] and the binary maps them to exit codes.
//!
//! ## Usage
//!
//! ```bash
//! kubectl-mtb get benchmarks -p 2          # list the catalog
//! kubectl-mtb test benchmarks -c "Host Isolation"
//! kubectl-mtb test benchmarks --output json --simulate
//! kubectl-mtb config show
//! ```

pub mod config_cmd;
pub mod render;

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::probe::ProbeError;
use crate::registry::RegistryError;
use crate::result::SuiteReport;
use crate::selector::ConfigurationError;

pub use render::{render_catalog, render_report, OutputFormat};

/// Every benchmark selected and none failed or errored.
pub const EXIT_SUCCESS: u8 = 0;
/// At least one benchmark failed or errored.
pub const EXIT_FINDINGS: u8 = 1;
/// Bad arguments or selection.
pub const EXIT_CONFIGURATION: u8 = 2;
/// The cluster client could not be built.
pub const EXIT_CLUSTER: u8 = 3;

/// Resources the `get` and `test` subcommands act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Benchmarks,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Benchmarks => f.write_str("benchmarks"),
        }
    }
}

/// Errors surfaced at the command boundary.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("no resource given; supported resources: benchmarks")]
    MissingResource,

    #[error("unknown resource `{0}`; supported resources: benchmarks")]
    InvalidResource(String),

    #[error("no benchmarks match category `{0}`")]
    EmptySelection(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("cluster configuration: {0}")]
    ClusterConfig(#[from] ConfigError),

    #[error("cluster client: {0}")]
    Cluster(#[from] ProbeError),

    #[error("render report: {0}")]
    Render(#[from] serde_json::Error),
}

impl CliError {
    /// Exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ClusterConfig(_) | Self::Cluster(_) => EXIT_CLUSTER,
            Self::Registry(_) | Self::Render(_) => EXIT_FINDINGS,
            Self::MissingResource
            | Self::InvalidResource(_)
            | Self::EmptySelection(_)
            | Self::Configuration(_) => EXIT_CONFIGURATION,
        }
    }
}

/// Resolve the positional resource argument.
///
/// Only the first argument is considered; `benchmark` and `benchmarks` are
/// accepted in any case.
pub fn validate_resource(args: &[String]) -> Result<Resource, CliError> {
    let raw = args.first().ok_or(CliError::MissingResource)?;
    let name = raw.trim();
    if name.eq_ignore_ascii_case("benchmark") || name.eq_ignore_ascii_case("benchmarks") {
        Ok(Resource::Benchmarks)
    } else {
        Err(CliError::InvalidResource(raw.clone()))
    }
}

/// Exit code for a finished run.
pub fn exit_code(report: &SuiteReport) -> u8 {
    if report.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_FINDINGS
    }
}
