// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration loading from environment variables.
//!
//! All values come from `MTB_*` environment variables with sensible defaults.
//! Invalid values fall back to defaults without failing; only resolving
//! cluster credentials can fail.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `MTB_PROFILE_LEVEL` | 3 | Highest profile level to run |
//! | `MTB_CONCURRENCY` | 1 | Benchmarks in flight at once |
//! | `MTB_BENCHMARK_TIMEOUT` | 60 | Per-benchmark deadline (secs) |
//! | `MTB_CLEANUP_GRACE` | 30 | Cleanup deadline (secs) |
//! | `MTB_POLL_INTERVAL_MS` | 2000 | Delay between polls (ms) |
//! | `MTB_POLL_ATTEMPTS` | 15 | Polls before giving up |
//! | `MTB_TENANT_USER` | mtb-tenant | Impersonated tenant user |
//! | `MTB_TENANT_GROUPS` | (none) | Comma-separated tenant groups |
//! | `MTB_RUN_ID` | (random) | Fixed run suffix for namespace names |
//! | `MTB_LOG_FORMAT` | json | `json` or `pretty` |
//! | `MTB_LOG_LEVEL` | info | Log filter directive |
//! | `MTB_API_SERVER` | in-cluster | API server URL |
//! | `MTB_TOKEN` | (none) | Bearer token |
//! | `MTB_TOKEN_FILE` | in-cluster | File holding the bearer token |
//! | `MTB_CA_FILE` | in-cluster | PEM CA bundle for the API server |
//! | `MTB_INSECURE_SKIP_TLS_VERIFY` | false | Skip API server TLS verification |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::benchmark::{PollConfig, ProfileLevel};
use crate::engine::{EngineConfig, RunId};
use crate::probe::{ClusterCredentials, TenantIdentity};
use crate::telemetry::{LogConfig, LogFormat};

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API server configured: set MTB_API_SERVER or run inside a cluster")]
    MissingApiServer,

    #[error("failed to read token file {path}: {reason}")]
    TokenFile { path: String, reason: String },

    #[error("failed to read CA file {path}: {reason}")]
    CaFile { path: String, reason: String },
}

/// Where to find the cluster, before any file is read.
#[derive(Debug, Clone, Default)]
pub struct ClusterEnv {
    pub api_server: Option<String>,
    pub token: Option<String>,
    pub token_file: Option<PathBuf>,
    pub ca_file: Option<PathBuf>,
    pub insecure_skip_tls_verify: bool,
    /// `api_server` was derived from `KUBERNETES_SERVICE_*`.
    pub in_cluster: bool,
}

/// All configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub profile_level: u8,
    pub engine: EngineConfig,
    pub log: LogConfig,
    pub cluster: ClusterEnv,
}

/// Effective configuration summary.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub profile_level: u8,
    pub concurrency: usize,
    pub benchmark_timeout_secs: u64,
    pub cleanup_grace_secs: u64,
    pub poll_interval_ms: u64,
    pub poll_attempts: u32,
    pub tenant_user: String,
    pub tenant_groups: Vec<String>,
    pub run_id: Option<String>,
    pub log_format: String,
    pub log_level: String,
    pub api_server: Option<String>,
    pub token_configured: bool,
    pub ca_file: Option<String>,
    pub insecure_skip_tls_verify: bool,
}

fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match var(key) {
        Some(val) => val.parse::<usize>().unwrap_or(default),
        None => default,
    }
}

fn parse_u32(key: &str, default: u32) -> u32 {
    match var(key) {
        Some(val) => val.parse::<u32>().unwrap_or(default),
        None => default,
    }
}

fn parse_u64(key: &str, default: u64) -> u64 {
    match var(key) {
        Some(val) => val.parse::<u64>().unwrap_or(default),
        None => default,
    }
}

fn parse_bool(key: &str) -> bool {
    matches!(
        var(key).map(|v| v.to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes")
    )
}

fn load_tenant() -> TenantIdentity {
    let user = var("MTB_TENANT_USER").unwrap_or_else(|| TenantIdentity::default().user);
    let groups: Vec<String> = var("MTB_TENANT_GROUPS")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    TenantIdentity::new(user).with_groups(groups)
}

fn load_engine_config() -> EngineConfig {
    let concurrency = parse_usize("MTB_CONCURRENCY", 1).max(1);
    let timeout_secs = parse_u64("MTB_BENCHMARK_TIMEOUT", 60).max(1);
    let grace_secs = parse_u64("MTB_CLEANUP_GRACE", 30).max(1);
    let interval_ms = parse_u64("MTB_POLL_INTERVAL_MS", 2000).max(10); // floor: 10ms
    let attempts = parse_u32("MTB_POLL_ATTEMPTS", 15).max(1);

    let run_id = var("MTB_RUN_ID").and_then(|raw| match RunId::parse(&raw) {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring MTB_RUN_ID");
            None
        }
    });

    EngineConfig {
        concurrency,
        benchmark_timeout: Duration::from_secs(timeout_secs),
        cleanup_grace: Duration::from_secs(grace_secs),
        poll: PollConfig {
            interval: Duration::from_millis(interval_ms),
            attempts,
        },
        tenant: load_tenant(),
        run_id,
    }
}

fn load_log_config() -> LogConfig {
    let format = var("MTB_LOG_FORMAT")
        .and_then(|raw| raw.parse::<LogFormat>().ok())
        .unwrap_or_default();
    let level = var("MTB_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
    LogConfig {
        format,
        level,
        output_path: None,
    }
}

fn load_cluster_env() -> ClusterEnv {
    let explicit = var("MTB_API_SERVER");
    let in_cluster_server = match (var("KUBERNETES_SERVICE_HOST"), var("KUBERNETES_SERVICE_PORT")) {
        (Some(host), port) => {
            let port = port.unwrap_or_else(|| "443".to_string());
            // IPv6 service hosts need brackets in a URL.
            if host.contains(':') {
                Some(format!("https://[{}]:{}", host, port))
            } else {
                Some(format!("https://{}:{}", host, port))
            }
        }
        (None, _) => None,
    };
    let in_cluster = explicit.is_none() && in_cluster_server.is_some();

    ClusterEnv {
        api_server: explicit.or(in_cluster_server),
        token: var("MTB_TOKEN"),
        token_file: var("MTB_TOKEN_FILE").map(PathBuf::from),
        ca_file: var("MTB_CA_FILE").map(PathBuf::from),
        insecure_skip_tls_verify: parse_bool("MTB_INSECURE_SKIP_TLS_VERIFY"),
        in_cluster,
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let default_level = ProfileLevel::MAX.get();
    let profile_level = match parse_u32("MTB_PROFILE_LEVEL", default_level as u32) {
        level @ 1..=255 => level as u8,
        _ => default_level,
    };

    EnvConfig {
        profile_level,
        engine: load_engine_config(),
        log: load_log_config(),
        cluster: load_cluster_env(),
    }
}

impl ClusterEnv {
    fn token_path(&self) -> Option<PathBuf> {
        self.token_file.clone().or_else(|| {
            self.in_cluster
                .then(|| Path::new(SERVICE_ACCOUNT_DIR).join("token"))
        })
    }

    fn ca_path(&self) -> Option<PathBuf> {
        self.ca_file.clone().or_else(|| {
            self.in_cluster
                .then(|| Path::new(SERVICE_ACCOUNT_DIR).join("ca.crt"))
        })
    }
}

impl EnvConfig {
    /// Resolve credentials, reading token and CA files.
    pub fn cluster_credentials(&self) -> Result<ClusterCredentials, ConfigError> {
        let cluster = &self.cluster;
        let api_server = cluster
            .api_server
            .clone()
            .ok_or(ConfigError::MissingApiServer)?;

        let token = match (&cluster.token, cluster.token_path()) {
            (Some(token), _) => Some(token.clone()),
            (None, Some(path)) => {
                let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::TokenFile {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
                Some(raw.trim().to_string())
            }
            (None, None) => None,
        };

        let ca_pem = match cluster.ca_path() {
            Some(path) => Some(std::fs::read(&path).map_err(|e| ConfigError::CaFile {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        Ok(ClusterCredentials {
            token,
            ca_pem,
            insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
            ..ClusterCredentials::new(api_server)
        })
    }

    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        let log_format = match self.log.format {
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        };
        EffectiveConfig {
            profile_level: self.profile_level,
            concurrency: self.engine.concurrency,
            benchmark_timeout_secs: self.engine.benchmark_timeout.as_secs(),
            cleanup_grace_secs: self.engine.cleanup_grace.as_secs(),
            poll_interval_ms: self.engine.poll.interval.as_millis() as u64,
            poll_attempts: self.engine.poll.attempts,
            tenant_user: self.engine.tenant.user.clone(),
            tenant_groups: self.engine.tenant.groups.clone(),
            run_id: self.engine.run_id.as_ref().map(|id| id.to_string()),
            log_format: log_format.to_string(),
            log_level: self.log.level.clone(),
            api_server: self.cluster.api_server.clone(),
            token_configured: self.cluster.token.is_some() || self.cluster.token_path().is_some(),
            ca_file: self.cluster.ca_path().map(|p| p.display().to_string()),
            insecure_skip_tls_verify: self.cluster.insecure_skip_tls_verify,
        }
    }
}
