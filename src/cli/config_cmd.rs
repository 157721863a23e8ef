// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! `config show`: print the configuration a run would use.
//!
//! Reads environment variables directly; no cluster connection is made.

use std::fmt::Write as _;

use crate::config::{self, EffectiveConfig};

/// Print effective config as key-value pairs to stdout.
pub fn run_show() {
    let cfg = config::load().effective_config();
    print!("{}", format_config(&cfg));
}

fn format_config(cfg: &EffectiveConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "MTB_PROFILE_LEVEL={}", cfg.profile_level);
    let _ = writeln!(out, "MTB_CONCURRENCY={}", cfg.concurrency);
    let _ = writeln!(out, "MTB_BENCHMARK_TIMEOUT={}", cfg.benchmark_timeout_secs);
    let _ = writeln!(out, "MTB_CLEANUP_GRACE={}", cfg.cleanup_grace_secs);
    let _ = writeln!(out, "MTB_POLL_INTERVAL_MS={}", cfg.poll_interval_ms);
    let _ = writeln!(out, "MTB_POLL_ATTEMPTS={}", cfg.poll_attempts);
    let _ = writeln!(out, "MTB_TENANT_USER={}", cfg.tenant_user);
    let _ = writeln!(out, "MTB_TENANT_GROUPS={}", cfg.tenant_groups.join(","));
    let _ = writeln!(out, "MTB_RUN_ID={}", cfg.run_id.as_deref().unwrap_or(""));
    let _ = writeln!(out, "MTB_LOG_FORMAT={}", cfg.log_format);
    let _ = writeln!(out, "MTB_LOG_LEVEL={}", cfg.log_level);
    let _ = writeln!(out, "MTB_API_SERVER={}", cfg.api_server.as_deref().unwrap_or(""));
    // Never echo the token itself.
    let _ = writeln!(
        out,
        "MTB_TOKEN={}",
        if cfg.token_configured { "<set>" } else { "" }
    );
    let _ = writeln!(out, "MTB_CA_FILE={}", cfg.ca_file.as_deref().unwrap_or(""));
    let _ = writeln!(out, "MTB_INSECURE_SKIP_TLS_VERIFY={}", cfg.insecure_skip_tls_verify);
    out
}
