// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run identifiers and ephemeral namespace naming.
//!
//! Names take the form `mtb-<slug>-<digest>-<run>`:
//! - `slug`: the benchmark id lowercased, non-alphanumerics collapsed to `-`,
//!   capped at 36 characters
//! - `digest`: first 8 hex characters of SHA-256 over the full id, so two ids
//!   that share a slug still diverge
//! - `run`: the run-scoped suffix
//!
//! The result is always a valid DNS-1123 label of at most 63 characters.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::probe::{Caller, ClusterProbe, ObjectKind, ProbeError, TenantIdentity, WriteMode};
use crate::selector::ConfigurationError;

const PREFIX: &str = "mtb";
const MAX_SLUG: usize = 36;
const DIGEST_LEN: usize = 8;
const RUN_ID_LEN: usize = 10;

/// Label keys stamped on every namespace the engine creates.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const RUN_ID_LABEL: &str = "mtb.kubernetes.io/run-id";
pub const BENCHMARK_LABEL: &str = "mtb.kubernetes.io/benchmark";

/// Name of the RoleBinding granting the tenant `admin` in its namespace.
pub const TENANT_BINDING: &str = "mtb-tenant-admin";

/// Run-scoped suffix shared by every namespace created in one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Random suffix for a real run.
    pub fn generate() -> Self {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        Self(raw[..RUN_ID_LEN].to_string())
    }

    /// Deterministic suffix; distinct seeds below 2^40 give distinct ids.
    pub fn from_seed(seed: u64) -> Self {
        Self(format!("{:010x}", seed & 0xff_ffff_ffff))
    }

    /// Accept an operator-supplied suffix (1-10 lowercase alphanumerics).
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let raw = raw.trim();
        let valid = !raw.is_empty()
            && raw.len() <= RUN_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(ConfigurationError::InvalidRunId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace name for `benchmark_id` in this run.
    pub fn namespace_for(&self, benchmark_id: &str) -> String {
        let slug = slugify(benchmark_id);
        let digest = short_digest(benchmark_id);
        if slug.is_empty() {
            format!("{}-{}-{}", PREFIX, digest, self.0)
        } else {
            format!("{}-{}-{}-{}", PREFIX, slug, digest, self.0)
        }
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn slugify(id: &str) -> String {
    let mut slug = String::with_capacity(id.len());
    for c in id.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.truncate(MAX_SLUG);
    slug.trim_end_matches('-').to_string()
}

pub(crate) fn short_digest(id: &str) -> String {
    let digest = Sha256::digest(id.as_bytes());
    hex::encode(digest)[..DIGEST_LEN].to_string()
}

/// Labels identifying a namespace as engine-owned.
pub(crate) fn labels(run_id: &RunId, benchmark_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), "kubectl-mtb".to_string()),
        (RUN_ID_LABEL.to_string(), run_id.to_string()),
        (BENCHMARK_LABEL.to_string(), short_digest(benchmark_id)),
    ])
}

/// RoleBinding of the tenant to the `admin` ClusterRole.
pub(crate) fn tenant_binding(tenant: &TenantIdentity) -> Value {
    let mut subjects = vec![json!({
        "apiGroup": "rbac.authorization.k8s.io",
        "kind": "User",
        "name": tenant.user,
    })];
    subjects.extend(tenant.groups.iter().map(|group| {
        json!({
            "apiGroup": "rbac.authorization.k8s.io",
            "kind": "Group",
            "name": group,
        })
    }));
    json!({
        "apiVersion": "rbac.authorization.k8s.io/v1",
        "kind": "RoleBinding",
        "metadata": { "name": TENANT_BINDING },
        "roleRef": {
            "apiGroup": "rbac.authorization.k8s.io",
            "kind": "ClusterRole",
            "name": "admin",
        },
        "subjects": subjects,
    })
}

/// Bind `tenant` as admin of namespace `name`.
pub(crate) async fn bind_tenant(
    probe: &dyn ClusterProbe,
    name: &str,
    tenant: &TenantIdentity,
) -> Result<(), ProbeError> {
    probe
        .create_object(
            &Caller::Admin,
            name,
            ObjectKind::RoleBinding,
            &tenant_binding(tenant),
            WriteMode::Persist,
        )
        .await
        .map(|_| ())
}
