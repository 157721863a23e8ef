// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Control plane and tenant-to-tenant isolation checks.

use async_trait::async_trait;
use serde_json::json;

use super::expect_denied;
use crate::benchmark::{BenchContext, Benchmark, BenchmarkError, Verdict};
use crate::probe::{AccessCheck, Caller, ObjectKind, WriteMode};

/// The tenant holds no permission on cluster-scoped resources.
pub struct ClusterScopeDenied {
    checks: Vec<AccessCheck>,
}

impl ClusterScopeDenied {
    pub fn new(checks: Vec<AccessCheck>) -> Self {
        Self { checks }
    }
}

impl Default for ClusterScopeDenied {
    fn default() -> Self {
        let rbac = "rbac.authorization.k8s.io";
        Self::new(vec![
            AccessCheck::cluster("list", "", "nodes"),
            AccessCheck::cluster("create", "", "namespaces"),
            AccessCheck::cluster("list", "", "persistentvolumes"),
            AccessCheck::cluster("list", rbac, "clusterroles"),
            AccessCheck::cluster("create", rbac, "clusterrolebindings"),
            AccessCheck::cluster("list", "apiextensions.k8s.io", "customresourcedefinitions"),
            AccessCheck::cluster("list", "storage.k8s.io", "storageclasses"),
        ])
    }
}

#[async_trait]
impl Benchmark for ClusterScopeDenied {
    async fn run(&self, ctx: &BenchContext) -> Result<Verdict, BenchmarkError> {
        let tenant = ctx.tenant();
        let mut allowed = Vec::new();
        for check in &self.checks {
            if ctx.probe().access_review(&tenant, check).await? {
                allowed.push(check.to_string());
            }
        }
        if allowed.is_empty() {
            Ok(Verdict::Pass)
        } else {
            Ok(Verdict::fail(format!("tenant may {}", allowed.join(", "))))
        }
    }
}

/// The tenant can read but not change quota and limit objects.
pub struct QuotaImmutable;

#[async_trait]
impl Benchmark for QuotaImmutable {
    async fn run(&self, ctx: &BenchContext) -> Result<Verdict, BenchmarkError> {
        let tenant = ctx.tenant();
        for kind in [ObjectKind::ResourceQuota, ObjectKind::LimitRange] {
            for verb in ["update", "patch", "delete"] {
                let check = AccessCheck::namespaced(verb, kind, ctx.namespace());
                if ctx.probe().access_review(&tenant, &check).await? {
                    return Ok(Verdict::fail(format!("tenant may {}", check)));
                }
            }
        }

        let quota = json!({
            "apiVersion": "v1",
            "kind": "ResourceQuota",
            "metadata": { "name": "mtb-tenant-quota" },
            "spec": { "hard": { "pods": "1000" } },
        });
        let attempt = ctx
            .probe()
            .create_object(
                &tenant,
                ctx.namespace(),
                ObjectKind::ResourceQuota,
                &quota,
                WriteMode::DryRun,
            )
            .await;
        expect_denied(attempt, "create a ResourceQuota in its own namespace")
    }
}

const PEER_LABEL: &str = "peer";
const PEER_CONFIG_MAP: &str = "mtb-peer-data";

/// A tenant cannot read or write objects in a namespace it is not bound in.
pub struct PeerNamespaceDenied;

#[async_trait]
impl Benchmark for PeerNamespaceDenied {
    async fn setup(&self, ctx: &BenchContext) -> Result<(), BenchmarkError> {
        let peer = ctx.provision_namespace(PEER_LABEL).await?;
        let data = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": PEER_CONFIG_MAP },
            "data": { "owner": "peer-tenant" },
        });
        ctx.probe()
            .create_object(&Caller::Admin, &peer, ObjectKind::ConfigMap, &data, WriteMode::Persist)
            .await?;
        Ok(())
    }

    async fn run(&self, ctx: &BenchContext) -> Result<Verdict, BenchmarkError> {
        let peer = ctx.extra_namespace(PEER_LABEL);
        let tenant = ctx.tenant();

        match ctx
            .probe()
            .get_object(&tenant, &peer, ObjectKind::ConfigMap, PEER_CONFIG_MAP)
            .await
        {
            Ok(_) => {
                return Ok(Verdict::fail(format!(
                    "tenant read configmap {} in peer namespace {}",
                    PEER_CONFIG_MAP, peer
                )))
            }
            Err(e) if e.is_unauthorized() => {}
            // Authorization happens before lookup, so NotFound means the
            // request was allowed through.
            Err(e) if e.is_not_found() => {
                return Ok(Verdict::fail(format!(
                    "tenant was authorized to read configmaps in peer namespace {}",
                    peer
                )))
            }
            Err(e) => return Err(e.into()),
        }

        match ctx.probe().list_objects(&tenant, &peer, ObjectKind::Pod).await {
            Ok(_) => {
                return Ok(Verdict::fail(format!(
                    "tenant listed pods in peer namespace {}",
                    peer
                )))
            }
            Err(e) if e.is_unauthorized() => {}
            Err(e) => return Err(e.into()),
        }

        let intruder = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "mtb-intruder" },
        });
        let attempt = ctx
            .probe()
            .create_object(&tenant, &peer, ObjectKind::ConfigMap, &intruder, WriteMode::DryRun)
            .await;
        expect_denied(attempt, &format!("create configmaps in peer namespace {}", peer))
    }
}
