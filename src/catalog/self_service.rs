// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Operations tenants should be able to perform on their own, and service
//! types they should not.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{expect_denied, require_tenant_may};
use crate::benchmark::{BenchContext, Benchmark, BenchmarkError, Verdict};
use crate::probe::{ObjectKind, TenantIdentity, WriteMode};

const OBJECT_NAME: &str = "mtb-self-service";

/// The tenant can create `kind` objects in its own namespace.
pub struct SelfService {
    kind: ObjectKind,
}

impl SelfService {
    pub fn new(kind: ObjectKind) -> Self {
        Self { kind }
    }

    fn manifest(&self, tenant: &TenantIdentity) -> Value {
        match self.kind {
            ObjectKind::RoleBinding => json!({
                "apiVersion": self.kind.api_version(),
                "kind": "RoleBinding",
                "metadata": { "name": OBJECT_NAME },
                "roleRef": {
                    "apiGroup": "rbac.authorization.k8s.io",
                    "kind": "ClusterRole",
                    "name": "view",
                },
                "subjects": [{
                    "apiGroup": "rbac.authorization.k8s.io",
                    "kind": "User",
                    "name": tenant.user,
                }],
            }),
            ObjectKind::NetworkPolicy => json!({
                "apiVersion": self.kind.api_version(),
                "kind": "NetworkPolicy",
                "metadata": { "name": OBJECT_NAME },
                "spec": {
                    "podSelector": { "matchLabels": { "app": OBJECT_NAME } },
                    "policyTypes": ["Ingress"],
                },
            }),
            kind => json!({
                "apiVersion": kind.api_version(),
                "kind": kind.kind_name(),
                "metadata": { "name": OBJECT_NAME },
            }),
        }
    }
}

#[async_trait]
impl Benchmark for SelfService {
    async fn pre_run(&self, ctx: &BenchContext) -> Result<(), BenchmarkError> {
        ctx.require_api_group(self.kind.group()).await
    }

    async fn run(&self, ctx: &BenchContext) -> Result<Verdict, BenchmarkError> {
        let manifest = self.manifest(ctx.tenant_identity());
        let created = ctx
            .probe()
            .create_object(&ctx.tenant(), ctx.namespace(), self.kind, &manifest, WriteMode::Persist)
            .await;
        match created {
            Ok(_) => Ok(Verdict::Pass),
            Err(e) if e.is_unauthorized() => Ok(Verdict::fail(format!(
                "tenant could not create {} in its own namespace: {}",
                self.kind.resource(),
                e.detail
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn verify(&self, ctx: &BenchContext, verdict: Verdict) -> Result<Verdict, BenchmarkError> {
        if verdict != Verdict::Pass {
            return Ok(verdict);
        }
        // The object must be readable back by the tenant that created it.
        match ctx
            .probe()
            .get_object(&ctx.tenant(), ctx.namespace(), self.kind, OBJECT_NAME)
            .await
        {
            Ok(_) => Ok(Verdict::Pass),
            Err(e) if e.is_unauthorized() => Ok(Verdict::fail(format!(
                "tenant cannot read back the {} it created",
                self.kind.kind_name()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn cleanup(&self, ctx: &BenchContext) -> Result<(), BenchmarkError> {
        match ctx
            .probe()
            .delete_object(ctx.namespace(), self.kind, OBJECT_NAME)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Admission refuses tenant Services of a given type.
pub struct ServiceTypeRejected {
    service_type: &'static str,
}

impl ServiceTypeRejected {
    pub fn new(service_type: &'static str) -> Self {
        Self { service_type }
    }
}

#[async_trait]
impl Benchmark for ServiceTypeRejected {
    async fn run(&self, ctx: &BenchContext) -> Result<Verdict, BenchmarkError> {
        require_tenant_may(ctx, "create", ObjectKind::Service).await?;
        let service = json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": { "name": "mtb-probe" },
            "spec": {
                "type": self.service_type,
                "selector": { "app": "mtb-probe" },
                "ports": [{ "port": 80, "targetPort": 8080 }],
            },
        });
        let attempt = ctx
            .probe()
            .create_object(&ctx.tenant(), ctx.namespace(), ObjectKind::Service, &service, WriteMode::DryRun)
            .await;
        expect_denied(attempt, &format!("create a {} service", self.service_type))
    }
}
