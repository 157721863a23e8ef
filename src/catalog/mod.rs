// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Built-in multi-tenancy benchmarks.
//!
//! Each check is a small behavior struct; [`builtin_registry`] composes them
//! into the catalog. Ids follow `MTB-PL<level>-<CC|BC>-<category>-<n>`, where
//! `CC` marks configuration checks and `BC` behavioral checks.

mod defaults;
mod isolation;
mod pods;
mod self_service;

use serde_json::Value;

use crate::benchmark::{BenchContext, BenchmarkError, BenchmarkType, Descriptor, Verdict};
use crate::probe::{AccessCheck, ObjectKind, ProbeError};
use crate::registry::{Registry, RegistryError};

pub use defaults::{NamespaceDefault, Requirement};
pub use isolation::{ClusterScopeDenied, PeerNamespaceDenied, QuotaImmutable};
pub use pods::{PodRejected, PodVariant};
pub use self_service::{SelfService, ServiceTypeRejected};

const CPI: (&str, &str) = ("CPI", "Control Plane Isolation");
const TI: (&str, &str) = ("TI", "Tenant Isolation");
const HI: (&str, &str) = ("HI", "Host Isolation");
const FNS: (&str, &str) = ("FNS", "Fairness");
const NI: (&str, &str) = ("NI", "Network Isolation");
const OPS: (&str, &str) = ("OPS", "Self-Service Operations");

/// The full catalog in its canonical order.
pub fn builtin_registry() -> Result<Registry, RegistryError> {
    let mut registry = Registry::new();
    for descriptor in descriptors() {
        registry.register(descriptor)?;
    }
    Ok(registry)
}

fn descriptors() -> Vec<Descriptor> {
    let mut all = vec![
        Descriptor::builder("MTB-PL1-CC-CPI-1", "Block access to cluster resources")
            .category(CPI.0, CPI.1)
            .profile_level(1)
            .benchmark_type(BenchmarkType::ConfigurationCheck)
            .description(
                "Tenants should not be able to view, edit, create or delete cluster \
                 (non-namespaced) resources such as Node, ClusterRole, ClusterRoleBinding, etc.",
            )
            .remediation(
                "Cluster administrators should configure RBAC roles for tenants that do \
                 not grant any verbs on cluster-scoped resources.",
            )
            .build(ClusterScopeDenied::default()),
        Descriptor::builder("MTB-PL1-BC-CPI-2", "Block modification of resource quotas")
            .category(CPI.0, CPI.1)
            .profile_level(1)
            .description("Tenants should not be able to modify the resource quotas defined in their namespaces.")
            .remediation(
                "Grant tenants only read access (get, list, watch) to resourcequotas and \
                 limitranges in their namespaces.",
            )
            .build(QuotaImmutable),
        Descriptor::builder("MTB-PL1-BC-TI-1", "Block access to other tenant resources")
            .category(TI.0, TI.1)
            .profile_level(1)
            .description(
                "Each tenant namespace may contain resources set up by the tenant and the \
                 cluster administrator. A tenant must not reach another tenant's resources.",
            )
            .remediation(
                "Scope tenant RoleBindings to the tenant's own namespaces; never bind tenants \
                 with ClusterRoleBindings.",
            )
            .build(PeerNamespaceDenied),
    ];

    all.extend(PodVariant::ALL.iter().map(|variant| {
        let level = if *variant == PodVariant::RunAsRoot { 2 } else { 1 };
        Descriptor::builder(variant.id(), variant.title())
            .category(HI.0, HI.1)
            .profile_level(level)
            .description(variant.description())
            .remediation(variant.remediation())
            .build(PodRejected::new(*variant))
    }));

    all.extend([
        Descriptor::builder("MTB-PL1-CC-FNS-1", "Configure namespace resource quotas")
            .category(FNS.0, FNS.1)
            .profile_level(1)
            .benchmark_type(BenchmarkType::ConfigurationCheck)
            .description(
                "Namespace resource quotas should be used to allocate, track, and limit a \
                 tenant's use of shared resources.",
            )
            .remediation(
                "Create a ResourceQuota object in every tenant namespace, for example through \
                 a namespace template or tenancy controller.",
            )
            .build(NamespaceDefault::new(
                ObjectKind::ResourceQuota,
                Requirement::HardLimits,
            )),
        Descriptor::builder("MTB-PL2-BC-OPS-1", "Create role bindings")
            .category(OPS.0, OPS.1)
            .profile_level(2)
            .description("Tenants should be able to create RoleBindings in their namespaces for self-service access management.")
            .remediation(
                "Grant tenants the create verb on rolebindings.rbac.authorization.k8s.io \
                 in their namespaces.",
            )
            .build(SelfService::new(ObjectKind::RoleBinding)),
        Descriptor::builder("MTB-PL2-BC-OPS-2", "Create network policies")
            .category(OPS.0, OPS.1)
            .profile_level(2)
            .description("Tenants should be able to manage NetworkPolicies in their namespaces.")
            .remediation(
                "Grant tenants create, update and delete on \
                 networkpolicies.networking.k8s.io in their namespaces.",
            )
            .build(SelfService::new(ObjectKind::NetworkPolicy)),
        Descriptor::builder("MTB-PL3-CC-NI-1", "Require default-deny network policy")
            .category(NI.0, NI.1)
            .profile_level(3)
            .benchmark_type(BenchmarkType::ConfigurationCheck)
            .description(
                "Every tenant namespace should start with a NetworkPolicy that denies all \
                 ingress traffic not explicitly allowed.",
            )
            .remediation(
                "Provision a NetworkPolicy with an empty podSelector and no ingress rules in \
                 each tenant namespace.",
            )
            .build(NamespaceDefault::new(
                ObjectKind::NetworkPolicy,
                Requirement::DenyAllIngress,
            )),
        Descriptor::builder("MTB-PL3-BC-NI-2", "Block use of NodePort services")
            .category(NI.0, NI.1)
            .profile_level(3)
            .description("Tenants should not be able to create services of type NodePort.")
            .remediation(
                "Use an admission policy (e.g. OPA Gatekeeper or Kyverno) that rejects \
                 Services with spec.type NodePort in tenant namespaces.",
            )
            .build(ServiceTypeRejected::new("NodePort")),
    ]);
    all
}

/// Map a tenant attempt that should have been refused to a verdict.
pub(crate) fn expect_denied(
    attempt: Result<Value, ProbeError>,
    what: &str,
) -> Result<Verdict, BenchmarkError> {
    match attempt {
        Ok(_) => Ok(Verdict::fail(format!("tenant was allowed to {}", what))),
        Err(e) if e.is_unauthorized() => Ok(Verdict::Pass),
        Err(e) => Err(e.into()),
    }
}

/// A denial is only meaningful if RBAC would otherwise let the tenant try.
pub(crate) async fn require_tenant_may(
    ctx: &BenchContext,
    verb: &str,
    kind: ObjectKind,
) -> Result<(), BenchmarkError> {
    let check = AccessCheck::namespaced(verb, kind, ctx.namespace());
    if ctx.probe().access_review(&ctx.tenant(), &check).await? {
        Ok(())
    } else {
        Err(BenchmarkError::Precondition(format!(
            "tenant is not permitted to {}; admission cannot be observed",
            check
        )))
    }
}
