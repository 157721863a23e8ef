// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Host isolation: pod specs that admission must refuse.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{expect_denied, require_tenant_may};
use crate::benchmark::{BenchContext, Benchmark, BenchmarkError, Verdict};
use crate::probe::{ObjectKind, WriteMode};

/// One way a pod can escape its sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodVariant {
    Privileged,
    PrivilegeEscalation,
    HostPath,
    HostNetworking,
    AddedCapabilities,
    RunAsRoot,
}

impl PodVariant {
    pub const ALL: [PodVariant; 6] = [
        Self::Privileged,
        Self::PrivilegeEscalation,
        Self::HostPath,
        Self::HostNetworking,
        Self::AddedCapabilities,
        Self::RunAsRoot,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Privileged => "MTB-PL1-BC-HI-1",
            Self::PrivilegeEscalation => "MTB-PL1-BC-HI-2",
            Self::HostPath => "MTB-PL1-BC-HI-3",
            Self::HostNetworking => "MTB-PL1-BC-HI-4",
            Self::AddedCapabilities => "MTB-PL1-BC-HI-5",
            Self::RunAsRoot => "MTB-PL2-BC-HI-6",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Privileged => "Block privileged containers",
            Self::PrivilegeEscalation => "Block privilege escalation",
            Self::HostPath => "Block use of host path volumes",
            Self::HostNetworking => "Block use of host networking and ports",
            Self::AddedCapabilities => "Block add capabilities",
            Self::RunAsRoot => "Require run as non-root user",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Privileged => {
                "Tenants should not be allowed to run privileged containers, which can access \
                 all host devices."
            }
            Self::PrivilegeEscalation => {
                "Tenants should not be allowed to create containers that can gain more \
                 privileges than their parent process."
            }
            Self::HostPath => {
                "Tenants should not be able to mount host volumes and directories."
            }
            Self::HostNetworking => {
                "Tenants should not be allowed to use host networking or host ports for \
                 their workloads."
            }
            Self::AddedCapabilities => {
                "Linux capabilities beyond the default set should not be granted to tenant \
                 containers."
            }
            Self::RunAsRoot => "Processes in tenant containers should not run as root.",
        }
    }

    pub fn remediation(&self) -> &'static str {
        match self {
            Self::Privileged => {
                "Enforce the baseline Pod Security Standard (or an equivalent admission \
                 policy) in tenant namespaces to reject securityContext.privileged=true."
            }
            Self::PrivilegeEscalation => {
                "Enforce the restricted Pod Security Standard to require \
                 allowPrivilegeEscalation=false."
            }
            Self::HostPath => {
                "Enforce the baseline Pod Security Standard to reject hostPath volumes."
            }
            Self::HostNetworking => {
                "Enforce the baseline Pod Security Standard to reject hostNetwork and \
                 hostPort."
            }
            Self::AddedCapabilities => {
                "Enforce the restricted Pod Security Standard, which only allows adding \
                 NET_BIND_SERVICE."
            }
            Self::RunAsRoot => {
                "Enforce the restricted Pod Security Standard to require runAsNonRoot=true."
            }
        }
    }

    /// What the tenant attempted, for findings.
    fn attempt(&self) -> &'static str {
        match self {
            Self::Privileged => "create a privileged pod",
            Self::PrivilegeEscalation => "create a pod allowing privilege escalation",
            Self::HostPath => "create a pod mounting a hostPath volume",
            Self::HostNetworking => "create a pod using host networking and host ports",
            Self::AddedCapabilities => "create a pod adding SYS_ADMIN",
            Self::RunAsRoot => "create a pod running as root",
        }
    }

    /// A restricted-compliant pod with exactly one violation applied.
    pub fn manifest(&self) -> Value {
        let mut pod = compliant_pod("mtb-probe");
        let container = &mut pod["spec"]["containers"][0];
        match self {
            Self::Privileged => {
                container["securityContext"]["privileged"] = json!(true);
            }
            Self::PrivilegeEscalation => {
                container["securityContext"]["allowPrivilegeEscalation"] = json!(true);
            }
            Self::HostPath => {
                container["volumeMounts"] = json!([{ "name": "host", "mountPath": "/host" }]);
                pod["spec"]["volumes"] = json!([{ "name": "host", "hostPath": { "path": "/" } }]);
            }
            Self::HostNetworking => {
                container["ports"] = json!([{ "containerPort": 8080, "hostPort": 8080 }]);
                pod["spec"]["hostNetwork"] = json!(true);
            }
            Self::AddedCapabilities => {
                container["securityContext"]["capabilities"]["add"] = json!(["SYS_ADMIN"]);
            }
            Self::RunAsRoot => {
                container["securityContext"]["runAsNonRoot"] = json!(false);
                container["securityContext"]["runAsUser"] = json!(0);
            }
        }
        pod
    }
}

fn compliant_pod(name: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": { "name": name },
        "spec": {
            "securityContext": {
                "runAsNonRoot": true,
                "seccompProfile": { "type": "RuntimeDefault" },
            },
            "containers": [{
                "name": "probe",
                "image": "registry.k8s.io/pause:3.9",
                "securityContext": {
                    "runAsNonRoot": true,
                    "allowPrivilegeEscalation": false,
                    "capabilities": { "drop": ["ALL"] },
                },
            }],
        },
    })
}

/// Admission refuses a tenant pod carrying one specific violation.
pub struct PodRejected {
    variant: PodVariant,
}

impl PodRejected {
    pub fn new(variant: PodVariant) -> Self {
        Self { variant }
    }
}

#[async_trait]
impl Benchmark for PodRejected {
    async fn run(&self, ctx: &BenchContext) -> Result<Verdict, BenchmarkError> {
        require_tenant_may(ctx, "create", ObjectKind::Pod).await?;
        let attempt = ctx
            .probe()
            .create_object(
                &ctx.tenant(),
                ctx.namespace(),
                ObjectKind::Pod,
                &self.variant.manifest(),
                WriteMode::DryRun,
            )
            .await;
        expect_denied(attempt, self.variant.attempt())
    }
}
