// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cluster probe: the capability boundary between benchmarks and the cluster.
//!
//! Benchmarks never talk to the API server directly. They go through a
//! [`ClusterProbe`], which exposes the handful of operations the catalog needs
//! and can act either as the cluster administrator or as the tenant identity
//! (impersonated).
//!
//! Implementations:
//! - [`KubeApiProbe`]: Kubernetes REST API over `reqwest`
//! - [`InMemoryCluster`]: deterministic in-process cluster for tests and
//!   simulated runs

mod error;
pub mod kube;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use error::{ProbeError, ProbeErrorKind};
pub use kube::{ClusterCredentials, KubeApiProbe};
pub use memory::{ClusterPolicy, InMemoryCluster, PodSecurityLevel, ProbeCall, ProbeOp};

/// The restricted identity benchmarks act as when checking enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantIdentity {
    pub user: String,
    pub groups: Vec<String>,
}

impl TenantIdentity {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into(), groups: Vec::new() }
    }

    pub fn with_groups(mut self, groups: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for TenantIdentity {
    fn default() -> Self {
        Self::new("mtb-tenant")
    }
}

/// Who a probe call is issued as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// The credentials the probe was built with.
    Admin,
    /// Impersonated tenant identity.
    Tenant(TenantIdentity),
}

impl Caller {
    pub fn is_tenant(&self) -> bool {
        matches!(self, Self::Tenant(_))
    }
}

/// Namespaced object kinds the catalog manipulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Pod,
    Service,
    ConfigMap,
    Secret,
    Role,
    RoleBinding,
    NetworkPolicy,
    ResourceQuota,
    LimitRange,
}

impl ObjectKind {
    /// API group, empty for the core group.
    pub fn group(&self) -> &'static str {
        match self {
            Self::Role | Self::RoleBinding => "rbac.authorization.k8s.io",
            Self::NetworkPolicy => "networking.k8s.io",
            _ => "",
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            Self::Role | Self::RoleBinding => "rbac.authorization.k8s.io/v1",
            Self::NetworkPolicy => "networking.k8s.io/v1",
            _ => "v1",
        }
    }

    /// Lowercase plural resource name used in API paths and access reviews.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Pod => "pods",
            Self::Service => "services",
            Self::ConfigMap => "configmaps",
            Self::Secret => "secrets",
            Self::Role => "roles",
            Self::RoleBinding => "rolebindings",
            Self::NetworkPolicy => "networkpolicies",
            Self::ResourceQuota => "resourcequotas",
            Self::LimitRange => "limitranges",
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::Service => "Service",
            Self::ConfigMap => "ConfigMap",
            Self::Secret => "Secret",
            Self::Role => "Role",
            Self::RoleBinding => "RoleBinding",
            Self::NetworkPolicy => "NetworkPolicy",
            Self::ResourceQuota => "ResourceQuota",
            Self::LimitRange => "LimitRange",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind_name())
    }
}

/// A single authorization question ("can the caller `verb` `resource`?").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCheck {
    pub verb: String,
    pub resource: String,
    pub group: String,
    /// `None` for cluster-scoped resources.
    pub namespace: Option<String>,
}

impl AccessCheck {
    pub fn cluster(verb: &str, group: &str, resource: &str) -> Self {
        Self {
            verb: verb.to_string(),
            resource: resource.to_string(),
            group: group.to_string(),
            namespace: None,
        }
    }

    pub fn namespaced(verb: &str, kind: ObjectKind, namespace: &str) -> Self {
        Self {
            verb: verb.to_string(),
            resource: kind.resource().to_string(),
            group: kind.group().to_string(),
            namespace: Some(namespace.to_string()),
        }
    }
}

impl std::fmt::Display for AccessCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let resource = if self.group.is_empty() {
            self.resource.clone()
        } else {
            format!("{}.{}", self.resource, self.group)
        };
        match &self.namespace {
            Some(ns) => write!(f, "{} {} in {}", self.verb, resource, ns),
            None => write!(f, "{} {} (cluster)", self.verb, resource),
        }
    }
}

/// Whether a create is persisted or only run through admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Persist,
    DryRun,
}

/// Minimum cluster operations benchmarks need.
///
/// Implementations must be safe for concurrent use by several in-flight
/// benchmarks; each benchmark works in its own namespace so no locking is
/// required above this layer.
#[async_trait]
pub trait ClusterProbe: Send + Sync {
    /// Names of the API groups served by the cluster ("" is the core group).
    async fn api_groups(&self) -> Result<Vec<String>, ProbeError>;

    async fn create_namespace(
        &self,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<(), ProbeError>;

    async fn delete_namespace(&self, name: &str) -> Result<(), ProbeError>;

    async fn create_object(
        &self,
        caller: &Caller,
        namespace: &str,
        kind: ObjectKind,
        manifest: &Value,
        mode: WriteMode,
    ) -> Result<Value, ProbeError>;

    async fn get_object(
        &self,
        caller: &Caller,
        namespace: &str,
        kind: ObjectKind,
        name: &str,
    ) -> Result<Value, ProbeError>;

    async fn list_objects(
        &self,
        caller: &Caller,
        namespace: &str,
        kind: ObjectKind,
    ) -> Result<Vec<Value>, ProbeError>;

    async fn delete_object(
        &self,
        namespace: &str,
        kind: ObjectKind,
        name: &str,
    ) -> Result<(), ProbeError>;

    /// Ask the API server whether `caller` may perform `check`.
    async fn access_review(&self, caller: &Caller, check: &AccessCheck) -> Result<bool, ProbeError>;
}

/// Extract `metadata.name` from a manifest.
pub fn object_name(manifest: &Value) -> Option<&str> {
    manifest.get("metadata")?.get("name")?.as_str()
}
