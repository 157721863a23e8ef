// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-process cluster used by tests and simulated runs.
//!
//! Models just enough of the API server for the catalog: namespaces, typed
//! objects, RBAC ownership of namespaces by the tenant (a RoleBinding naming
//! the tenant), PodSecurity-style admission and namespace defaults that show
//! up after a few reads. Every call is journaled and can be made to fail or
//! stall.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{
    object_name, AccessCheck, Caller, ClusterProbe, ObjectKind, ProbeError, TenantIdentity,
    WriteMode,
};

/// Pod admission strictness, mirroring the Pod Security Standards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PodSecurityLevel {
    Privileged,
    Baseline,
    Restricted,
}

/// How the simulated cluster enforces tenancy.
#[derive(Debug, Clone)]
pub struct ClusterPolicy {
    pub api_groups: Vec<String>,
    pub pod_security: PodSecurityLevel,
    /// Tenant may act on cluster-scoped resources.
    pub tenant_cluster_access: bool,
    /// Tenant may act in namespaces it is not bound in.
    pub tenant_cross_namespace: bool,
    /// Tenant may write quota and limit objects in its own namespace.
    pub tenant_modify_quotas: bool,
    /// Kinds the tenant may create in namespaces it is bound in.
    pub tenant_writable: BTreeSet<ObjectKind>,
    pub block_node_ports: bool,
    /// Objects a tenancy controller adds to every new namespace.
    pub namespace_defaults: Vec<(ObjectKind, Value)>,
    /// Number of list calls in a namespace before its defaults appear.
    pub defaults_after_reads: u32,
}

impl ClusterPolicy {
    /// A cluster that enforces every check in the catalog.
    pub fn secure() -> Self {
        Self {
            api_groups: default_api_groups(),
            pod_security: PodSecurityLevel::Restricted,
            tenant_cluster_access: false,
            tenant_cross_namespace: false,
            tenant_modify_quotas: false,
            tenant_writable: [
                ObjectKind::Pod,
                ObjectKind::Service,
                ObjectKind::ConfigMap,
                ObjectKind::Secret,
                ObjectKind::Role,
                ObjectKind::RoleBinding,
                ObjectKind::NetworkPolicy,
            ]
            .into_iter()
            .collect(),
            block_node_ports: true,
            namespace_defaults: vec![
                (
                    ObjectKind::ResourceQuota,
                    serde_json::json!({
                        "apiVersion": "v1",
                        "kind": "ResourceQuota",
                        "metadata": { "name": "tenant-quota" },
                        "spec": { "hard": { "requests.cpu": "4", "requests.memory": "8Gi", "pods": "20" } },
                    }),
                ),
                (
                    ObjectKind::NetworkPolicy,
                    serde_json::json!({
                        "apiVersion": "networking.k8s.io/v1",
                        "kind": "NetworkPolicy",
                        "metadata": { "name": "default-deny" },
                        "spec": { "podSelector": {}, "policyTypes": ["Ingress", "Egress"] },
                    }),
                ),
            ],
            defaults_after_reads: 0,
        }
    }

    /// A cluster that isolates nothing.
    pub fn permissive() -> Self {
        Self {
            pod_security: PodSecurityLevel::Privileged,
            tenant_cluster_access: true,
            tenant_cross_namespace: true,
            tenant_modify_quotas: true,
            block_node_ports: false,
            namespace_defaults: Vec::new(),
            ..Self::secure()
        }
    }
}

impl Default for ClusterPolicy {
    fn default() -> Self {
        Self::secure()
    }
}

fn default_api_groups() -> Vec<String> {
    ["", "apps", "rbac.authorization.k8s.io", "networking.k8s.io", "authorization.k8s.io"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Probe operations, for journaling and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeOp {
    ApiGroups,
    CreateNamespace,
    DeleteNamespace,
    CreateObject,
    GetObject,
    ListObjects,
    DeleteObject,
    AccessReview,
}

/// One journaled probe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCall {
    pub op: ProbeOp,
    pub namespace: Option<String>,
    pub kind: Option<ObjectKind>,
    pub as_tenant: bool,
}

enum FaultAction {
    Fail(ProbeError),
    Delay(Duration),
    /// Apply the request, then hold the response back.
    StallResponse(Duration),
}

struct Fault {
    op: ProbeOp,
    /// Only calls whose namespace contains this substring are affected.
    namespace_filter: Option<String>,
    action: FaultAction,
}

impl Fault {
    fn matches(&self, op: ProbeOp, namespace: Option<&str>) -> bool {
        if self.op != op {
            return false;
        }
        match (&self.namespace_filter, namespace) {
            (None, _) => true,
            (Some(filter), Some(ns)) => ns.contains(filter.as_str()),
            (Some(_), None) => false,
        }
    }
}

#[derive(Default)]
struct NamespaceState {
    objects: BTreeMap<(ObjectKind, String), Value>,
    pending_defaults: Vec<(ObjectKind, Value)>,
    reads: u32,
}

#[derive(Default)]
struct State {
    namespaces: BTreeMap<String, NamespaceState>,
    calls: Vec<ProbeCall>,
}

/// Deterministic in-memory [`ClusterProbe`].
pub struct InMemoryCluster {
    policy: ClusterPolicy,
    state: Mutex<State>,
    faults: Mutex<Vec<Fault>>,
}

impl InMemoryCluster {
    pub fn new(policy: ClusterPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(State::default()),
            faults: Mutex::new(Vec::new()),
        }
    }

    pub fn secure() -> Self {
        Self::new(ClusterPolicy::secure())
    }

    pub fn permissive() -> Self {
        Self::new(ClusterPolicy::permissive())
    }

    pub fn policy(&self) -> &ClusterPolicy {
        &self.policy
    }

    /// Make calls of `op` fail with `error`, optionally only in namespaces
    /// containing `namespace_filter`.
    pub fn fail_on(&self, op: ProbeOp, namespace_filter: Option<&str>, error: ProbeError) {
        self.faults.lock().push(Fault {
            op,
            namespace_filter: namespace_filter.map(str::to_string),
            action: FaultAction::Fail(error),
        });
    }

    /// Make calls of `op` stall for `delay` before proceeding.
    pub fn delay_on(&self, op: ProbeOp, namespace_filter: Option<&str>, delay: Duration) {
        self.faults.lock().push(Fault {
            op,
            namespace_filter: namespace_filter.map(str::to_string),
            action: FaultAction::Delay(delay),
        });
    }

    /// Make namespace creation take effect immediately but stall the
    /// response for `delay`, like a reply lost on the way back.
    pub fn stall_response_on(&self, namespace_filter: Option<&str>, delay: Duration) {
        self.faults.lock().push(Fault {
            op: ProbeOp::CreateNamespace,
            namespace_filter: namespace_filter.map(str::to_string),
            action: FaultAction::StallResponse(delay),
        });
    }

    /// Journal of every call made so far.
    pub fn calls(&self) -> Vec<ProbeCall> {
        self.state.lock().calls.clone()
    }

    /// Names of namespaces that currently exist.
    pub fn namespaces(&self) -> Vec<String> {
        self.state.lock().namespaces.keys().cloned().collect()
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.state.lock().namespaces.contains_key(name)
    }

    /// Seed a namespace directly, bypassing the journal.
    pub fn seed_namespace(&self, name: &str) {
        self.state.lock().namespaces.entry(name.to_string()).or_default();
    }

    /// Journal the call and apply any matching fault.
    async fn enter(
        &self,
        op: ProbeOp,
        namespace: Option<&str>,
        kind: Option<ObjectKind>,
        caller: &Caller,
    ) -> Result<(), ProbeError> {
        self.state.lock().calls.push(ProbeCall {
            op,
            namespace: namespace.map(str::to_string),
            kind,
            as_tenant: caller.is_tenant(),
        });

        let mut delay = Duration::ZERO;
        let mut failure = None;
        for fault in self.faults.lock().iter().filter(|f| f.matches(op, namespace)) {
            match &fault.action {
                FaultAction::Delay(d) => delay += *d,
                FaultAction::Fail(e) => {
                    if failure.is_none() {
                        failure = Some(e.clone());
                    }
                }
                FaultAction::StallResponse(_) => {}
            }
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Hold back the response of a call that has already been applied.
    async fn respond(&self, op: ProbeOp, namespace: Option<&str>) {
        let stall: Duration = self
            .faults
            .lock()
            .iter()
            .filter(|f| f.matches(op, namespace))
            .filter_map(|f| match f.action {
                FaultAction::StallResponse(d) => Some(d),
                _ => None,
            })
            .sum();
        if !stall.is_zero() {
            tokio::time::sleep(stall).await;
        }
    }

    fn authorize(&self, state: &State, caller: &Caller, check: &AccessCheck) -> bool {
        let Caller::Tenant(identity) = caller else {
            return true;
        };
        let Some(namespace) = check.namespace.as_deref() else {
            return self.policy.tenant_cluster_access;
        };
        let owned = state
            .namespaces
            .get(namespace)
            .map(|ns| tenant_bound(ns, identity))
            .unwrap_or(false);
        if !owned {
            return self.policy.tenant_cross_namespace;
        }
        if is_read(&check.verb) {
            return true;
        }
        match kind_for_resource(&check.resource) {
            Some(ObjectKind::ResourceQuota) | Some(ObjectKind::LimitRange) => {
                self.policy.tenant_modify_quotas
            }
            Some(kind) => self.policy.tenant_writable.contains(&kind),
            None => false,
        }
    }

    fn admit(&self, kind: ObjectKind, manifest: &Value) -> Result<(), ProbeError> {
        match kind {
            ObjectKind::Pod => match pod_violation(manifest, self.policy.pod_security) {
                Some(reason) => Err(ProbeError::unauthorized(format!(
                    "pods \"{}\" is forbidden: violates PodSecurity: {}",
                    object_name(manifest).unwrap_or_default(),
                    reason
                ))),
                None => Ok(()),
            },
            ObjectKind::Service if self.policy.block_node_ports => {
                let kind = manifest.pointer("/spec/type").and_then(Value::as_str);
                if kind == Some("NodePort") {
                    Err(ProbeError::unauthorized(
                        "admission webhook denied the request: NodePort services are not allowed",
                    ))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

fn is_read(verb: &str) -> bool {
    matches!(verb, "get" | "list" | "watch")
}

fn kind_for_resource(resource: &str) -> Option<ObjectKind> {
    [
        ObjectKind::Pod,
        ObjectKind::Service,
        ObjectKind::ConfigMap,
        ObjectKind::Secret,
        ObjectKind::Role,
        ObjectKind::RoleBinding,
        ObjectKind::NetworkPolicy,
        ObjectKind::ResourceQuota,
        ObjectKind::LimitRange,
    ]
    .into_iter()
    .find(|k| k.resource() == resource)
}

/// A namespace is owned by the tenant once a RoleBinding names it.
fn tenant_bound(ns: &NamespaceState, identity: &TenantIdentity) -> bool {
    ns.objects
        .iter()
        .filter(|((kind, _), _)| *kind == ObjectKind::RoleBinding)
        .filter_map(|(_, binding)| binding.get("subjects").and_then(Value::as_array))
        .flatten()
        .any(|subject| {
            let name = subject.get("name").and_then(Value::as_str).unwrap_or_default();
            match subject.get("kind").and_then(Value::as_str) {
                Some("User") => name == identity.user,
                Some("Group") => identity.groups.iter().any(|g| g == name),
                _ => false,
            }
        })
}

fn containers(manifest: &Value) -> impl Iterator<Item = &Value> {
    ["/spec/containers", "/spec/initContainers"]
        .into_iter()
        .filter_map(move |p| manifest.pointer(p).and_then(Value::as_array))
        .flatten()
}

const BASELINE_CAPABILITIES: &[&str] = &[
    "AUDIT_WRITE", "CHOWN", "DAC_OVERRIDE", "FOWNER", "FSETID", "KILL", "MKNOD",
    "NET_BIND_SERVICE", "SETFCAP", "SETGID", "SETPCAP", "SETUID", "SYS_CHROOT",
];

/// First Pod Security Standards violation of `manifest` at `level`.
fn pod_violation(manifest: &Value, level: PodSecurityLevel) -> Option<String> {
    if level == PodSecurityLevel::Privileged {
        return None;
    }

    for field in ["hostNetwork", "hostPID", "hostIPC"] {
        if manifest.pointer(&format!("/spec/{}", field)).and_then(Value::as_bool) == Some(true) {
            return Some(format!("host namespaces ({}=true)", field));
        }
    }
    let host_path = manifest
        .pointer("/spec/volumes")
        .and_then(Value::as_array)
        .map(|vols| vols.iter().any(|v| v.get("hostPath").is_some()))
        .unwrap_or(false);
    if host_path {
        return Some("hostPath volumes".to_string());
    }

    let pod_non_root = manifest.pointer("/spec/securityContext/runAsNonRoot").and_then(Value::as_bool);

    for c in containers(manifest) {
        let sc = c.get("securityContext");
        let flag = |name: &str| sc.and_then(|s| s.get(name)).and_then(Value::as_bool);

        if flag("privileged") == Some(true) {
            return Some("privileged containers".to_string());
        }
        let host_port = c
            .get("ports")
            .and_then(Value::as_array)
            .map(|ports| ports.iter().any(|p| p.get("hostPort").is_some()))
            .unwrap_or(false);
        if host_port {
            return Some("hostPort".to_string());
        }

        let added: Vec<&str> = sc
            .and_then(|s| s.pointer("/capabilities/add"))
            .and_then(Value::as_array)
            .map(|caps| caps.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let allowed: &[&str] = match level {
            PodSecurityLevel::Restricted => &["NET_BIND_SERVICE"],
            _ => BASELINE_CAPABILITIES,
        };
        if let Some(cap) = added.iter().find(|cap| !allowed.contains(*cap)) {
            return Some(format!("non-default capabilities ({})", cap));
        }

        if level == PodSecurityLevel::Restricted {
            if flag("allowPrivilegeEscalation") != Some(false) {
                return Some("allowPrivilegeEscalation != false".to_string());
            }
            if flag("runAsNonRoot").or(pod_non_root) != Some(true) {
                return Some("runAsNonRoot != true".to_string());
            }
        }
    }
    None
}

#[async_trait]
impl ClusterProbe for InMemoryCluster {
    async fn api_groups(&self) -> Result<Vec<String>, ProbeError> {
        self.enter(ProbeOp::ApiGroups, None, None, &Caller::Admin).await?;
        Ok(self.policy.api_groups.clone())
    }

    async fn create_namespace(
        &self,
        name: &str,
        _labels: &BTreeMap<String, String>,
    ) -> Result<(), ProbeError> {
        self.enter(ProbeOp::CreateNamespace, Some(name), None, &Caller::Admin).await?;
        {
            let mut state = self.state.lock();
            if state.namespaces.contains_key(name) {
                return Err(ProbeError::already_exists(format!("namespaces \"{}\" already exists", name)));
            }
            state.namespaces.insert(
                name.to_string(),
                NamespaceState {
                    pending_defaults: self.policy.namespace_defaults.clone(),
                    ..Default::default()
                },
            );
        }
        self.respond(ProbeOp::CreateNamespace, Some(name)).await;
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), ProbeError> {
        self.enter(ProbeOp::DeleteNamespace, Some(name), None, &Caller::Admin).await?;
        match self.state.lock().namespaces.remove(name) {
            Some(_) => Ok(()),
            None => Err(ProbeError::not_found(format!("namespaces \"{}\" not found", name))),
        }
    }

    async fn create_object(
        &self,
        caller: &Caller,
        namespace: &str,
        kind: ObjectKind,
        manifest: &Value,
        mode: WriteMode,
    ) -> Result<Value, ProbeError> {
        self.enter(ProbeOp::CreateObject, Some(namespace), Some(kind), caller).await?;
        let name = object_name(manifest)
            .ok_or_else(|| ProbeError::unknown("metadata.name: Required value"))?
            .to_string();

        let mut state = self.state.lock();
        if !self.authorize(&state, caller, &AccessCheck::namespaced("create", kind, namespace)) {
            return Err(ProbeError::unauthorized(format!(
                "{} is forbidden: cannot create resource in namespace \"{}\"",
                kind.resource(),
                namespace
            )));
        }
        self.admit(kind, manifest)?;

        let ns = state
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| ProbeError::not_found(format!("namespaces \"{}\" not found", namespace)))?;
        let key = (kind, name.clone());
        if ns.objects.contains_key(&key) {
            return Err(ProbeError::already_exists(format!(
                "{} \"{}\" already exists",
                kind.resource(),
                name
            )));
        }
        if mode == WriteMode::Persist {
            ns.objects.insert(key, manifest.clone());
        }
        Ok(manifest.clone())
    }

    async fn get_object(
        &self,
        caller: &Caller,
        namespace: &str,
        kind: ObjectKind,
        name: &str,
    ) -> Result<Value, ProbeError> {
        self.enter(ProbeOp::GetObject, Some(namespace), Some(kind), caller).await?;
        let state = self.state.lock();
        if !self.authorize(&state, caller, &AccessCheck::namespaced("get", kind, namespace)) {
            return Err(ProbeError::unauthorized(format!("{} is forbidden", kind.resource())));
        }
        state
            .namespaces
            .get(namespace)
            .and_then(|ns| ns.objects.get(&(kind, name.to_string())))
            .cloned()
            .ok_or_else(|| ProbeError::not_found(format!("{} \"{}\" not found", kind.resource(), name)))
    }

    async fn list_objects(
        &self,
        caller: &Caller,
        namespace: &str,
        kind: ObjectKind,
    ) -> Result<Vec<Value>, ProbeError> {
        self.enter(ProbeOp::ListObjects, Some(namespace), Some(kind), caller).await?;
        let mut state = self.state.lock();
        if !self.authorize(&state, caller, &AccessCheck::namespaced("list", kind, namespace)) {
            return Err(ProbeError::unauthorized(format!("{} is forbidden", kind.resource())));
        }
        let ns = state
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| ProbeError::not_found(format!("namespaces \"{}\" not found", namespace)))?;

        ns.reads += 1;
        if ns.reads > self.policy.defaults_after_reads && !ns.pending_defaults.is_empty() {
            for (k, obj) in std::mem::take(&mut ns.pending_defaults) {
                let name = object_name(&obj).unwrap_or_default().to_string();
                ns.objects.entry((k, name)).or_insert(obj);
            }
        }

        Ok(ns
            .objects
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn delete_object(
        &self,
        namespace: &str,
        kind: ObjectKind,
        name: &str,
    ) -> Result<(), ProbeError> {
        self.enter(ProbeOp::DeleteObject, Some(namespace), Some(kind), &Caller::Admin).await?;
        self.state
            .lock()
            .namespaces
            .get_mut(namespace)
            .and_then(|ns| ns.objects.remove(&(kind, name.to_string())))
            .map(|_| ())
            .ok_or_else(|| ProbeError::not_found(format!("{} \"{}\" not found", kind.resource(), name)))
    }

    async fn access_review(&self, caller: &Caller, check: &AccessCheck) -> Result<bool, ProbeError> {
        self.enter(ProbeOp::AccessReview, check.namespace.as_deref(), None, caller).await?;
        let state = self.state.lock();
        Ok(self.authorize(&state, caller, check))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tenant() -> Caller {
        Caller::Tenant(TenantIdentity::new("alice"))
    }

    fn binding(user: &str) -> Value {
        json!({
            "metadata": { "name": "tenant-admin" },
            "subjects": [{ "kind": "User", "name": user }],
            "roleRef": { "kind": "ClusterRole", "name": "admin" },
        })
    }

    async fn owned_namespace(cluster: &InMemoryCluster, name: &str) {
        cluster.create_namespace(name, &BTreeMap::new()).await.unwrap();
        cluster
            .create_object(&Caller::Admin, name, ObjectKind::RoleBinding, &binding("alice"), WriteMode::Persist)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_namespace_lifecycle() {
        let cluster = InMemoryCluster::secure();
        cluster.create_namespace("a", &BTreeMap::new()).await.unwrap();
        let err = cluster.create_namespace("a", &BTreeMap::new()).await.unwrap_err();
        assert_eq!(err.kind, crate::probe::ProbeErrorKind::AlreadyExists);
        cluster.delete_namespace("a").await.unwrap();
        assert!(cluster.delete_namespace("a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_tenant_confined_to_bound_namespace() {
        let cluster = InMemoryCluster::secure();
        owned_namespace(&cluster, "mine").await;
        cluster.create_namespace("theirs", &BTreeMap::new()).await.unwrap();

        let own = AccessCheck::namespaced("list", ObjectKind::Pod, "mine");
        let other = AccessCheck::namespaced("list", ObjectKind::Pod, "theirs");
        assert!(cluster.access_review(&tenant(), &own).await.unwrap());
        assert!(!cluster.access_review(&tenant(), &other).await.unwrap());
        assert!(!cluster
            .access_review(&tenant(), &AccessCheck::cluster("list", "", "nodes"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_restricted_rejects_privileged_pod() {
        let cluster = InMemoryCluster::secure();
        owned_namespace(&cluster, "mine").await;
        let pod = json!({
            "metadata": { "name": "p" },
            "spec": { "containers": [{ "name": "c", "image": "busybox",
                "securityContext": { "privileged": true } }] },
        });
        let err = cluster
            .create_object(&tenant(), "mine", ObjectKind::Pod, &pod, WriteMode::DryRun)
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert!(err.detail.contains("privileged"));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_persist() {
        let cluster = InMemoryCluster::permissive();
        owned_namespace(&cluster, "mine").await;
        let cm = json!({ "metadata": { "name": "cm" } });
        cluster
            .create_object(&tenant(), "mine", ObjectKind::ConfigMap, &cm, WriteMode::DryRun)
            .await
            .unwrap();
        let err = cluster
            .get_object(&Caller::Admin, "mine", ObjectKind::ConfigMap, "cm")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_defaults_appear_after_reads() {
        let policy = ClusterPolicy { defaults_after_reads: 2, ..ClusterPolicy::secure() };
        let cluster = InMemoryCluster::new(policy);
        cluster.create_namespace("a", &BTreeMap::new()).await.unwrap();

        for _ in 0..2 {
            let quotas = cluster.list_objects(&Caller::Admin, "a", ObjectKind::ResourceQuota).await.unwrap();
            assert!(quotas.is_empty());
        }
        let quotas = cluster.list_objects(&Caller::Admin, "a", ObjectKind::ResourceQuota).await.unwrap();
        assert_eq!(quotas.len(), 1);
    }

    #[tokio::test]
    async fn test_fault_injection_filters_by_namespace() {
        let cluster = InMemoryCluster::secure();
        cluster.fail_on(ProbeOp::CreateNamespace, Some("bad"), ProbeError::unauthorized("nope"));
        assert!(cluster.create_namespace("good-1", &BTreeMap::new()).await.is_ok());
        let err = cluster.create_namespace("bad-1", &BTreeMap::new()).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(cluster.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_response_is_applied_first() {
        let cluster = InMemoryCluster::secure();
        cluster.stall_response_on(Some("slow"), Duration::from_secs(120));

        let labels = BTreeMap::new();
        let pending = cluster.create_namespace("slow-1", &labels);
        let res = tokio::time::timeout(Duration::from_secs(1), pending).await;

        assert!(res.is_err());
        assert!(cluster.has_namespace("slow-1"));
        assert!(cluster.create_namespace("fast-1", &BTreeMap::new()).await.is_ok());
    }

    #[test]
    fn test_pod_violation_levels() {
        let escalate = json!({ "spec": { "containers": [{ "name": "c",
            "securityContext": { "allowPrivilegeEscalation": true, "runAsNonRoot": true } }] } });
        assert!(pod_violation(&escalate, PodSecurityLevel::Baseline).is_none());
        assert!(pod_violation(&escalate, PodSecurityLevel::Restricted).is_some());

        let host = json!({ "spec": { "hostNetwork": true, "containers": [] } });
        assert!(pod_violation(&host, PodSecurityLevel::Baseline).is_some());
        assert!(pod_violation(&host, PodSecurityLevel::Privileged).is_none());
    }
}
