// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-execution view handed to benchmark hooks.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use super::BenchmarkError;
use crate::engine::namespace::{self, RunId};
use crate::probe::{Caller, ClusterProbe, ObjectKind, ProbeError, ProbeErrorKind, TenantIdentity};

/// Polling schedule for eventually-consistent checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            attempts: 15,
        }
    }
}

/// Everything a benchmark may touch while it executes.
///
/// Namespaces are named and created by the engine; a benchmark only chooses
/// a label for extra ones. Every namespace created through the context is
/// recorded before the create call is issued and deleted by the engine
/// during cleanup, whatever stage the benchmark reached.
pub struct BenchContext {
    probe: Arc<dyn ClusterProbe>,
    benchmark_id: String,
    namespace: String,
    run_id: RunId,
    tenant: TenantIdentity,
    poll: PollConfig,
    owned: Mutex<Vec<String>>,
}

impl BenchContext {
    pub(crate) fn new(
        probe: Arc<dyn ClusterProbe>,
        benchmark_id: &str,
        run_id: RunId,
        tenant: TenantIdentity,
        poll: PollConfig,
    ) -> Self {
        Self {
            namespace: run_id.namespace_for(benchmark_id),
            probe,
            benchmark_id: benchmark_id.to_string(),
            run_id,
            tenant,
            poll,
            owned: Mutex::new(Vec::new()),
        }
    }

    pub fn probe(&self) -> &dyn ClusterProbe {
        self.probe.as_ref()
    }

    pub fn benchmark_id(&self) -> &str {
        &self.benchmark_id
    }

    /// The benchmark's primary namespace. The tenant is bound to the `admin`
    /// ClusterRole inside it.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn tenant_identity(&self) -> &TenantIdentity {
        &self.tenant
    }

    /// Caller for requests issued as the tenant.
    pub fn tenant(&self) -> Caller {
        Caller::Tenant(self.tenant.clone())
    }

    pub fn poll(&self) -> PollConfig {
        self.poll
    }

    /// Create an extra namespace owned by this run, e.g. a peer tenant's.
    ///
    /// The tenant receives no binding in it. Returns the generated name.
    pub async fn provision_namespace(&self, label: &str) -> Result<String, BenchmarkError> {
        let name = self.extra_namespace(label);
        self.create_owned(&name, None).await?;
        Ok(name)
    }

    /// Name of the extra namespace for `label`; stable for the whole run, so
    /// `run` can find what `setup` provisioned.
    pub fn extra_namespace(&self, label: &str) -> String {
        self.run_id
            .namespace_for(&format!("{}/{}", self.benchmark_id, label))
    }

    /// Fail with `Precondition` unless the cluster serves `group`.
    pub async fn require_api_group(&self, group: &str) -> Result<(), BenchmarkError> {
        let groups = self.probe.api_groups().await?;
        if groups.iter().any(|g| g == group) {
            Ok(())
        } else {
            Err(BenchmarkError::Precondition(format!(
                "API group {} is not served by the cluster",
                group
            )))
        }
    }

    /// Poll the primary namespace until an object of `kind` satisfies `matches`.
    ///
    /// Returns `None` once the poll budget is exhausted.
    pub async fn wait_for_object<F>(
        &self,
        kind: ObjectKind,
        matches: F,
    ) -> Result<Option<Value>, ProbeError>
    where
        F: Fn(&Value) -> bool + Send + Sync,
    {
        let attempts = self.poll.attempts.max(1);
        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.poll.interval).await;
            }
            let items = self
                .probe
                .list_objects(&Caller::Admin, &self.namespace, kind)
                .await?;
            if let Some(found) = items.into_iter().find(|item| matches(item)) {
                return Ok(Some(found));
            }
            tracing::trace!(%kind, attempt, "object not present yet");
        }
        Ok(None)
    }

    /// Create the primary namespace and bind the tenant inside it.
    pub(crate) async fn provision_primary(&self) -> Result<(), ProbeError> {
        self.create_owned(&self.namespace, Some(&self.tenant)).await
    }

    /// Record `name` for cleanup, then create it.
    ///
    /// The name is recorded first so a create that is applied but whose
    /// response never arrives (deadline or cancellation) is still removed.
    /// A namespace that already existed is dropped from the record again,
    /// so cleanup cannot remove one this run did not create.
    async fn create_owned(
        &self,
        name: &str,
        tenant: Option<&TenantIdentity>,
    ) -> Result<(), ProbeError> {
        let labels = namespace::labels(&self.run_id, &self.benchmark_id);
        let recorded = self.track(name);
        if let Err(e) = self.probe.create_namespace(name, &labels).await {
            if recorded && e.kind == ProbeErrorKind::AlreadyExists {
                self.untrack(name);
            }
            return Err(e);
        }
        if let Some(tenant) = tenant {
            namespace::bind_tenant(self.probe.as_ref(), name, tenant).await?;
        }
        tracing::debug!(namespace = name, "namespace provisioned");
        Ok(())
    }

    /// Namespaces the engine must remove, most recent first.
    pub(crate) fn owned_namespaces(&self) -> Vec<String> {
        self.owned.lock().iter().rev().cloned().collect()
    }

    /// Returns false when `name` was already recorded.
    fn track(&self, name: &str) -> bool {
        let mut owned = self.owned.lock();
        if owned.iter().any(|n| n == name) {
            return false;
        }
        owned.push(name.to_string());
        true
    }

    fn untrack(&self, name: &str) {
        self.owned.lock().retain(|n| n != name);
    }
}
