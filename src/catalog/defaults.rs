// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Objects a tenancy controller must place in every new tenant namespace.
//!
//! Controllers reconcile asynchronously, so an absent object on the first
//! look is only provisional; `verify` polls before confirming the failure.

use async_trait::async_trait;
use serde_json::Value;

use crate::benchmark::{BenchContext, Benchmark, BenchmarkError, Verdict};
use crate::probe::{Caller, ObjectKind};

/// What the default object has to look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// A quota with at least one hard limit.
    HardLimits,
    /// A policy selecting every pod and allowing no ingress.
    DenyAllIngress,
}

impl Requirement {
    pub fn is_met_by(&self, object: &Value) -> bool {
        match self {
            Self::HardLimits => object
                .pointer("/spec/hard")
                .and_then(Value::as_object)
                .map(|hard| !hard.is_empty())
                .unwrap_or(false),
            Self::DenyAllIngress => {
                let selects_all = object
                    .pointer("/spec/podSelector")
                    .and_then(Value::as_object)
                    .map(|sel| sel.values().all(is_empty_value))
                    .unwrap_or(false);
                let covers_ingress = object
                    .pointer("/spec/policyTypes")
                    .and_then(Value::as_array)
                    .map(|types| types.iter().any(|t| t == "Ingress"))
                    // policyTypes defaults to ["Ingress"] when unset
                    .unwrap_or(true);
                let no_rules = object
                    .pointer("/spec/ingress")
                    .map(is_empty_value)
                    .unwrap_or(true);
                selects_all && covers_ingress && no_rules
            }
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::HardLimits => "resource quota with hard limits",
            Self::DenyAllIngress => "default-deny ingress network policy",
        }
    }
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// A freshly provisioned tenant namespace receives a conforming default.
pub struct NamespaceDefault {
    kind: ObjectKind,
    requirement: Requirement,
}

impl NamespaceDefault {
    pub fn new(kind: ObjectKind, requirement: Requirement) -> Self {
        Self { kind, requirement }
    }

    fn finding(&self, ctx: &BenchContext) -> String {
        format!(
            "no {} found in namespace {}",
            self.requirement.describe(),
            ctx.namespace()
        )
    }
}

#[async_trait]
impl Benchmark for NamespaceDefault {
    async fn pre_run(&self, ctx: &BenchContext) -> Result<(), BenchmarkError> {
        ctx.require_api_group(self.kind.group()).await
    }

    async fn run(&self, ctx: &BenchContext) -> Result<Verdict, BenchmarkError> {
        let objects = ctx
            .probe()
            .list_objects(&Caller::Admin, ctx.namespace(), self.kind)
            .await?;
        if objects.iter().any(|o| self.requirement.is_met_by(o)) {
            Ok(Verdict::Pass)
        } else {
            Ok(Verdict::fail(self.finding(ctx)))
        }
    }

    async fn verify(&self, ctx: &BenchContext, verdict: Verdict) -> Result<Verdict, BenchmarkError> {
        if verdict == Verdict::Pass {
            return Ok(verdict);
        }
        let requirement = self.requirement;
        let found = ctx
            .wait_for_object(self.kind, move |o| requirement.is_met_by(o))
            .await?;
        match found {
            Some(_) => Ok(Verdict::Pass),
            None => {
                let poll = ctx.poll();
                Ok(Verdict::fail(format!(
                    "{} after {} polls {:?} apart",
                    self.finding(ctx),
                    poll.attempts,
                    poll.interval
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hard_limits() {
        let quota = json!({ "spec": { "hard": { "pods": "10" } } });
        assert!(Requirement::HardLimits.is_met_by(&quota));
        assert!(!Requirement::HardLimits.is_met_by(&json!({ "spec": { "hard": {} } })));
        assert!(!Requirement::HardLimits.is_met_by(&json!({})));
    }

    #[test]
    fn test_deny_all_ingress() {
        let deny = json!({ "spec": { "podSelector": {}, "policyTypes": ["Ingress", "Egress"] } });
        assert!(Requirement::DenyAllIngress.is_met_by(&deny));

        let implicit = json!({ "spec": { "podSelector": {} } });
        assert!(Requirement::DenyAllIngress.is_met_by(&implicit));

        let egress_only = json!({ "spec": { "podSelector": {}, "policyTypes": ["Egress"] } });
        assert!(!Requirement::DenyAllIngress.is_met_by(&egress_only));

        let allows = json!({ "spec": { "podSelector": {}, "ingress": [{}] } });
        assert!(!Requirement::DenyAllIngress.is_met_by(&allows));

        let scoped = json!({ "spec": { "podSelector": { "matchLabels": { "app": "x" } } } });
        assert!(!Requirement::DenyAllIngress.is_met_by(&scoped));
    }
}
