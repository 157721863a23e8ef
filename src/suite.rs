// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Registry plus engine: `run(selection) -> SuiteReport`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::benchmark::Descriptor;
use crate::engine::ExecutionEngine;
use crate::registry::Registry;
use crate::result::SuiteReport;
use crate::selector::{self, SelectionCriteria};

pub struct Suite {
    registry: Arc<Registry>,
    engine: ExecutionEngine,
}

impl Suite {
    pub fn new(registry: Arc<Registry>, engine: ExecutionEngine) -> Self {
        Self { registry, engine }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn select(&self, criteria: &SelectionCriteria) -> Vec<Arc<Descriptor>> {
        selector::select(self.registry.all(), criteria)
    }

    pub async fn run(&self, criteria: &SelectionCriteria) -> SuiteReport {
        self.run_with_cancel(criteria, CancellationToken::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        criteria: &SelectionCriteria,
        cancel: CancellationToken,
    ) -> SuiteReport {
        let selection = self.select(criteria);
        tracing::debug!(
            profile_level = %criteria.profile_level,
            category = ?criteria.category,
            selected = selection.len(),
            "selection resolved"
        );
        self.engine.run_with_cancel(&selection, cancel).await
    }
}
