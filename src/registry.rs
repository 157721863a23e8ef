// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark catalog.
//!
//! Built once by an initialization function and then shared read-only; there
//! is no removal and no global instance.

use std::sync::Arc;

use thiserror::Error;

use crate::benchmark::Descriptor;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate benchmark id: {0}")]
    DuplicateId(String),

    #[error("benchmark {id} has undefined profile level {level}")]
    InvalidProfileLevel { id: String, level: u8 },
}

/// Ordered, append-only set of benchmark descriptors.
#[derive(Debug, Default)]
pub struct Registry {
    descriptors: Vec<Arc<Descriptor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a descriptor. Ids must be unique.
    pub fn register(&mut self, descriptor: Descriptor) -> Result<(), RegistryError> {
        if self.get(&descriptor.id).is_some() {
            return Err(RegistryError::DuplicateId(descriptor.id));
        }
        if !descriptor.profile_level.is_defined() {
            return Err(RegistryError::InvalidProfileLevel {
                level: descriptor.profile_level.get(),
                id: descriptor.id,
            });
        }
        tracing::trace!(id = %descriptor.id, "benchmark registered");
        self.descriptors.push(Arc::new(descriptor));
        Ok(())
    }

    /// Every descriptor, in registration order.
    pub fn all(&self) -> &[Arc<Descriptor>] {
        &self.descriptors
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Descriptor>> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Distinct category tags in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for d in &self.descriptors {
            if !seen.contains(&d.category.as_str()) {
                seen.push(&d.category);
            }
        }
        seen
    }
}
