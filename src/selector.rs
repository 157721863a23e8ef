// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stable filtering of the catalog by profile level and category.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::benchmark::{Descriptor, ProfileLevel};

/// Invalid selection or run parameters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("profile level must be a positive integer, got {0}")]
    InvalidProfileLevel(u8),

    #[error("invalid run id {0:?}: expected 1-10 lowercase alphanumerics")]
    InvalidRunId(String),
}

/// What to run: everything at or below `profile_level`, optionally narrowed
/// to one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCriteria")]
pub struct SelectionCriteria {
    pub profile_level: ProfileLevel,
    pub category: Option<String>,
}

#[derive(Deserialize)]
struct RawCriteria {
    profile_level: u8,
    #[serde(default)]
    category: Option<String>,
}

impl TryFrom<RawCriteria> for SelectionCriteria {
    type Error = ConfigurationError;

    fn try_from(raw: RawCriteria) -> Result<Self, Self::Error> {
        Self::new(raw.profile_level, raw.category.as_deref())
    }
}

impl SelectionCriteria {
    /// Levels above [`ProfileLevel::MAX`] are accepted and select everything.
    /// A blank category means no category filter.
    pub fn new(profile_level: u8, category: Option<&str>) -> Result<Self, ConfigurationError> {
        if profile_level == 0 {
            return Err(ConfigurationError::InvalidProfileLevel(profile_level));
        }
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        Ok(Self {
            profile_level: ProfileLevel::new(profile_level),
            category,
        })
    }

    /// Every defined level, no category filter.
    pub fn all() -> Self {
        Self {
            profile_level: ProfileLevel::MAX,
            category: None,
        }
    }

    pub fn matches(&self, descriptor: &Descriptor) -> bool {
        if descriptor.profile_level > self.profile_level {
            return false;
        }
        match &self.category {
            Some(category) => {
                descriptor.category.trim().eq_ignore_ascii_case(category)
                    || descriptor.category_name.trim().eq_ignore_ascii_case(category)
            }
            None => true,
        }
    }
}

impl Default for SelectionCriteria {
    fn default() -> Self {
        Self::all()
    }
}

/// Keep the descriptors matching `criteria`, in their original order.
///
/// An unmatched category yields an empty selection rather than an error.
pub fn select(all: &[Arc<Descriptor>], criteria: &SelectionCriteria) -> Vec<Arc<Descriptor>> {
    all.iter()
        .filter(|d| criteria.matches(d))
        .cloned()
        .collect()
}
