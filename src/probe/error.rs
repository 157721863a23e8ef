// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cluster probe error types.
//!
//! Every probe operation fails with a [`ProbeError`] whose kind is one of a
//! closed set. Benchmarks branch on the kind; the engine only records it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed cluster-API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    /// Authentication failed, RBAC forbade the call, or admission denied it.
    Unauthorized,
    NotFound,
    AlreadyExists,
    Timeout,
    Unknown,
}

impl ProbeErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed cluster-API call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {detail}")]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub detail: String,
}

impl ProbeError {
    pub fn new(kind: ProbeErrorKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Unauthorized, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::NotFound, detail)
    }

    pub fn already_exists(detail: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::AlreadyExists, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Timeout, detail)
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Unknown, detail)
    }

    /// Map an API server response status to a probe error.
    ///
    /// Admission webhooks and PodSecurity reject with 400/403/422; a 400 or
    /// 422 whose message reports a denial is treated as `Unauthorized`.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = match status {
            401 | 403 => ProbeErrorKind::Unauthorized,
            404 => ProbeErrorKind::NotFound,
            409 => ProbeErrorKind::AlreadyExists,
            408 | 504 => ProbeErrorKind::Timeout,
            400 | 422 if is_denial_message(&message) => ProbeErrorKind::Unauthorized,
            _ => ProbeErrorKind::Unknown,
        };
        Self::new(kind, format!("HTTP {}: {}", status, message))
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ProbeErrorKind::Unauthorized
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ProbeErrorKind::NotFound
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ProbeErrorKind::Timeout
    }
}

fn is_denial_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("denied") || lower.contains("forbidden") || lower.contains("violates")
}
