// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Graceful shutdown coordination.
//!
//! Every benchmark holds a [`ShutdownGuard`] while it is in flight. On
//! interrupt the binary stops admitting new benchmarks and waits, bounded by
//! the cleanup grace period, for the in-flight ones to finish their cleanup.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Notify;

/// Shutdown state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

/// Result of waiting for drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult {
    Complete,
    Timeout { remaining: u32 },
}

/// Tracks in-flight benchmarks across engine tasks.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    state: Arc<RwLock<ShutdownState>>,
    in_flight: Arc<AtomicU32>,
    notify: Arc<Notify>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ShutdownState::Running)),
            in_flight: Arc::new(AtomicU32::new(0)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.read()
    }

    /// Whether new benchmarks may start.
    pub fn is_accepting(&self) -> bool {
        self.state() == ShutdownState::Running
    }

    /// Track an in-flight benchmark. Returns None once draining.
    pub fn track(&self) -> Option<ShutdownGuard> {
        let state = self.state.read();
        if *state != ShutdownState::Running {
            return None;
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(ShutdownGuard {
            counter: self.in_flight.clone(),
            notify: self.notify.clone(),
        })
    }

    pub fn in_flight_count(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stop admitting new benchmarks without waiting.
    pub fn begin_drain(&self) {
        let mut state = self.state.write();
        if *state == ShutdownState::Running {
            *state = ShutdownState::Draining;
        }
    }

    /// Stop admitting and wait up to `timeout` for in-flight benchmarks.
    pub async fn initiate(&self, timeout: Duration) -> ShutdownResult {
        self.begin_drain();
        let result = self.wait_for_drain(timeout).await;
        *self.state.write() = ShutdownState::Stopped;

        match &result {
            ShutdownResult::Complete => tracing::info!("all in-flight benchmarks drained"),
            ShutdownResult::Timeout { remaining } => {
                tracing::warn!(remaining, "drain timed out; abandoning in-flight benchmarks")
            }
        }
        result
    }

    async fn wait_for_drain(&self, timeout: Duration) -> ShutdownResult {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Register interest before reading the count so a guard dropped
            // in between is not missed.
            let notified = self.notify.notified();
            let count = self.in_flight_count();
            if count == 0 {
                return ShutdownResult::Complete;
            }

            tokio::select! {
                _ = notified => continue,
                _ = tokio::time::sleep_until(deadline) => {
                    let final_count = self.in_flight_count();
                    if final_count == 0 {
                        return ShutdownResult::Complete;
                    }
                    return ShutdownResult::Timeout { remaining: final_count };
                }
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for one in-flight benchmark.
pub struct ShutdownGuard {
    counter: Arc<AtomicU32>,
    notify: Arc<Notify>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}
