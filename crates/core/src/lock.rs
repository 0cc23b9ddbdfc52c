// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-key exclusive locking
//!
//! Guarantees at most one in-flight work unit per key while keys that are
//! not in use carry no state at all. Locks are created lazily on first use
//! and removed the moment the last operation referencing the key finishes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// One registered key: its exclusive lock plus the number of in-flight
/// operations referencing it (the current holder and anyone queued behind).
struct Slot {
    mutex: Arc<tokio::sync::Mutex<()>>,
    refs: usize,
}

/// Serializes work units per key.
///
/// The registry maps each in-use key to its lock. A slot present in the
/// registry always has at least one referencing operation; when the count
/// drops to zero the slot is removed in the same critical section, so the
/// registry converges to empty whenever the manager is idle.
///
/// The per-key mutex is tokio's, which admits waiters in FIFO order, so
/// contending operations on one key acquire in registration order. There is
/// no ordering across distinct keys, and no timeout: a waiter blocks until
/// the holder finishes. Callers needing bounded waits wrap the call
/// externally; cancellation at any await point still deregisters cleanly.
#[derive(Default)]
pub struct LockManager {
    registry: Mutex<HashMap<String, Slot>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Run `work` while holding the exclusive lock for `key`.
    ///
    /// Work units for the same key never overlap; work units for different
    /// keys do not block each other. The output of `work` is returned
    /// unmodified, success or failure - only the registry bookkeeping is
    /// guaranteed to run regardless of the outcome.
    pub async fn run_exclusive<F, Fut, T>(&self, key: &str, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lease = self.register(key);
        // Waiting happens here, outside the registry guard, so contention on
        // one key never stalls operations on another.
        let guard = Arc::clone(&lease.mutex).lock_owned().await;
        let out = work().await;
        // Deregister while the per-key lock is still held: a concurrent
        // arrival either finds this slot live and increments it, or finds no
        // slot and creates a fresh one - never a slot mid-teardown.
        drop(lease);
        drop(guard);
        out
    }

    /// Number of keys with at least one in-flight operation.
    pub fn active_keys(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Record intent to operate on `key` before any blocking can happen.
    ///
    /// The increment must land while the registry guard is held and before
    /// waiting on the per-key lock; otherwise a finishing operation could
    /// decide the key is unused and tear the slot down under a caller that
    /// is about to wait on it.
    fn register(&self, key: &str) -> Lease<'_> {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let slot = registry.entry(key.to_string()).or_insert_with(|| Slot {
            mutex: Arc::new(tokio::sync::Mutex::new(())),
            refs: 0,
        });
        slot.refs += 1;
        Lease {
            manager: self,
            key: key.to_string(),
            mutex: Arc::clone(&slot.mutex),
        }
    }

    #[cfg(test)]
    fn refs(&self, key: &str) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .map_or(0, |slot| slot.refs)
    }
}

/// In-flight registration for one `run_exclusive` call.
///
/// Dropping the lease decrements the slot's reference count and removes the
/// slot at zero. Drop also runs when the caller is cancelled while still
/// queued for the lock, so a registration can never outlive its operation.
struct Lease<'a> {
    manager: &'a LockManager,
    key: String,
    mutex: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        let mut registry = self
            .manager
            .registry
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        match registry.get_mut(&self.key) {
            Some(slot) => {
                slot.refs -= 1;
                if slot.refs == 0 {
                    registry.remove(&self.key);
                }
            }
            None => {
                // A live lease always has a registered slot; reaching this
                // arm means the refcounting is broken somewhere.
                debug_assert!(false, "lease dropped for unregistered key '{}'", self.key);
            }
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
