// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-key serialization and cross-key parallelism specs.

use crate::prelude::*;
use stash_core::LockManager;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_stores_on_one_key_leave_one_valid_object() {
    let f = fixture().await;

    let mut handles = Vec::new();
    for revision in 0..32u64 {
        let store = Arc::clone(&f.store);
        handles.push(tokio::spawn(async move {
            store
                .store("hot", &Record::new("hot", revision))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let record = f.store.load("hot").await.unwrap();
    assert_eq!(record.key, "hot");
    assert!(record.revision < 32);
    assert_eq!(f.store.count().await.unwrap(), 1);
    assert_eq!(f.store.active_locks(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn distinct_keys_run_in_parallel() {
    let locks = Arc::new(LockManager::new());
    let started = Instant::now();

    let mut handles = Vec::new();
    for i in 0..8 {
        let locks = Arc::clone(&locks);
        handles.push(tokio::spawn(async move {
            let key = format!("key-{i}");
            locks
                .run_exclusive(&key, || async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                })
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Eight 100ms holds on distinct keys overlap; serialized they would
    // take 800ms.
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(locks.active_keys(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn mixed_churn_leaves_no_lock_state() {
    let f = fixture().await;

    let mut handles = Vec::new();
    for worker in 0..8u64 {
        let store = Arc::clone(&f.store);
        handles.push(tokio::spawn(async move {
            for round in 0..16u64 {
                let key = format!("k{}", (worker + round) % 4);
                store.store(&key, &Record::new(&key, round)).await.unwrap();
                let _ = store.exists(&key).await.unwrap();
                match store.load(&key).await {
                    Ok(record) => assert_eq!(record.key, key),
                    Err(stash_storage::StoreError::NotFound(_)) => {} // raced a delete
                    Err(e) => panic!("unexpected error: {e}"),
                }
                if round % 3 == 0 {
                    store.delete(&key).await.unwrap();
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(f.store.active_locks(), 0);
    let remaining = f.store.list_all().await.unwrap();
    assert_eq!(remaining.len(), f.store.count().await.unwrap());
}
