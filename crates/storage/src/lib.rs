// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! stash-storage: file-backed keyed object persistence
//!
//! Persists one serialized object per file under a storage root, with every
//! keyed operation serialized through the per-key lock manager from
//! stash-core and writes staged through an atomic rename.

pub mod store;

pub use store::{FileStore, StoreError};
