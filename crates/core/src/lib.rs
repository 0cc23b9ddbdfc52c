// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! stash-core: keyed locking for the stash object store
//!
//! This crate provides:
//! - A reference-counted per-key lock manager (`LockManager`)
//! - The key naming policy shared by storage layers (`key`)

pub mod key;
pub mod lock;

// Re-exports
pub use key::KeyError;
pub use lock::LockManager;
