// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key naming policy for stored objects

use thiserror::Error;

/// Reasons a key can be rejected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("key is empty")]
    Empty,
    #[error("key '{0}' contains characters outside letters, digits, '-' and '_'")]
    InvalidCharacter(String),
    #[error("key '{0}' starts with '_', which is reserved for internal files")]
    ReservedPrefix(String),
}

/// Check a key against the storage naming policy.
///
/// Keys may contain ASCII letters, digits, hyphens, and underscores, and may
/// not start with an underscore. The leading-underscore namespace is kept
/// free for internal temporary and metadata files.
pub fn validate(key: &str) -> Result<(), KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }
    if key.starts_with('_') {
        return Err(KeyError::ReservedPrefix(key.to_string()));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(KeyError::InvalidCharacter(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "key_tests.rs"]
mod tests;
