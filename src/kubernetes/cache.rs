// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory cache of resource type resolutions
//!
//! Maps a lowercase plural name to the outcome of discovering it. Entries
//! are written once and live for the whole process: discovery is assumed
//! stable, and the key space is bounded by the type names callers ask for.
//!
//! Negative outcomes are cached too, so an unknown name costs one discovery
//! run rather than one per request. Transport failures are not outcomes and
//! leave the entry unresolved.
//!
//! Thread safety:
//! - The key map sits behind a `std::sync::Mutex` that is only held to fetch
//!   or insert a per-key cell, never across an await point
//! - Each key owns a `tokio::sync::OnceCell`, so concurrent callers for the
//!   same key share one discovery run instead of racing their own

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

use super::discovery::ResourceDescriptor;
use crate::error::DiagError;

/// State of one plural name in the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Never looked up, or the last attempt failed before an answer
    Unresolved,
    /// Looked up and resolved to this descriptor
    Found(ResourceDescriptor),
    /// Looked up and definitively absent from the cluster
    NotFound,
}

impl From<Option<ResourceDescriptor>> for Resolution {
    fn from(found: Option<ResourceDescriptor>) -> Self {
        match found {
            Some(descriptor) => Resolution::Found(descriptor),
            None => Resolution::NotFound,
        }
    }
}

/// Write-once, process-wide resolution cache
#[derive(Default)]
pub struct ResolutionCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Resolution>>>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for a key, without triggering discovery
    pub fn lookup(&self, key: &str) -> Resolution {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .and_then(|cell| cell.get().cloned())
            .unwrap_or(Resolution::Unresolved)
    }

    /// Return the cached outcome for `key`, running `discover` if there is none
    ///
    /// Only one `discover` runs per key at a time. Its `Ok` value is stored
    /// for good; an `Err` is returned to this caller and the key stays
    /// unresolved so the next caller tries again.
    pub async fn get_or_resolve<F, Fut>(&self, key: &str, discover: F) -> Result<Resolution, DiagError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<ResourceDescriptor>, DiagError>>,
    {
        let cell = self.cell(key);
        let resolution = cell
            .get_or_try_init(|| async move { discover().await.map(Resolution::from) })
            .await?;
        Ok(resolution.clone())
    }

    /// Number of keys with a stored outcome
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|cell| cell.initialized()).count()
    }

    fn cell(&self, key: &str) -> Arc<OnceCell<Resolution>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(key.to_string()).or_default())
    }
}
