// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cache;
mod client;
pub mod discovery;
mod executor;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::error::DiagError;

pub use cache::{Resolution, ResolutionCache};
pub use client::{ClusterSession, ConnectOptions};
pub use discovery::{ResourceDescriptor, Resolver};
pub use executor::QueryExecutor;

/// Parameters to push down to the Kubernetes API
#[derive(Debug, Clone, Default)]
pub struct ApiFilters {
    /// Label selector string (e.g., "app=nginx,version=v1")
    pub label_selector: Option<String>,
}

/// One API group at one version, as served by the discovery endpoints
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersion {
    /// API group (empty string for core)
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    pub fn new(group: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
        }
    }

    pub fn core(version: impl Into<String>) -> Self {
        Self::new("", version)
    }

    /// Path of the resource list for this group/version
    pub fn discovery_path(&self) -> String {
        if self.group.is_empty() {
            format!("/api/{}", self.version)
        } else {
            format!("/apis/{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            f.write_str(&self.version)
        } else {
            write!(f, "{}/{}", self.group, self.version)
        }
    }
}

/// Source of the cluster's discovery documents
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Every served group/version, core first
    async fn group_versions(&self) -> Result<Vec<GroupVersion>, DiagError>;

    /// Raw resource entries of one group/version discovery document
    async fn api_resources(&self, group_version: &GroupVersion) -> Result<Vec<Value>, DiagError>;
}

/// Read access to resource instances
///
/// `namespace` is already resolved against the resource scope: `None` means
/// the request is addressed without a namespace segment.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn list(
        &self,
        resource: &ResourceDescriptor,
        namespace: Option<&str>,
        filters: &ApiFilters,
    ) -> Result<Vec<Value>, DiagError>;

    /// `Ok(None)` when the server answered 404
    async fn get(
        &self,
        resource: &ResourceDescriptor,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>, DiagError>;
}
