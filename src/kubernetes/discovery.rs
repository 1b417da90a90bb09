// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource type resolution for Kubernetes clusters.
//!
//! Turns a caller-supplied plural name ("pods", "cronjobs", a CRD plural)
//! into a group/version/kind/scope descriptor by reading the cluster's
//! discovery documents at runtime. There is no built-in table of kinds.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{DiscoverySource, GroupVersion, Resolution, ResolutionCache};
use crate::error::DiagError;

/// Everything needed to address one resource kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
    /// Lowercase plural name (e.g., "pods", "certificates")
    pub plural: String,
    /// API group (empty string for core v1)
    pub group: String,
    /// API version
    pub version: String,
    pub kind: String,
    /// Whether instances live inside a namespace
    pub namespaced: bool,
}

impl ResourceDescriptor {
    /// Get the full API group/version string
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Dynamic API handle description for kube
    pub fn api_resource(&self) -> kube::discovery::ApiResource {
        kube::discovery::ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }
}

/// The fields of a discovery entry we depend on
///
/// Parsed one entry at a time so a single malformed entry cannot poison
/// the whole resource list.
#[derive(Debug, Deserialize)]
struct RawApiResource {
    name: String,
    kind: String,
    namespaced: bool,
    /// Per-resource override of the list's group (rare, but allowed)
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

/// A resource as discovered, before it is matched against a request
#[derive(Debug, Clone, PartialEq, Eq)]
struct DiscoveredResource {
    name: String,
    group: String,
    version: String,
    kind: String,
    namespaced: bool,
}

impl DiscoveredResource {
    fn parse(group_version: &GroupVersion, entry: &Value) -> Option<Self> {
        let raw: RawApiResource = match serde_json::from_value(entry.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(
                    group_version = %group_version,
                    error = %e,
                    "Skipping malformed discovery entry"
                );
                return None;
            }
        };

        if raw.name.is_empty() || raw.kind.is_empty() {
            debug!(
                group_version = %group_version,
                name = %raw.name,
                "Skipping discovery entry without name or kind"
            );
            return None;
        }

        Some(Self {
            name: raw.name,
            group: raw
                .group
                .filter(|g| !g.is_empty())
                .unwrap_or_else(|| group_version.group.clone()),
            version: raw
                .version
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| group_version.version.clone()),
            kind: raw.kind,
            namespaced: raw.namespaced,
        })
    }

    /// Subresources (e.g., pods/log, pods/exec) are not addressable types
    fn is_subresource(&self) -> bool {
        self.name.contains('/')
    }

    fn into_descriptor(self, plural: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            plural: plural.to_string(),
            group: self.group,
            version: self.version,
            kind: self.kind,
            namespaced: self.namespaced,
        }
    }
}

/// Pick one candidate when a plural name is served by several groups
///
/// The core group wins. Otherwise the lexically smallest (group, version)
/// wins, so the choice never depends on discovery response order.
fn choose_preferred(plural: &str, mut candidates: Vec<DiscoveredResource>) -> Option<DiscoveredResource> {
    candidates.sort_by(|a, b| {
        (!a.group.is_empty(), &a.group, &a.version).cmp(&(!b.group.is_empty(), &b.group, &b.version))
    });

    if candidates.len() > 1 {
        let alternatives: Vec<String> = candidates
            .iter()
            .skip(1)
            .map(|c| GroupVersion::new(c.group.clone(), c.version.clone()).to_string())
            .collect();
        warn!(
            resource_type = %plural,
            chosen = %GroupVersion::new(candidates[0].group.clone(), candidates[0].version.clone()),
            alternatives = ?alternatives,
            "Resource type is served by several API groups"
        );
    }

    candidates.into_iter().next()
}

/// Resolves plural names to descriptors, memoizing every answer
pub struct Resolver {
    source: Arc<dyn DiscoverySource>,
    cache: ResolutionCache,
}

impl Resolver {
    pub fn new(source: Arc<dyn DiscoverySource>) -> Self {
        Self {
            source,
            cache: ResolutionCache::new(),
        }
    }

    /// Cached state for a name, without running discovery
    #[cfg(test)]
    pub fn cached(&self, plural: &str) -> Resolution {
        self.cache.lookup(&plural.to_lowercase())
    }

    /// Resolve a plural name, running discovery only on a cache miss
    pub async fn resolve(&self, plural: &str) -> Result<ResourceDescriptor, DiagError> {
        let key = plural.to_lowercase();
        let resolution = match self.cache.lookup(&key) {
            Resolution::Unresolved => {
                self.cache
                    .get_or_resolve(&key, || self.discover(&key))
                    .await?
            }
            cached => {
                debug!(resource_type = %key, "Resolution cache hit");
                cached
            }
        };

        match resolution {
            Resolution::Found(descriptor) => Ok(descriptor),
            // get_or_resolve only ever stores Found or NotFound
            Resolution::NotFound | Resolution::Unresolved => Err(DiagError::ResourceTypeNotFound {
                resource_type: key,
            }),
        }
    }

    /// Run discovery across every served group/version and match `plural`
    async fn discover(&self, plural: &str) -> Result<Option<ResourceDescriptor>, DiagError> {
        let start = std::time::Instant::now();
        let group_versions = self.source.group_versions().await?;

        let lists = join_all(group_versions.iter().map(|gv| async move {
            (gv, self.source.api_resources(gv).await)
        }))
        .await;

        let mut candidates = Vec::new();
        let mut failed = 0;
        let mut last_error = None;

        for (gv, result) in lists {
            let entries = match result {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        group_version = %gv,
                        error = %e,
                        "Skipping group version that failed discovery"
                    );
                    failed += 1;
                    last_error = Some(e);
                    continue;
                }
            };

            candidates.extend(
                entries
                    .iter()
                    .filter_map(|entry| DiscoveredResource::parse(gv, entry))
                    .filter(|r| !r.is_subresource() && r.name.eq_ignore_ascii_case(plural)),
            );
        }

        // A failed group may be the one serving this type: only a positive
        // answer survives partial failure
        if candidates.is_empty()
            && let Some(e) = last_error
        {
            warn!(
                resource_type = %plural,
                failed_group_versions = failed,
                "Resource type not resolved, discovery incomplete"
            );
            return Err(e);
        }

        let chosen = choose_preferred(plural, candidates).map(|r| r.into_descriptor(plural));

        match &chosen {
            Some(descriptor) => info!(
                resource_type = %plural,
                api_version = %descriptor.api_version(),
                kind = %descriptor.kind,
                namespaced = descriptor.namespaced,
                elapsed_ms = start.elapsed().as_millis() as u64,
                cached_types = self.cache.len(),
                "Resolved resource type"
            ),
            None => warn!(
                resource_type = %plural,
                group_versions = group_versions.len(),
                "Resource type not found in cluster"
            ),
        }

        Ok(chosen)
    }
}
