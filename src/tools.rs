// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! The two diagnostic tools: `kubernetes_list` and `kubernetes_get`
//!
//! Each call resolves the resource type, fetches, and cleans the result.
//! Every internal failure is logged and turned into a `ToolError` whose
//! message names what was asked for.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{DiagError, ToolError};
use crate::kubernetes::{
    ApiFilters, DiscoverySource, QueryExecutor, ResourceDescriptor, ResourceFetcher, Resolver,
};
use crate::sanitize;

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_RESOURCE_TYPE: &str = "pods";

/// Arguments of `kubernetes_list`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListRequest {
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Label selector (e.g., "app=myapp,env=production")
    #[serde(default)]
    pub selector: Option<String>,
}

/// Arguments of `kubernetes_get`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetRequest {
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// The resolved type a list was served from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceTypeInfo {
    pub group: String,
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

impl From<&ResourceDescriptor> for ResourceTypeInfo {
    fn from(resource: &ResourceDescriptor) -> Self {
        Self {
            group: resource.group.clone(),
            api_version: resource.api_version(),
            kind: resource.kind.clone(),
            name: resource.plural.clone(),
        }
    }
}

/// Result of `kubernetes_list`
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub resource_type: ResourceTypeInfo,
    /// Namespace actually applied; `None` for cluster-scoped resources
    pub namespace: Option<String>,
    pub items: Vec<Value>,
}

/// Treat missing, blank, "none" and "null" alike
///
/// Callers generated by language models often send these strings where
/// they mean "not set".
fn normalize_optional(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("none") && !v.eq_ignore_ascii_case("null"))
}

fn resource_type_or_default(value: Option<&str>) -> String {
    normalize_optional(value)
        .unwrap_or(DEFAULT_RESOURCE_TYPE)
        .to_lowercase()
}

fn namespace_or_default(value: Option<&str>) -> String {
    normalize_optional(value)
        .unwrap_or(DEFAULT_NAMESPACE)
        .to_string()
}

/// Resolver, executor and sanitizer wired together
pub struct DiagTools {
    resolver: Resolver,
    executor: QueryExecutor,
}

impl DiagTools {
    pub fn new(discovery: Arc<dyn DiscoverySource>, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            resolver: Resolver::new(discovery),
            executor: QueryExecutor::new(fetcher),
        }
    }

    /// Both halves backed by one cluster connection
    pub fn with_cluster<C>(cluster: Arc<C>) -> Self
    where
        C: DiscoverySource + ResourceFetcher + 'static,
    {
        Self::new(cluster.clone(), cluster)
    }

    /// List resources of a type, cleaned, in a namespace
    pub async fn kubernetes_list(&self, request: &ListRequest) -> Result<ListResponse, ToolError> {
        let resource_type = resource_type_or_default(request.resource_type.as_deref());
        let namespace = namespace_or_default(request.namespace.as_deref());
        let filters = ApiFilters {
            label_selector: normalize_optional(request.selector.as_deref()).map(String::from),
        };

        match self.list(&resource_type, &namespace, &filters).await {
            Ok(response) => {
                info!(
                    resource_type = %resource_type,
                    namespace = response.namespace.as_deref().unwrap_or("cluster-scoped"),
                    count = response.items.len(),
                    "Listed resources"
                );
                Ok(response)
            }
            Err(e) => {
                let status = e.status();
                let message = match e {
                    DiagError::ResourceTypeNotFound { .. } => {
                        format!("Resource type '{}' not found in cluster", resource_type)
                    }
                    other => format!(
                        "Error listing {} in namespace {}: {}",
                        resource_type, namespace, other
                    ),
                };
                error!(
                    resource_type = %resource_type,
                    namespace = %namespace,
                    status = ?status,
                    "{}",
                    message
                );
                Err(ToolError::new(message))
            }
        }
    }

    /// Get one resource, cleaned
    pub async fn kubernetes_get(&self, request: &GetRequest) -> Result<Value, ToolError> {
        let resource_type = resource_type_or_default(request.resource_type.as_deref());
        let namespace = namespace_or_default(request.namespace.as_deref());
        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ToolError::new("name must be a non-empty string"))?;

        match self.get(&resource_type, &namespace, name).await {
            Ok(document) => {
                info!(
                    resource_type = %resource_type,
                    namespace = %namespace,
                    name = %name,
                    "Retrieved resource"
                );
                Ok(document)
            }
            Err(e) => {
                let status = e.status();
                let message = match e {
                    DiagError::ResourceTypeNotFound { .. } => {
                        format!("Resource type '{}' not found in cluster", resource_type)
                    }
                    DiagError::NotFound { .. } => format!(
                        "{} '{}' not found in namespace {}",
                        resource_type, name, namespace
                    ),
                    other => format!("Error getting {} '{}': {}", resource_type, name, other),
                };
                error!(
                    resource_type = %resource_type,
                    namespace = %namespace,
                    name = %name,
                    status = ?status,
                    "{}",
                    message
                );
                Err(ToolError::new(message))
            }
        }
    }

    async fn list(
        &self,
        resource_type: &str,
        namespace: &str,
        filters: &ApiFilters,
    ) -> Result<ListResponse, DiagError> {
        let resource = self.resolver.resolve(resource_type).await?;
        let raw = self.executor.list(&resource, namespace, filters).await?;

        Ok(ListResponse {
            resource_type: ResourceTypeInfo::from(&resource),
            namespace: QueryExecutor::scope(&resource, namespace).map(String::from),
            items: raw
                .into_iter()
                .map(|item| sanitize::clean(item, &resource.kind))
                .collect(),
        })
    }

    async fn get(&self, resource_type: &str, namespace: &str, name: &str) -> Result<Value, DiagError> {
        let resource = self.resolver.resolve(resource_type).await?;
        let raw = self.executor.get(&resource, namespace, name).await?;
        Ok(sanitize::clean(raw, &resource.kind))
    }
}
