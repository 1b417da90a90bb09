// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{ApiFilters, ResourceDescriptor, ResourceFetcher};
use crate::error::DiagError;

/// Issues list/get calls against a resolved resource
///
/// One attempt per call; transient failures go straight back to the caller.
pub struct QueryExecutor {
    fetcher: Arc<dyn ResourceFetcher>,
}

impl QueryExecutor {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self { fetcher }
    }

    /// Namespace to address the request with, given the resource scope
    ///
    /// Cluster-scoped resources have no namespace segment; a supplied
    /// namespace is not an error, it is simply not applied.
    pub fn scope<'a>(resource: &ResourceDescriptor, namespace: &'a str) -> Option<&'a str> {
        if resource.namespaced {
            Some(namespace)
        } else {
            if !namespace.is_empty() {
                debug!(
                    resource_type = %resource.plural,
                    namespace = %namespace,
                    "Ignoring namespace for cluster-scoped resource"
                );
            }
            None
        }
    }

    /// Fetch the collection, scoped to `namespace` when the resource is namespaced
    pub async fn list(
        &self,
        resource: &ResourceDescriptor,
        namespace: &str,
        filters: &ApiFilters,
    ) -> Result<Vec<Value>, DiagError> {
        let scope = Self::scope(resource, namespace);

        debug!(
            resource_type = %resource.plural,
            api_version = %resource.api_version(),
            kind = %resource.kind,
            namespace = ?scope,
            label_selector = ?filters.label_selector,
            "Listing resources"
        );

        self.fetcher.list(resource, scope, filters).await
    }

    /// Fetch one instance by name
    pub async fn get(
        &self,
        resource: &ResourceDescriptor,
        namespace: &str,
        name: &str,
    ) -> Result<Value, DiagError> {
        let scope = Self::scope(resource, namespace);

        debug!(
            resource_type = %resource.plural,
            api_version = %resource.api_version(),
            namespace = ?scope,
            name = %name,
            "Getting resource"
        );

        self.fetcher
            .get(resource, scope, name)
            .await?
            .ok_or_else(|| DiagError::NotFound {
                resource_type: resource.plural.clone(),
                namespace: scope.map(String::from),
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubernetes::testing::{FakeCluster, FetchRecord};
    use serde_json::json;

    fn descriptor(plural: &str, kind: &str, namespaced: bool) -> ResourceDescriptor {
        ResourceDescriptor {
            plural: plural.to_string(),
            group: String::new(),
            version: "v1".to_string(),
            kind: kind.to_string(),
            namespaced,
        }
    }

    fn cluster() -> Arc<FakeCluster> {
        Arc::new(
            FakeCluster::standard()
                .with_object(
                    "pods",
                    json!({"metadata": {"name": "web-0", "namespace": "default", "labels": {"app": "web"}}}),
                )
                .with_object(
                    "pods",
                    json!({"metadata": {"name": "db-0", "namespace": "default", "labels": {"app": "db"}}}),
                )
                .with_object(
                    "pods",
                    json!({"metadata": {"name": "web-0", "namespace": "staging"}}),
                )
                .with_object("nodes", json!({"metadata": {"name": "worker-1"}})),
        )
    }

    #[tokio::test]
    async fn test_list_namespaced_applies_namespace() {
        let cluster = cluster();
        let executor = QueryExecutor::new(cluster.clone());

        let items = executor
            .list(&descriptor("pods", "Pod", true), "default", &ApiFilters::default())
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(cluster.fetches()[0].namespace.as_deref(), Some("default"));
    }

    #[tokio::test]
    async fn test_list_cluster_scoped_ignores_namespace() {
        let cluster = cluster();
        let executor = QueryExecutor::new(cluster.clone());
        let nodes = descriptor("nodes", "Node", false);

        for ns in ["", "default", "kube-system"] {
            let items = executor
                .list(&nodes, ns, &ApiFilters::default())
                .await
                .unwrap();
            assert_eq!(items.len(), 1);
        }

        assert!(cluster.fetches().iter().all(|f| f.namespace.is_none()));
    }

    #[tokio::test]
    async fn test_list_passes_label_selector() {
        let cluster = cluster();
        let executor = QueryExecutor::new(cluster.clone());
        let filters = ApiFilters {
            label_selector: Some("app=web".to_string()),
        };

        let items = executor
            .list(&descriptor("pods", "Pod", true), "default", &filters)
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["metadata"]["name"], "web-0");
        assert_eq!(
            cluster.fetches()[0].label_selector.as_deref(),
            Some("app=web")
        );
    }

    #[tokio::test]
    async fn test_get_cluster_scoped_with_arbitrary_namespace() {
        let cluster = cluster();
        let executor = QueryExecutor::new(cluster.clone());

        let node = executor
            .get(&descriptor("nodes", "Node", false), "whatever", "worker-1")
            .await
            .unwrap();

        assert_eq!(node["metadata"]["name"], "worker-1");
        assert_eq!(
            cluster.fetches(),
            vec![FetchRecord {
                plural: "nodes".to_string(),
                namespace: None,
                name: Some("worker-1".to_string()),
                label_selector: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let executor = QueryExecutor::new(cluster());

        let err = executor
            .get(&descriptor("pods", "Pod", true), "kube-system", "web-0")
            .await
            .unwrap_err();

        match err {
            DiagError::NotFound {
                resource_type,
                namespace,
                name,
            } => {
                assert_eq!(resource_type, "pods");
                assert_eq!(namespace.as_deref(), Some("kube-system"));
                assert_eq!(name, "web-0");
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_api_failure_is_not_not_found() {
        let executor = QueryExecutor::new(Arc::new(FakeCluster::standard().with_fetch_error(403)));

        let err = executor
            .get(&descriptor("pods", "Pod", true), "default", "web-0")
            .await
            .unwrap_err();
        assert!(matches!(err, DiagError::Api { status: Some(403), .. }));

        let err = executor
            .list(&descriptor("pods", "Pod", true), "default", &ApiFilters::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DiagError::Api { status: Some(403), .. }));
    }
}
