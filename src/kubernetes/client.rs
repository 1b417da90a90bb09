// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIGroupList, APIVersions};
use kube::api::{DynamicObject, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig, KubeconfigError};
use kube::{Api, Client, Config};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::{ApiFilters, DiscoverySource, GroupVersion, ResourceDescriptor, ResourceFetcher};
use crate::error::DiagError;

/// Timeout for connecting to K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading K8s API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for paginated list requests
/// Smaller pages reduce memory pressure and allow faster initial response
const PAGE_SIZE: u32 = 500;

/// How to reach the cluster when not running inside it
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Explicit kubeconfig path (otherwise KUBECONFIG or ~/.kube/config)
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context (otherwise the current context)
    pub context: Option<String>,
    /// Skip TLS certificate verification (non-production clusters only)
    pub insecure: bool,
}

/// Where the session's credentials came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    InCluster,
    Kubeconfig,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::InCluster => f.write_str("in-cluster service account"),
            CredentialSource::Kubeconfig => f.write_str("kubeconfig"),
        }
    }
}

/// Authenticated connection to the target cluster
///
/// Created once at startup and shared read-only by every request.
#[derive(Clone)]
pub struct ClusterSession {
    client: Client,
    source: CredentialSource,
}

impl ClusterSession {
    /// Connect using in-cluster credentials, falling back to a kubeconfig
    ///
    /// No requests are made here: connectivity problems surface on the
    /// first call that needs the cluster.
    pub async fn connect(options: &ConnectOptions) -> Result<Self, DiagError> {
        let (mut config, source) = match Config::incluster() {
            Ok(config) => (config, CredentialSource::InCluster),
            Err(in_cluster) => {
                debug!(error = %in_cluster, "In-cluster configuration unavailable");
                match Self::load_kubeconfig(options).await {
                    Ok(config) => (config, CredentialSource::Kubeconfig),
                    Err(kubeconfig) => {
                        return Err(DiagError::Configuration {
                            in_cluster: in_cluster.to_string(),
                            kubeconfig: kubeconfig.to_string(),
                        });
                    }
                }
            }
        };

        // Set timeouts for reliability
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        if options.insecure {
            warn!("TLS certificate verification disabled for the cluster API");
            config.accept_invalid_certs = true;
        }

        let cluster_url = config.cluster_url.to_string();
        let client = Client::try_from(config).map_err(DiagError::Client)?;

        info!(
            source = %source,
            cluster = %cluster_url,
            insecure = options.insecure,
            "Using {} Kubernetes configuration",
            source
        );

        Ok(Self { client, source })
    }

    async fn load_kubeconfig(options: &ConnectOptions) -> Result<Config, KubeconfigError> {
        let kube_options = KubeConfigOptions {
            context: options.context.clone(),
            ..Default::default()
        };

        match &options.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)?;
                Config::from_custom_kubeconfig(kubeconfig, &kube_options).await
            }
            None => Config::from_kubeconfig(&kube_options).await,
        }
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Create API handle based on resource scope
    fn api(&self, resource: &ResourceDescriptor, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = resource.api_resource();
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }

    /// List resources with pagination
    /// Uses continue tokens to fetch all pages
    async fn list_all_pages(
        &self,
        api: &Api<DynamicObject>,
        base_params: &ListParams,
        table: &str,
    ) -> Result<Vec<DynamicObject>, DiagError> {
        let mut all_items: Vec<DynamicObject> = Vec::new();
        let mut continue_token: Option<String> = None;
        let mut page_count = 0u32;

        loop {
            // Build params for this page
            let mut params = base_params.clone().limit(PAGE_SIZE);
            if let Some(ref token) = continue_token {
                params = params.continue_token(token);
            }

            let list = api.list(&params).await.map_err(DiagError::api)?;

            let items_count = list.items.len();
            all_items.extend(list.items);
            page_count += 1;

            // Check for more pages
            match list.metadata.continue_ {
                Some(token) if !token.is_empty() => {
                    debug!(
                        table = %table,
                        page = page_count,
                        items_this_page = items_count,
                        total_so_far = all_items.len(),
                        "Fetched page, continuing"
                    );
                    continue_token = Some(token);
                }
                _ => break,
            }
        }

        if page_count > 1 {
            debug!(
                table = %table,
                pages = page_count,
                total_items = all_items.len(),
                "Pagination complete"
            );
        }

        Ok(all_items)
    }

    /// Build ListParams from API filters (label selectors)
    fn build_list_params(filters: &ApiFilters) -> ListParams {
        let mut params = ListParams::default();

        if let Some(ref label_sel) = filters.label_selector {
            params = params.labels(label_sel);
        }

        trace!(label_selector = ?filters.label_selector, "Built ListParams");

        params
    }

    fn to_value(object: DynamicObject) -> Result<Value, DiagError> {
        serde_json::to_value(object).map_err(|e| DiagError::Api {
            status: None,
            message: format!("Failed to encode resource: {}", e),
        })
    }
}

/// Every served group/version: core versions, then each group's preferred
/// version followed by the rest of its versions
fn served_group_versions(core: APIVersions, groups: APIGroupList) -> Vec<GroupVersion> {
    let mut group_versions: Vec<GroupVersion> =
        core.versions.into_iter().map(GroupVersion::core).collect();

    for group in groups.groups {
        if group.versions.is_empty() {
            debug!(group = %group.name, "Skipping API group without versions");
            continue;
        }

        let preferred = group.preferred_version.map(|v| v.version);
        let rest = group
            .versions
            .into_iter()
            .map(|v| v.version)
            .filter(|v| Some(v) != preferred.as_ref());

        for version in preferred.clone().into_iter().chain(rest) {
            group_versions.push(GroupVersion::new(group.name.clone(), version));
        }
    }

    group_versions
}

#[async_trait]
impl DiscoverySource for ClusterSession {
    async fn group_versions(&self) -> Result<Vec<GroupVersion>, DiagError> {
        let core = self
            .client
            .list_core_api_versions()
            .await
            .map_err(DiagError::api)?;
        let groups = self.client.list_api_groups().await.map_err(DiagError::api)?;

        Ok(served_group_versions(core, groups))
    }

    async fn api_resources(&self, group_version: &GroupVersion) -> Result<Vec<Value>, DiagError> {
        // Fetched untyped so one malformed entry does not fail the whole list
        let request = http::Request::get(group_version.discovery_path())
            .body(Vec::new())
            .map_err(|e| DiagError::Api {
                status: None,
                message: format!("Invalid discovery request for {}: {}", group_version, e),
            })?;

        let document: Value = self.client.request(request).await.map_err(DiagError::api)?;

        match document.get("resources") {
            Some(Value::Array(resources)) => Ok(resources.clone()),
            _ => {
                warn!(group_version = %group_version, "Discovery document has no resource list");
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl ResourceFetcher for ClusterSession {
    async fn list(
        &self,
        resource: &ResourceDescriptor,
        namespace: Option<&str>,
        filters: &ApiFilters,
    ) -> Result<Vec<Value>, DiagError> {
        let api = self.api(resource, namespace);
        let params = Self::build_list_params(filters);
        let items = self.list_all_pages(&api, &params, &resource.plural).await?;

        let api_version = resource.api_version();

        items
            .into_iter()
            .map(|item| {
                let mut value = Self::to_value(item)?;
                // Inject apiVersion and kind (K8s list API doesn't include these per-item)
                if let Value::Object(ref mut map) = value {
                    map.insert("apiVersion".to_string(), Value::String(api_version.clone()));
                    map.insert("kind".to_string(), Value::String(resource.kind.clone()));
                }
                Ok(value)
            })
            .collect()
    }

    async fn get(
        &self,
        resource: &ResourceDescriptor,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>, DiagError> {
        let api = self.api(resource, namespace);
        match api.get_opt(name).await.map_err(DiagError::api)? {
            Some(object) => Self::to_value(object).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIGroup, GroupVersionForDiscovery};

    fn version(group: &str, version: &str) -> GroupVersionForDiscovery {
        GroupVersionForDiscovery {
            group_version: format!("{}/{}", group, version),
            version: version.to_string(),
        }
    }

    fn group(name: &str, preferred: Option<&str>, versions: &[&str]) -> APIGroup {
        APIGroup {
            name: name.to_string(),
            preferred_version: preferred.map(|v| version(name, v)),
            versions: versions.iter().map(|v| version(name, v)).collect(),
            ..Default::default()
        }
    }

    fn enumerate(groups: Vec<APIGroup>) -> Vec<String> {
        let core = APIVersions {
            versions: vec!["v1".to_string()],
            ..Default::default()
        };
        served_group_versions(core, APIGroupList { groups })
            .iter()
            .map(GroupVersion::to_string)
            .collect()
    }

    #[test]
    fn test_every_served_version_is_enumerated() {
        let versions = enumerate(vec![
            group("apps", Some("v1"), &["v1"]),
            group("storage.k8s.io", Some("v1"), &["v1", "v1beta1"]),
        ]);
        assert_eq!(versions, vec!["v1", "apps/v1", "storage.k8s.io/v1", "storage.k8s.io/v1beta1"]);
    }

    #[test]
    fn test_preferred_version_comes_first() {
        let versions = enumerate(vec![group("autoscaling", Some("v2"), &["v1", "v2"])]);
        assert_eq!(versions, vec!["v1", "autoscaling/v2", "autoscaling/v1"]);
    }

    #[test]
    fn test_group_without_preferred_or_versions() {
        let versions = enumerate(vec![
            group("a.example.com", None, &["v1alpha1", "v1beta1"]),
            group("empty.example.com", None, &[]),
        ]);
        assert_eq!(versions, vec!["v1", "a.example.com/v1alpha1", "a.example.com/v1beta1"]);
    }
}
