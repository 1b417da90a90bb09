// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory cluster for tests
//!
//! Serves canned discovery documents and stored objects through the same
//! traits the kube-backed session implements, and records how it was called.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{ApiFilters, DiscoverySource, GroupVersion, ResourceDescriptor, ResourceFetcher};
use crate::error::DiagError;

/// One fetch as the fake saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRecord {
    pub plural: String,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub label_selector: Option<String>,
}

#[derive(Default)]
pub struct FakeCluster {
    groups: Vec<(GroupVersion, Vec<Value>)>,
    failing_group_versions: Mutex<HashSet<String>>,
    objects: Vec<(String, Value)>,
    fetch_error: Option<u16>,
    discovery_down: AtomicBool,
    discovery_calls: AtomicUsize,
    fetches: Mutex<Vec<FetchRecord>>,
}

fn resource(name: &str, kind: &str, namespaced: bool) -> Value {
    json!({
        "name": name,
        "singularName": "",
        "kind": kind,
        "namespaced": namespaced,
        "verbs": ["get", "list", "watch"]
    })
}

impl FakeCluster {
    /// A cluster with a representative mix of core, grouped and custom kinds
    pub fn standard() -> Self {
        Self::default()
            .with_group(
                GroupVersion::core("v1"),
                vec![
                    resource("pods", "Pod", true),
                    resource("pods/log", "Pod", true),
                    resource("secrets", "Secret", true),
                    resource("configmaps", "ConfigMap", true),
                    resource("events", "Event", true),
                    resource("nodes", "Node", false),
                    resource("namespaces", "Namespace", false),
                    json!({"name": "broken"}),
                    json!({"name": "weird", "kind": "Weird", "namespaced": "yes"}),
                ],
            )
            .with_group(
                GroupVersion::new("apps", "v1"),
                vec![resource("deployments", "Deployment", true)],
            )
            .with_group(
                GroupVersion::new("batch", "v1"),
                vec![
                    resource("jobs", "Job", true),
                    resource("cronjobs", "CronJob", true),
                ],
            )
            .with_group(
                GroupVersion::new("events.k8s.io", "v1"),
                vec![resource("events", "Event", true)],
            )
            .with_group(
                GroupVersion::new("b.example.com", "v1"),
                vec![resource("widgets", "Widget", true)],
            )
            .with_group(
                GroupVersion::new("a.example.com", "v1beta1"),
                vec![resource("widgets", "Widget", false)],
            )
    }

    pub fn with_group(mut self, group_version: GroupVersion, resources: Vec<Value>) -> Self {
        self.groups.push((group_version, resources));
        self
    }

    pub fn with_failing_group_version(self, group_version: &str) -> Self {
        self.set_group_version_down(group_version, true);
        self
    }

    pub fn set_group_version_down(&self, group_version: &str, down: bool) {
        let mut failing = self.failing_group_versions.lock().unwrap();
        if down {
            failing.insert(group_version.to_string());
        } else {
            failing.remove(group_version);
        }
    }

    /// Store an object under a plural name
    pub fn with_object(mut self, plural: &str, object: Value) -> Self {
        self.objects.push((plural.to_string(), object));
        self
    }

    /// Make every list/get fail with this HTTP status
    pub fn with_fetch_error(mut self, status: u16) -> Self {
        self.fetch_error = Some(status);
        self
    }

    pub fn set_discovery_down(&self, down: bool) {
        self.discovery_down.store(down, Ordering::SeqCst);
    }

    /// Number of discovery runs (group enumerations) so far
    pub fn discovery_calls(&self) -> usize {
        self.discovery_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> Vec<FetchRecord> {
        self.fetches.lock().unwrap().clone()
    }

    fn record(&self, record: FetchRecord) {
        self.fetches.lock().unwrap().push(record);
    }

    fn check_fetch_error(&self) -> Result<(), DiagError> {
        match self.fetch_error {
            Some(status) => Err(DiagError::Api {
                status: Some(status),
                message: format!("injected failure (HTTP {})", status),
            }),
            None => Ok(()),
        }
    }

    fn matches(object: &Value, namespace: Option<&str>, selector: Option<&str>) -> bool {
        let metadata = &object["metadata"];
        if let Some(ns) = namespace
            && metadata["namespace"].as_str() != Some(ns)
        {
            return false;
        }
        selector
            .map(|sel| {
                sel.split(',').filter(|t| !t.is_empty()).all(|term| {
                    let (key, value) = term.split_once('=').unwrap_or((term, ""));
                    metadata["labels"][key.trim()].as_str() == Some(value.trim())
                })
            })
            .unwrap_or(true)
    }
}

#[async_trait]
impl DiscoverySource for FakeCluster {
    async fn group_versions(&self) -> Result<Vec<GroupVersion>, DiagError> {
        self.discovery_calls.fetch_add(1, Ordering::SeqCst);
        if self.discovery_down.load(Ordering::SeqCst) {
            return Err(DiagError::Api {
                status: Some(503),
                message: "discovery unavailable".to_string(),
            });
        }
        Ok(self.groups.iter().map(|(gv, _)| gv.clone()).collect())
    }

    async fn api_resources(&self, group_version: &GroupVersion) -> Result<Vec<Value>, DiagError> {
        let failing = self
            .failing_group_versions
            .lock()
            .unwrap()
            .contains(&group_version.to_string());
        if failing {
            return Err(DiagError::Api {
                status: Some(503),
                message: format!("{} unavailable", group_version),
            });
        }
        Ok(self
            .groups
            .iter()
            .find(|(gv, _)| gv == group_version)
            .map(|(_, resources)| resources.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ResourceFetcher for FakeCluster {
    async fn list(
        &self,
        resource: &ResourceDescriptor,
        namespace: Option<&str>,
        filters: &ApiFilters,
    ) -> Result<Vec<Value>, DiagError> {
        self.record(FetchRecord {
            plural: resource.plural.clone(),
            namespace: namespace.map(String::from),
            name: None,
            label_selector: filters.label_selector.clone(),
        });
        self.check_fetch_error()?;

        Ok(self
            .objects
            .iter()
            .filter(|(plural, _)| plural == &resource.plural)
            .map(|(_, object)| object)
            .filter(|object| Self::matches(object, namespace, filters.label_selector.as_deref()))
            .cloned()
            .collect())
    }

    async fn get(
        &self,
        resource: &ResourceDescriptor,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>, DiagError> {
        self.record(FetchRecord {
            plural: resource.plural.clone(),
            namespace: namespace.map(String::from),
            name: Some(name.to_string()),
            label_selector: None,
        });
        self.check_fetch_error()?;

        Ok(self
            .objects
            .iter()
            .filter(|(plural, _)| plural == &resource.plural)
            .map(|(_, object)| object)
            .find(|object| {
                object["metadata"]["name"].as_str() == Some(name)
                    && Self::matches(object, namespace, None)
            })
            .cloned())
    }
}
