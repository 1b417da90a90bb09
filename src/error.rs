// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error taxonomy for cluster access and the tool boundary.
//!
//! `DiagError` is what the connector, resolver and executor return.
//! `ToolError` is the only error a tool caller ever sees: a plain message,
//! never the internal error chain.

use thiserror::Error;

/// Failures raised while connecting, resolving or fetching
#[derive(Debug, Error)]
pub enum DiagError {
    /// Neither in-cluster credentials nor a kubeconfig could be loaded
    #[error(
        "no usable cluster credentials: in-cluster config failed ({in_cluster}); kubeconfig failed ({kubeconfig})"
    )]
    Configuration { in_cluster: String, kubeconfig: String },

    /// Credentials were found but the client could not be built from them
    #[error("failed to build cluster client: {0}")]
    Client(#[source] kube::Error),

    /// No discovered resource kind has this plural name
    #[error("resource type '{resource_type}' not found in cluster")]
    ResourceTypeNotFound { resource_type: String },

    /// Transport, authorization or server failure
    #[error("{message}")]
    Api { status: Option<u16>, message: String },

    /// The named instance does not exist
    #[error("{resource_type} '{name}' not found{}", in_namespace(.namespace))]
    NotFound {
        resource_type: String,
        namespace: Option<String>,
        name: String,
    },
}

fn in_namespace(namespace: &Option<String>) -> String {
    match namespace {
        Some(ns) => format!(" in namespace {}", ns),
        None => String::new(),
    }
}

impl DiagError {
    /// Convert a kube client error, keeping the HTTP status when there is one
    pub fn api(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) => DiagError::Api {
                status: Some(response.code),
                message: format!(
                    "{} (HTTP {}, {})",
                    response.message, response.code, response.reason
                ),
            },
            other => DiagError::Api {
                status: None,
                message: other.to_string(),
            },
        }
    }

    /// HTTP status of an API failure, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            DiagError::Api { status, .. } => *status,
            DiagError::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

/// Caller-facing tool failure carrying a human-readable message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ToolError {
    pub message: String,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
