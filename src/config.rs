// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration persistence for kubediag
//!
//! Optional settings read from a config file. Command-line flags override
//! every field. All kubediag data is stored under ~/.kubediag/:
//! - ~/.kubediag/config.json - settings
//! - ~/.kubediag/log/ - rotating log files

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Args;
use crate::kubernetes::ConnectOptions;

/// Tool call timeout when neither flag nor file sets one
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_SERVER_NAME: &str = "kubediag";

/// Get the base kubediag directory (~/.kubediag/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".kubediag"))
        .context("Could not determine home directory")
}

/// kubediag configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Kubeconfig path used when not running in a cluster
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context
    #[serde(default)]
    pub context: Option<String>,
    /// Skip TLS verification of the cluster API
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
    /// Per tool call timeout
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Name announced to tool clients
    #[serde(default)]
    pub server_name: Option<String>,
}

/// Settings after merging the config file with command-line flags
#[derive(Debug, Clone)]
pub struct Settings {
    pub connect: ConnectOptions,
    pub request_timeout: Duration,
    pub server_name: String,
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the config file path (~/.kubediag/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }

    /// Apply command-line overrides
    pub fn settings(self, args: &Args) -> Settings {
        Settings {
            connect: ConnectOptions {
                kubeconfig: args.kubeconfig.clone().or(self.kubeconfig),
                context: args.context.clone().or(self.context),
                insecure: args.insecure || self.insecure_skip_tls_verify,
            },
            request_timeout: args
                .timeout
                .or(self.request_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            server_name: self
                .server_name
                .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string()),
        }
    }
}
