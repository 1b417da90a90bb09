// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::tools::{DEFAULT_NAMESPACE, DEFAULT_RESOURCE_TYPE};

#[derive(Parser, Debug)]
#[command(name = "kubediag")]
#[command(author, version, about = "Read-only Kubernetes diagnostics over MCP")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Kubeconfig file to use when not running inside the cluster
    #[arg(long, global = true, env = "KUBECONFIG_PATH", value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use (defaults to the current context)
    #[arg(short, long, global = true, value_name = "CONTEXT")]
    pub context: Option<String>,

    /// Skip TLS certificate verification of the cluster API (non-production only)
    #[arg(long, global = true, env = "KUBERNETES_INSECURE")]
    pub insecure: bool,

    /// Per tool call timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output format for list/get
    #[arg(short, long, global = true, value_enum, default_value = "json")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List resources of a type (one-shot)
    List {
        /// Resource type in lowercase plural form
        #[arg(short, long, default_value = DEFAULT_RESOURCE_TYPE)]
        resource_type: String,

        /// Namespace (ignored for cluster-scoped resources)
        #[arg(short, long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,

        /// Label selector (e.g., "app=web,tier=frontend")
        #[arg(short = 'l', long)]
        selector: Option<String>,
    },

    /// Get one resource by name (one-shot)
    Get {
        /// Name of the resource
        name: String,

        /// Resource type in lowercase plural form
        #[arg(short, long, default_value = DEFAULT_RESOURCE_TYPE)]
        resource_type: String,

        /// Namespace (ignored for cluster-scoped resources)
        #[arg(short, long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },

    /// Serve the tools over TCP
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Address to bind to
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },

    /// Serve the tools over stdin/stdout
    Stdio,
}

impl Command {
    /// Long-running modes log to stderr by default
    pub fn is_server(&self) -> bool {
        matches!(self, Command::Serve { .. } | Command::Stdio)
    }
}

#[derive(ValueEnum, Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}
