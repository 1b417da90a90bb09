// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
pub mod config;
mod daemon;
mod error;
mod kubernetes;
mod mcp;
mod output;
mod sanitize;
mod tools;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use cli::{Args, Command};
use config::Config;
use daemon::{McpServer, serve_stdio};
use kubernetes::ClusterSession;
use mcp::McpHandler;
use tools::{DiagTools, GetRequest, ListRequest};

/// Initialize logging with file output and optional stderr
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(verbose: bool, to_stderr: bool) -> Option<WorkerGuard> {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    let filter = if verbose { "kubediag=debug" } else { "kubediag=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let stderr_layer = to_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE)
    });

    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    // Max 10MB per file, 5 files kept, also rotated daily
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024);

    let file_appender = std::fs::create_dir_all(&log_dir)
        .and_then(|_| RollingFileAppenderBase::new(log_dir.join("kubediag.log"), condition, 5));

    let (file_layer, guard) = match file_appender {
        Ok(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_span_events(FmtSpan::NONE);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Install rustls crypto provider (aws-lc-rs)
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let args = Args::parse();

    // Always log to file (~/.kubediag/log/kubediag.log). Stdout stays
    // reserved for results and protocol traffic.
    let _guard = init_logging(args.verbose, args.command.is_server() || args.verbose);

    let settings = Config::load()
        .context("Failed to load configuration")?
        .settings(&args);

    let session = ClusterSession::connect(&settings.connect).await?;
    tracing::debug!(source = %session.source(), "Cluster session ready");
    let tools = Arc::new(DiagTools::with_cluster(Arc::new(session)));

    match args.command {
        Command::List {
            resource_type,
            namespace,
            selector,
        } => {
            let request = ListRequest {
                resource_type: Some(resource_type),
                namespace: Some(namespace),
                selector,
            };
            let response = tools.kubernetes_list(&request).await;
            let value = response.and_then(|r| {
                serde_json::to_value(r).map_err(|e| error::ToolError::new(e.to_string()))
            });
            return Ok(print_result(value, &args.output));
        }
        Command::Get {
            name,
            resource_type,
            namespace,
        } => {
            let request = GetRequest {
                resource_type: Some(resource_type),
                namespace: Some(namespace),
                name: Some(name),
            };
            return Ok(print_result(tools.kubernetes_get(&request).await, &args.output));
        }
        Command::Serve { port, bind } => {
            let handler = Arc::new(McpHandler::new(
                tools,
                settings.server_name,
                settings.request_timeout,
            ));
            McpServer::new(port, bind).run(handler).await?;
        }
        Command::Stdio => {
            let handler = Arc::new(McpHandler::new(
                tools,
                settings.server_name,
                settings.request_timeout,
            ));
            serve_stdio(handler).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Print a one-shot result; failures go to stderr and exit non-zero
fn print_result(
    result: Result<serde_json::Value, error::ToolError>,
    format: &cli::OutputFormat,
) -> ExitCode {
    match result {
        Ok(value) => {
            println!("{}", output::format(&value, format));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
