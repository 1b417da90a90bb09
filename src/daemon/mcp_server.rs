// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::mcp::{JsonRpcResponse, McpHandler};

/// Tool protocol server over TCP, one newline-delimited JSON-RPC stream per connection
pub struct McpServer {
    port: u16,
    bind_address: String,
}

impl McpServer {
    pub fn new(port: u16, bind_address: String) -> Self {
        Self { port, bind_address }
    }

    pub async fn run(&self, handler: Arc<McpHandler>) -> anyhow::Result<()> {
        let server_addr = format!("{}:{}", self.bind_address, self.port);
        let listener = TcpListener::bind(&server_addr).await?;

        tracing::info!("MCP server listening on {}", server_addr);

        loop {
            let (socket, peer_addr) = listener.accept().await?;
            let handler = handler.clone();

            tracing::debug!("New connection from {}", peer_addr);

            tokio::spawn(async move {
                let (reader, writer) = socket.into_split();
                if let Err(e) = serve_lines(BufReader::new(reader), writer, handler).await {
                    tracing::error!("Connection error from {}: {}", peer_addr, e);
                }
                tracing::debug!("Connection from {} closed", peer_addr);
            });
        }
    }
}

/// Serve the tool protocol on stdin/stdout
pub async fn serve_stdio(handler: Arc<McpHandler>) -> anyhow::Result<()> {
    tracing::info!("MCP server reading from stdin");
    serve_lines(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), handler).await
}

/// Read requests line by line and write each response as it completes
///
/// Requests run concurrently. At end of input the in-flight requests are
/// still answered; a read or write failure returns immediately, and
/// dropping the task set aborts whatever was still running.
pub async fn serve_lines<R, W>(reader: R, mut writer: W, handler: Arc<McpHandler>) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut in_flight: JoinSet<Option<JsonRpcResponse>> = JoinSet::new();
    let mut reading = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if reading => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    let handler = handler.clone();
                    in_flight.spawn(async move { handler.handle_line(&line).await });
                }
                None => reading = false,
            },
            Some(joined) = in_flight.join_next() => match joined {
                Ok(Some(response)) => write_response(&mut writer, &response).await?,
                Ok(None) => {}
                Err(e) => tracing::warn!("Request task failed: {}", e),
            },
            else => break,
        }
    }

    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> anyhow::Result<()> {
    let mut encoded = serde_json::to_vec(response)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}
