mod mcp_server;

pub use mcp_server::{McpServer, serve_stdio};
