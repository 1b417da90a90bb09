mod handler;
mod protocol;

pub use handler::McpHandler;
pub use protocol::JsonRpcResponse;
