use async_trait::async_trait;
use futures::Stream;
use mcp_core::protocol::JsonRpcMessage;
use tokio::io::{Stdin, Stdout};

use crate::TransportError;

pub mod byte;
pub use byte::{ByteTransport, JsonRpcFrameCodec};

/// A trait representing a transport layer for JSON-RPC messages
#[async_trait]
pub trait Transport: Stream<Item = Result<JsonRpcMessage, TransportError>> {
    /// Writes a JSON-RPC message to the transport
    async fn write_message(&mut self, message: JsonRpcMessage) -> Result<(), TransportError>;
}

/// Newline-delimited JSON-RPC over the process's stdin and stdout.
pub fn stdio() -> ByteTransport<Stdin, Stdout> {
    ByteTransport::new(tokio::io::stdin(), tokio::io::stdout())
}
