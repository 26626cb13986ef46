use std::{
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use futures::Stream;
use mcp_core::{
    JsonObject,
    protocol::{JSONRPC_VERSION, JsonRpcMessage},
};
use pin_project::pin_project;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::{
    bytes::{Buf, BytesMut},
    codec::{Decoder, FramedRead},
};

use super::Transport;
use crate::TransportError;

/// Lines longer than this are dropped and answered with a parse error.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 2 * 1024 * 1024;

/// Splits a byte stream into newline-delimited JSON-RPC messages.
///
/// A bad line is yielded as an `Err` item rather than a decoder error, so one
/// malformed message never ends the stream. Only I/O failures do.
#[derive(Debug, Clone)]
pub struct JsonRpcFrameCodec {
    max_length: usize,
    next_index: usize,
    discarding: bool,
}

impl JsonRpcFrameCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }
}

impl Default for JsonRpcFrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl Decoder for JsonRpcFrameCodec {
    type Item = Result<JsonRpcMessage, TransportError>;
    type Error = TransportError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = buf[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| offset + self.next_index);

            match newline {
                Some(at) => {
                    let line = buf.split_to(at + 1);
                    self.next_index = 0;
                    if std::mem::take(&mut self.discarding) || at > self.max_length {
                        return Ok(Some(Err(TransportError::LineTooLong)));
                    }
                    let line = trim_line(&line[..at]);
                    if line.is_empty() {
                        continue;
                    }
                    return Ok(Some(parse_frame(line)));
                }
                None if self.discarding || buf.len() > self.max_length => {
                    // Keep only the discard flag until the newline shows up.
                    self.discarding = true;
                    self.next_index = 0;
                    buf.advance(buf.len());
                    return Ok(None);
                }
                None => {
                    self.next_index = buf.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(buf)? {
            return Ok(Some(item));
        }
        self.next_index = 0;
        if std::mem::take(&mut self.discarding) {
            return Ok(Some(Err(TransportError::LineTooLong)));
        }
        let rest = buf.split();
        let line = trim_line(&rest);
        if line.is_empty() {
            return Ok(None);
        }
        Ok(Some(parse_frame(line)))
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    line.trim_ascii()
}

fn parse_frame(line: &[u8]) -> Result<JsonRpcMessage, TransportError> {
    let line = std::str::from_utf8(line).map_err(|_| TransportError::Utf8)?;
    tracing::trace!(json = %line, "incoming message");

    let value: Value = serde_json::from_str(line)?;
    let Some(object) = value.as_object() else {
        return Err(TransportError::InvalidMessage(
            "Message must be a JSON object".into(),
        ));
    };
    if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(TransportError::InvalidMessage(
            "Missing or invalid jsonrpc version".into(),
        ));
    }
    check_envelope(object)?;
    serde_json::from_value(value).map_err(|e| TransportError::InvalidMessage(e.to_string()))
}

fn is_request_id(id: &Value) -> bool {
    match id {
        Value::String(_) => true,
        Value::Number(n) => n.is_i64(),
        _ => false,
    }
}

/// Requests carry a string or integer id (notifications none at all).
/// Anything without a method must be a response with exactly one of
/// `result` and `error`; only an error may have a null id.
fn check_envelope(object: &JsonObject) -> Result<(), TransportError> {
    let id = object.get("id");
    if object.contains_key("method") {
        return match id {
            Some(id) if !is_request_id(id) => Err(TransportError::InvalidMessage(
                "Request id must be a string or an integer".into(),
            )),
            _ => Ok(()),
        };
    }

    match (object.contains_key("result"), object.contains_key("error")) {
        (true, false) if id.is_some_and(is_request_id) => Ok(()),
        (false, true) if id.is_none_or(|id| id.is_null() || is_request_id(id)) => Ok(()),
        (true, false) | (false, true) => Err(TransportError::InvalidMessage(
            "Response id must be a string or an integer".into(),
        )),
        _ => Err(TransportError::InvalidMessage(
            "Message must have a method, or exactly one of result and error".into(),
        )),
    }
}

/// A transport layer that handles JSON-RPC messages over byte streams
#[pin_project]
pub struct ByteTransport<R, W> {
    #[pin]
    reader: FramedRead<R, JsonRpcFrameCodec>,
    #[pin]
    writer: W,
}

impl<R, W> ByteTransport<R, W>
where
    R: AsyncRead,
    W: AsyncWrite,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_max_line_length(reader, writer, DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(reader: R, writer: W, max_length: usize) -> Self {
        Self {
            reader: FramedRead::new(reader, JsonRpcFrameCodec::new(max_length)),
            writer,
        }
    }
}

impl<R, W> Stream for ByteTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    type Item = Result<JsonRpcMessage, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        this.reader
            .poll_next(cx)
            .map(|frame| frame.map(|result| result.and_then(|message| message)))
    }
}

#[async_trait]
impl<R, W> Transport for ByteTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn write_message(&mut self, message: JsonRpcMessage) -> Result<(), TransportError> {
        let mut json = serde_json::to_vec(&message)?;
        json.push(b'\n');

        self.writer.write_all(&json).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
