//! Async client for the socket transport.

use bytes::Bytes;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::net::framing::{encode_frame, FrameDecoder, FrameError, SocketRequest};

const METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "PATCH"];

/// Errors raised by [`SocketClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("method must be one of get, post, put, delete, patch (got {0:?})")]
    InvalidMethod(String),

    #[error("{0} must be a JSON object")]
    InvalidPayload(&'static str),

    #[error("reply is not JSON: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("connection closed by server")]
    Closed,
}

/// A request/response client speaking the sentinel framing.
///
/// Replies are read in arrival order; broadcasts from the server (such as
/// pings) arrive on the same stream and can be read with
/// [`SocketClient::recv`].
#[derive(Debug)]
pub struct SocketClient {
    stream: TcpStream,
    decoder: FrameDecoder,
}

impl SocketClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            decoder: FrameDecoder::new(16 * 1024 * 1024),
        })
    }

    /// Send one request and wait for the next reply.
    pub async fn send(
        &mut self,
        method: &str,
        path: &str,
        query: Value,
        body: Value,
    ) -> Result<Value, ClientError> {
        let method = method.to_uppercase();
        if !METHODS.contains(&method.as_str()) {
            return Err(ClientError::InvalidMethod(method));
        }
        if !query.is_object() {
            return Err(ClientError::InvalidPayload("query"));
        }
        if !body.is_object() {
            return Err(ClientError::InvalidPayload("body"));
        }

        let request = SocketRequest {
            path: path.to_string(),
            method,
            query,
            body,
        };
        self.write_raw(request.encode()?.as_bytes()).await?;
        self.recv().await
    }

    /// Frame and write `payload` as-is.
    pub async fn write_raw(&mut self, payload: &[u8]) -> Result<(), ClientError> {
        self.stream.write_all(&encode_frame(payload)).await?;
        Ok(())
    }

    /// Read the next frame and parse it as JSON.
    pub async fn recv(&mut self) -> Result<Value, ClientError> {
        let frame = self.recv_frame().await?;
        serde_json::from_slice(&frame).map_err(ClientError::Decode)
    }

    /// Read the next raw frame.
    pub async fn recv_frame(&mut self) -> Result<Bytes, ClientError> {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(frame);
            }
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(ClientError::Closed);
            }
            self.decoder.extend(&buf[..n]);
        }
    }
}
