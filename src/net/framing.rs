//! Sentinel-delimited socket framing.
//!
//! # Responsibilities
//! - Split a byte stream into frames terminated by `@@@@@@`
//! - Decode a frame into a socket request (`{path, method, query, body}`)
//!
//! # Design Decisions
//! - Frames are bounded; an oversized frame is a protocol error that closes
//!   the connection
//! - Request payloads may be plain JSON or base64-encoded JSON
//! - Empty frames are skipped, not errors

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Frame terminator.
pub const SENTINEL: &[u8; 6] = b"@@@@@@";

/// Errors raised while decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("frame is not valid JSON or base64 JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Append the sentinel to `payload`.
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + SENTINEL.len());
    buf.extend_from_slice(payload);
    buf.extend_from_slice(SENTINEL);
    buf.freeze()
}

/// Incremental frame splitter.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_frame_bytes: usize,
}

impl FrameDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_bytes,
        }
    }

    /// Feed bytes read from the stream.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Take the next complete, non-empty frame, without the sentinel.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        loop {
            let Some(end) = find_sentinel(&self.buf) else {
                if self.buf.len() > self.max_frame_bytes + SENTINEL.len() {
                    return Err(FrameError::TooLarge {
                        limit: self.max_frame_bytes,
                    });
                }
                return Ok(None);
            };
            if end > self.max_frame_bytes {
                return Err(FrameError::TooLarge {
                    limit: self.max_frame_bytes,
                });
            }
            let frame = self.buf.split_to(end).freeze();
            self.buf.advance(SENTINEL.len());
            if !frame.iter().all(u8::is_ascii_whitespace) {
                return Ok(Some(frame));
            }
        }
    }

    /// Bytes buffered but not yet framed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn find_sentinel(buf: &[u8]) -> Option<usize> {
    buf.windows(SENTINEL.len()).position(|w| w == SENTINEL)
}

/// A request carried in one socket frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketRequest {
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "empty_object")]
    pub query: Value,
    #[serde(default)]
    pub body: Value,
}

fn default_method() -> String {
    "GET".to_string()
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl SocketRequest {
    /// Decode a frame payload: JSON first, then base64 of JSON.
    pub fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        let trimmed = frame.trim_ascii();
        match serde_json::from_slice(trimmed) {
            Ok(request) => Ok(request),
            Err(json_err) => match STANDARD.decode(trimmed) {
                Ok(decoded) => Ok(serde_json::from_slice(&decoded)?),
                Err(_) => Err(FrameError::Malformed(json_err)),
            },
        }
    }

    /// Encode as the reference client does: base64 of the JSON body.
    pub fn encode(&self) -> Result<String, FrameError> {
        Ok(STANDARD.encode(serde_json::to_vec(self)?))
    }
}
