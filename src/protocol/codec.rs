//! Client-side framing.
//!
//! Encodes commands onto the write buffer and splits complete replies off
//! the front of the read buffer.

use super::{Command, ParseResult, ProtocolVersion, RedisValue, Resp2Parser, Resp3Parser};
use crate::core::error::{BridgeError, BridgeResult};
use bytes::{Buf, BytesMut};

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A reply to the oldest in-flight command.
    Reply(RedisValue),
    /// An out-of-band RESP3 push. Not a reply.
    Push(Vec<RedisValue>),
}

/// RESP codec for the client side of a connection.
#[derive(Debug, Default)]
pub struct RespCodec {
    version: ProtocolVersion,
    resp2: Resp2Parser,
    resp3: Resp3Parser,
}

impl RespCodec {
    /// Create a codec expecting replies in `version`.
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            version,
            ..Default::default()
        }
    }

    /// Reply format currently expected.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Switch the expected reply format (after HELLO).
    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    /// Append a command to the write buffer.
    pub fn encode(&self, command: &Command, buf: &mut BytesMut) {
        buf.extend_from_slice(&command.to_frame());
    }

    /// Split one complete frame off the buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed. A protocol error
    /// leaves the buffer untouched; the stream cannot be resynchronised.
    pub fn decode(&mut self, buf: &mut BytesMut) -> BridgeResult<Option<Frame>> {
        if buf.is_empty() {
            return Ok(None);
        }

        let result = match self.version {
            ProtocolVersion::Resp2 => self.resp2.parse(&buf[..]),
            ProtocolVersion::Resp3 => self.resp3.parse(&buf[..]),
        };

        match result {
            ParseResult::Ok(value, consumed) => {
                buf.advance(consumed);
                match value {
                    RedisValue::Push(items) => Ok(Some(Frame::Push(items))),
                    value => Ok(Some(Frame::Reply(value))),
                }
            }
            ParseResult::Incomplete => Ok(None),
            ParseResult::Error(message) => Err(BridgeError::protocol(message)),
        }
    }
}
