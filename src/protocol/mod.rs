//! Redis wire protocol.
//!
//! This module implements the RESP2 and RESP3 reply formats, the value model
//! shared by every layer of the crate, and the [`Command`] type that travels
//! from a caller to the async client.

pub mod codec;
pub mod command;
pub mod convert;
pub mod resp2;
pub mod resp3;

pub use codec::{Frame, RespCodec};
pub use command::{Command, ToRedisArgs};
pub use convert::FromRedisValue;
pub use resp2::Resp2Parser;
pub use resp3::Resp3Parser;

use bytes::Bytes;

/// Maximum nesting depth for arrays/maps.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Maximum bulk string size (512MB).
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array/map elements.
pub const MAX_ELEMENTS: usize = 1_000_000;

/// Redis protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    /// RESP2 (Redis 2.0+)
    #[default]
    Resp2,
    /// RESP3 (Redis 6.0+)
    Resp3,
}

impl ProtocolVersion {
    /// Map the numeric version used by `HELLO` and the config file.
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            2 => Some(Self::Resp2),
            3 => Some(Self::Resp3),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolVersion::Resp2 => write!(f, "2"),
            ProtocolVersion::Resp3 => write!(f, "3"),
        }
    }
}

/// RESP type byte prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespType {
    /// Simple string (+)
    SimpleString,
    /// Error (-)
    Error,
    /// Integer (:)
    Integer,
    /// Bulk string ($)
    BulkString,
    /// Array (*)
    Array,
    /// Null (_) - RESP3
    Null,
    /// Boolean (#) - RESP3
    Boolean,
    /// Double (,) - RESP3
    Double,
    /// Big number (() - RESP3
    BigNumber,
    /// Bulk error (!) - RESP3
    BulkError,
    /// Verbatim string (=) - RESP3
    VerbatimString,
    /// Map (%) - RESP3
    Map,
    /// Set (~) - RESP3
    Set,
    /// Attribute (|) - RESP3
    Attribute,
    /// Push (>) - RESP3
    Push,
}

impl RespType {
    /// Get the type from a prefix byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'+' => Some(Self::SimpleString),
            b'-' => Some(Self::Error),
            b':' => Some(Self::Integer),
            b'$' => Some(Self::BulkString),
            b'*' => Some(Self::Array),
            b'_' => Some(Self::Null),
            b'#' => Some(Self::Boolean),
            b',' => Some(Self::Double),
            b'(' => Some(Self::BigNumber),
            b'!' => Some(Self::BulkError),
            b'=' => Some(Self::VerbatimString),
            b'%' => Some(Self::Map),
            b'~' => Some(Self::Set),
            b'|' => Some(Self::Attribute),
            b'>' => Some(Self::Push),
            _ => None,
        }
    }
}

/// Parse result.
///
/// `Ok` carries the decoded value and the number of bytes it occupied,
/// prefix and trailing CRLF included.
#[derive(Debug)]
pub enum ParseResult {
    /// Successfully parsed a value.
    Ok(RedisValue, usize),
    /// Need more data.
    Incomplete,
    /// Parse error.
    Error(String),
}

/// Redis value type (RESP3 type system).
#[derive(Debug, Clone, PartialEq)]
pub enum RedisValue {
    /// Simple string (+OK\r\n)
    SimpleString(String),

    /// Error (-ERR message\r\n)
    Error(RedisError),

    /// Integer (:1000\r\n)
    Integer(i64),

    /// Bulk string ($6\r\nfoobar\r\n)
    BulkString(Bytes),

    /// Array (*2\r\n...)
    Array(Vec<RedisValue>),

    /// Null (_\r\n in RESP3, $-1\r\n or *-1\r\n in RESP2)
    Null,

    /// Boolean (#t\r\n or #f\r\n) - RESP3 only
    Boolean(bool),

    /// Double (,1.23\r\n) - RESP3 only
    Double(f64),

    /// Big number ((123456789...\r\n) - RESP3 only
    BigNumber(String),

    /// Bulk error (!21\r\nSYNTAX invalid\r\n) - RESP3 only
    BulkError(RedisError),

    /// Verbatim string (=15\r\ntxt:Some text\r\n) - RESP3 only
    VerbatimString { format: String, data: Bytes },

    /// Map (%2\r\n+key\r\n:1\r\n...) - RESP3 only
    Map(Vec<(RedisValue, RedisValue)>),

    /// Set (~3\r\n+a\r\n+b\r\n+c\r\n) - RESP3 only
    Set(Vec<RedisValue>),

    /// Push (>2\r\n+message\r\n...) - RESP3 only
    Push(Vec<RedisValue>),
}

impl RedisValue {
    /// Create a simple string.
    pub fn simple_string(s: impl Into<String>) -> Self {
        Self::SimpleString(s.into())
    }

    /// Create an OK response.
    pub fn ok() -> Self {
        Self::SimpleString("OK".to_string())
    }

    /// Create an error.
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error(RedisError::new(kind, message))
    }

    /// Create an integer.
    pub fn integer(n: i64) -> Self {
        Self::Integer(n)
    }

    /// Create a bulk string from a string.
    pub fn bulk_string(s: impl AsRef<str>) -> Self {
        Self::BulkString(Bytes::from(s.as_ref().to_string()))
    }

    /// Create an array.
    pub fn array(items: Vec<RedisValue>) -> Self {
        Self::Array(items)
    }

    /// Split a top-level error reply off the value.
    pub fn into_result(self) -> Result<RedisValue, RedisError> {
        match self {
            Self::Error(e) | Self::BulkError(e) => Err(e),
            other => Ok(other),
        }
    }

    /// Try to get as integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::SimpleString(s) | Self::BigNumber(s) => s.parse().ok(),
            Self::BulkString(b) => std::str::from_utf8(b).ok().and_then(|s| s.parse().ok()),
            _ => None,
        }
    }

    /// Short type label used in conversion errors and CLI output.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SimpleString(_) => "simple-string",
            Self::Error(_) => "error",
            Self::Integer(_) => "integer",
            Self::BulkString(_) => "bulk-string",
            Self::Array(_) => "array",
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Double(_) => "double",
            Self::BigNumber(_) => "big-number",
            Self::BulkError(_) => "bulk-error",
            Self::VerbatimString { .. } => "verbatim-string",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
            Self::Push(_) => "push",
        }
    }
}

/// Redis error reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisError {
    /// Error kind (ERR, WRONGTYPE, NOSCRIPT, etc.)
    pub kind: String,
    /// Error message.
    pub message: String,
}

impl RedisError {
    /// Create a new error.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create a generic error.
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new("ERR", message)
    }

    /// Split a raw error line (`KIND message`) into kind and message.
    pub fn from_line(line: &str) -> Self {
        match line.split_once(' ') {
            Some((kind, message)) => Self::new(kind, message),
            None => Self::new(line, ""),
        }
    }

}

impl std::fmt::Display for RedisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for RedisError {}

/// Find CRLF in data, returning position of first \r.
pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

/// Read a `<digits>\r\n` length header.
pub(crate) fn parse_len(data: &[u8]) -> Option<(i64, usize)> {
    let pos = find_crlf(data)?;
    let n = std::str::from_utf8(&data[..pos]).ok()?.parse().ok()?;
    Some((n, pos + 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resp_type_from_byte() {
        assert_eq!(RespType::from_byte(b'+'), Some(RespType::SimpleString));
        assert_eq!(RespType::from_byte(b'-'), Some(RespType::Error));
        assert_eq!(RespType::from_byte(b'$'), Some(RespType::BulkString));
        assert_eq!(RespType::from_byte(b'%'), Some(RespType::Map));
        assert_eq!(RespType::from_byte(b'x'), None);
    }

    #[test]
    fn test_into_result_splits_errors() {
        assert_eq!(RedisValue::ok().into_result(), Ok(RedisValue::ok()));
        let err = RedisValue::error("WRONGTYPE", "bad").into_result().unwrap_err();
        assert_eq!(err.kind, "WRONGTYPE");
        assert_eq!(err.to_string(), "WRONGTYPE bad");
    }

    #[test]
    fn test_error_from_line() {
        let e = RedisError::from_line("MOVED 3999 127.0.0.1:6381");
        assert_eq!(e.kind, "MOVED");
        assert_eq!(e.message, "3999 127.0.0.1:6381");

        let e = RedisError::from_line("LOADING");
        assert_eq!(e.kind, "LOADING");
        assert!(e.message.is_empty());
        assert_eq!(e.to_string(), "LOADING");
    }

    #[test]
    fn test_protocol_version_numbers() {
        assert_eq!(ProtocolVersion::from_number(2), Some(ProtocolVersion::Resp2));
        assert_eq!(ProtocolVersion::from_number(3), Some(ProtocolVersion::Resp3));
        assert_eq!(ProtocolVersion::from_number(4), None);
        assert_eq!(ProtocolVersion::Resp3.to_string(), "3");
    }
}
