//! RESP2 protocol parser.
//!
//! RESP2 is the default Redis protocol, supporting:
//! - Simple Strings (+)
//! - Errors (-)
//! - Integers (:)
//! - Bulk Strings ($)
//! - Arrays (*)
//! - Null (represented as $-1 or *-1)

use super::{
    find_crlf, parse_len, ParseResult, RedisError, RedisValue, RespType, MAX_BULK_SIZE,
    MAX_ELEMENTS, MAX_NESTING_DEPTH,
};
use bytes::Bytes;

/// RESP2 parser.
#[derive(Debug, Default)]
pub struct Resp2Parser {
    /// Current nesting depth.
    depth: usize,
}

impl Resp2Parser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one value from the front of the buffer.
    pub fn parse(&mut self, data: &[u8]) -> ParseResult {
        self.depth = 0;
        self.parse_value(data)
    }

    fn parse_value(&mut self, data: &[u8]) -> ParseResult {
        if data.is_empty() {
            return ParseResult::Incomplete;
        }

        if self.depth > MAX_NESTING_DEPTH {
            return ParseResult::Error("maximum nesting depth exceeded".to_string());
        }

        match RespType::from_byte(data[0]) {
            Some(RespType::SimpleString) => parse_line(&data[1..], |s| {
                Ok(RedisValue::SimpleString(s.to_string()))
            }),
            Some(RespType::Error) => {
                parse_line(&data[1..], |s| Ok(RedisValue::Error(RedisError::from_line(s))))
            }
            Some(RespType::Integer) => parse_line(&data[1..], |s| {
                s.parse::<i64>()
                    .map(RedisValue::Integer)
                    .map_err(|_| "invalid integer".to_string())
            }),
            Some(RespType::BulkString) => self.parse_bulk_string(&data[1..]),
            Some(RespType::Array) => self.parse_array(&data[1..]),
            Some(t) => ParseResult::Error(format!("RESP3 type {:?} not supported in RESP2", t)),
            None => ParseResult::Error(format!("unexpected type byte 0x{:02x}", data[0])),
        }
    }

    /// Parse a bulk string ($6\r\nfoobar\r\n).
    fn parse_bulk_string(&self, data: &[u8]) -> ParseResult {
        let (len, header) = match parse_len(data) {
            Some(v) => v,
            None if find_crlf(data).is_some() => {
                return ParseResult::Error("invalid bulk string length".to_string())
            }
            None => return ParseResult::Incomplete,
        };

        match len {
            -1 => ParseResult::Ok(RedisValue::Null, header + 1),
            len if len >= 0 => {
                let len = len as usize;
                if len > MAX_BULK_SIZE {
                    return ParseResult::Error(format!(
                        "bulk string too large: {} > {}",
                        len, MAX_BULK_SIZE
                    ));
                }

                let data_end = header + len;
                if data.len() < data_end + 2 {
                    return ParseResult::Incomplete;
                }

                if &data[data_end..data_end + 2] != b"\r\n" {
                    return ParseResult::Error("missing CRLF after bulk string".to_string());
                }

                let bytes = Bytes::copy_from_slice(&data[header..data_end]);
                // +1 for prefix, +2 for trailing CRLF
                ParseResult::Ok(RedisValue::BulkString(bytes), data_end + 3)
            }
            _ => ParseResult::Error("invalid bulk string length".to_string()),
        }
    }

    /// Parse an array (*2\r\n...).
    fn parse_array(&mut self, data: &[u8]) -> ParseResult {
        let (len, header) = match parse_len(data) {
            Some(v) => v,
            None if find_crlf(data).is_some() => {
                return ParseResult::Error("invalid array length".to_string())
            }
            None => return ParseResult::Incomplete,
        };

        match len {
            -1 => ParseResult::Ok(RedisValue::Null, header + 1),
            len if len >= 0 => {
                let len = len as usize;
                if len > MAX_ELEMENTS {
                    return ParseResult::Error(format!(
                        "array too large: {} > {}",
                        len, MAX_ELEMENTS
                    ));
                }

                self.depth += 1;
                let mut elements = Vec::with_capacity(len.min(1024));
                let mut offset = header;

                for _ in 0..len {
                    match self.parse_value(&data[offset..]) {
                        ParseResult::Ok(value, consumed) => {
                            elements.push(value);
                            offset += consumed;
                        }
                        other => {
                            self.depth -= 1;
                            return other;
                        }
                    }
                }

                self.depth -= 1;
                ParseResult::Ok(RedisValue::Array(elements), offset + 1)
            }
            _ => ParseResult::Error("invalid array length".to_string()),
        }
    }
}

/// Parse a CRLF-terminated line after the type prefix.
pub(crate) fn parse_line<F>(data: &[u8], f: F) -> ParseResult
where
    F: FnOnce(&str) -> Result<RedisValue, String>,
{
    match find_crlf(data) {
        Some(pos) => {
            let s = String::from_utf8_lossy(&data[..pos]);
            match f(&s) {
                // +1 prefix, +2 CRLF
                Ok(value) => ParseResult::Ok(value, pos + 3),
                Err(e) => ParseResult::Error(e),
            }
        }
        None => ParseResult::Incomplete,
    }
}

pub(crate) fn encode_header(prefix: u8, len: usize, buf: &mut Vec<u8>) {
    buf.push(prefix);
    buf.extend_from_slice(len.to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
}

pub(crate) fn encode_bulk(data: &[u8], buf: &mut Vec<u8>) {
    encode_header(b'$', data.len(), buf);
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
}
