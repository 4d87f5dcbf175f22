//! RESP3 protocol parser.
//!
//! RESP3 extends RESP2 with additional types:
//! - Null (_)
//! - Boolean (#)
//! - Double (,)
//! - Big Number (()
//! - Bulk Error (!)
//! - Verbatim String (=)
//! - Map (%)
//! - Set (~)
//! - Attribute (|)
//! - Push (>)

use super::resp2::parse_line;
use super::{
    find_crlf, parse_len, ParseResult, RedisError, RedisValue, RespType, MAX_BULK_SIZE,
    MAX_ELEMENTS, MAX_NESTING_DEPTH,
};
use bytes::Bytes;

/// RESP3 parser.
#[derive(Debug, Default)]
pub struct Resp3Parser {
    /// Current nesting depth.
    depth: usize,
}

impl Resp3Parser {
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

        let body = &data[1..];
        match RespType::from_byte(data[0]) {
            Some(RespType::SimpleString) => {
                parse_line(body, |s| Ok(RedisValue::SimpleString(s.to_string())))
            }
            Some(RespType::Error) => {
                parse_line(body, |s| Ok(RedisValue::Error(RedisError::from_line(s))))
            }
            Some(RespType::Integer) => parse_line(body, |s| {
                s.parse::<i64>()
                    .map(RedisValue::Integer)
                    .map_err(|_| "invalid integer".to_string())
            }),
            Some(RespType::Null) => parse_line(body, |s| {
                if s.is_empty() {
                    Ok(RedisValue::Null)
                } else {
                    Err("invalid null".to_string())
                }
            }),
            Some(RespType::Boolean) => parse_line(body, |s| match s {
                "t" => Ok(RedisValue::Boolean(true)),
                "f" => Ok(RedisValue::Boolean(false)),
                _ => Err("invalid boolean".to_string()),
            }),
            Some(RespType::Double) => parse_line(body, parse_double),
            Some(RespType::BigNumber) => {
                parse_line(body, |s| Ok(RedisValue::BigNumber(s.to_string())))
            }
            Some(RespType::BulkString) => self.parse_blob(body, RespType::BulkString),
            Some(RespType::BulkError) => self.parse_blob(body, RespType::BulkError),
            Some(RespType::VerbatimString) => self.parse_blob(body, RespType::VerbatimString),
            Some(t @ (RespType::Array | RespType::Set | RespType::Push)) => {
                self.parse_aggregate(body, t)
            }
            Some(RespType::Map) => self.parse_map(body),
            Some(RespType::Attribute) => self.parse_attribute(body),
            None => ParseResult::Error(format!("unexpected type byte 0x{:02x}", data[0])),
        }
    }

    /// Parse bulk string, bulk error, or verbatim string.
    fn parse_blob(&self, data: &[u8], typ: RespType) -> ParseResult {
        let (len, header) = match read_len(data) {
            Ok(v) => v,
            Err(result) => return result,
        };

        if len == -1 {
            return ParseResult::Ok(RedisValue::Null, header + 1);
        }
        if len < 0 || len as usize > MAX_BULK_SIZE {
            return ParseResult::Error("invalid length".to_string());
        }

        let data_end = header + len as usize;
        if data.len() < data_end + 2 {
            return ParseResult::Incomplete;
        }
        if &data[data_end..data_end + 2] != b"\r\n" {
            return ParseResult::Error("missing CRLF".to_string());
        }

        let payload = &data[header..data_end];
        let value = match typ {
            RespType::BulkError => {
                RedisValue::BulkError(RedisError::from_line(&String::from_utf8_lossy(payload)))
            }
            RespType::VerbatimString => {
                // Format is first 3 bytes + ':'
                if payload.len() < 4 || payload[3] != b':' {
                    return ParseResult::Error("invalid verbatim format".to_string());
                }
                RedisValue::VerbatimString {
                    format: String::from_utf8_lossy(&payload[..3]).to_string(),
                    data: Bytes::copy_from_slice(&payload[4..]),
                }
            }
            _ => RedisValue::BulkString(Bytes::copy_from_slice(payload)),
        };

        ParseResult::Ok(value, data_end + 3)
    }

    /// Parse aggregate types (array, set, push).
    fn parse_aggregate(&mut self, data: &[u8], typ: RespType) -> ParseResult {
        let (len, header) = match read_len(data) {
            Ok(v) => v,
            Err(result) => return result,
        };

        if len == -1 {
            return ParseResult::Ok(RedisValue::Null, header + 1);
        }
        if len < 0 || len as usize > MAX_ELEMENTS {
            return ParseResult::Error("invalid length".to_string());
        }

        let (elements, offset) = match self.parse_elements(data, header, len as usize) {
            Ok(v) => v,
            Err(result) => return result,
        };

        let value = match typ {
            RespType::Set => RedisValue::Set(elements),
            RespType::Push => RedisValue::Push(elements),
            _ => RedisValue::Array(elements),
        };
        ParseResult::Ok(value, offset + 1)
    }

    /// Parse map (%2\r\n...).
    fn parse_map(&mut self, data: &[u8]) -> ParseResult {
        let (len, header) = match read_len(data) {
            Ok(v) => v,
            Err(result) => return result,
        };

        if len == -1 {
            return ParseResult::Ok(RedisValue::Null, header + 1);
        }
        if len < 0 || len as usize > MAX_ELEMENTS / 2 {
            return ParseResult::Error("invalid length".to_string());
        }

        let (flat, offset) = match self.parse_elements(data, header, len as usize * 2) {
            Ok(v) => v,
            Err(result) => return result,
        };

        let mut pairs = Vec::with_capacity(flat.len() / 2);
        let mut iter = flat.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            pairs.push((k, v));
        }
        ParseResult::Ok(RedisValue::Map(pairs), offset + 1)
    }

    /// Parse attribute (|1\r\n...).
    ///
    /// Attributes precede the actual reply. They are parsed and discarded;
    /// the reported length covers both the attribute and the reply.
    fn parse_attribute(&mut self, data: &[u8]) -> ParseResult {
        let attr_len = match self.parse_map(data) {
            // Map length includes the prefix byte, which here was '|'.
            ParseResult::Ok(_, consumed) => consumed,
            other => return other,
        };

        match self.parse_value(&data[attr_len - 1..]) {
            ParseResult::Ok(value, consumed) => ParseResult::Ok(value, attr_len + consumed),
            other => other,
        }
    }

    fn parse_elements(
        &mut self,
        data: &[u8],
        start: usize,
        count: usize,
    ) -> Result<(Vec<RedisValue>, usize), ParseResult> {
        self.depth += 1;
        let mut elements = Vec::with_capacity(count.min(1024));
        let mut offset = start;

        for _ in 0..count {
            match self.parse_value(&data[offset..]) {
                ParseResult::Ok(value, consumed) => {
                    elements.push(value);
                    offset += consumed;
                }
                other => {
                    self.depth -= 1;
                    return Err(other);
                }
            }
        }

        self.depth -= 1;
        Ok((elements, offset))
    }
}

fn read_len(data: &[u8]) -> Result<(i64, usize), ParseResult> {
    match parse_len(data) {
        Some(v) => Ok(v),
        None if find_crlf(data).is_some() => Err(ParseResult::Error("invalid length".to_string())),
        None => Err(ParseResult::Incomplete),
    }
}

fn parse_double(s: &str) -> Result<RedisValue, String> {
    let d = match s {
        "inf" | "+inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        "nan" => f64::NAN,
        _ => s.parse::<f64>().map_err(|_| "invalid double".to_string())?,
    };
    Ok(RedisValue::Double(d))
}
