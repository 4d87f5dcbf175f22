//! Typed views of replies.
//!
//! The async client resolves every command to a [`RedisValue`]; command
//! methods convert it to the shape their caller asked for. Conversion never
//! changes a reply's meaning: a shape mismatch is reported as
//! [`BridgeError::Conversion`], and a nested error reply surfaces as
//! [`BridgeError::Remote`].

use super::RedisValue;
use crate::core::error::{BridgeError, BridgeResult};
use bytes::Bytes;
use std::collections::HashMap;

/// Types that can be built from a resolved reply.
pub trait FromRedisValue: Sized {
    /// Convert a reply.
    fn from_redis_value(value: RedisValue) -> BridgeResult<Self>;
}

fn mismatch<T>(expected: &'static str, value: &RedisValue) -> BridgeResult<T> {
    match value {
        RedisValue::Error(e) | RedisValue::BulkError(e) => Err(BridgeError::Remote(e.clone())),
        other => Err(BridgeError::Conversion {
            expected,
            found: other.type_name().to_string(),
        }),
    }
}

impl FromRedisValue for RedisValue {
    fn from_redis_value(value: RedisValue) -> BridgeResult<Self> {
        Ok(value)
    }
}

impl FromRedisValue for () {
    fn from_redis_value(value: RedisValue) -> BridgeResult<Self> {
        match value {
            RedisValue::Error(_) | RedisValue::BulkError(_) => mismatch("status", &value),
            _ => Ok(()),
        }
    }
}

impl FromRedisValue for String {
    fn from_redis_value(value: RedisValue) -> BridgeResult<Self> {
        match value {
            RedisValue::SimpleString(s) | RedisValue::BigNumber(s) => Ok(s),
            RedisValue::BulkString(ref b) | RedisValue::VerbatimString { data: ref b, .. } => {
                match std::str::from_utf8(b) {
                    Ok(s) => Ok(s.to_string()),
                    Err(_) => mismatch("utf-8 string", &value),
                }
            }
            RedisValue::Integer(n) => Ok(n.to_string()),
            RedisValue::Double(d) => Ok(d.to_string()),
            other => mismatch("string", &other),
        }
    }
}

impl FromRedisValue for Bytes {
    fn from_redis_value(value: RedisValue) -> BridgeResult<Self> {
        match value {
            RedisValue::BulkString(b) | RedisValue::VerbatimString { data: b, .. } => Ok(b),
            RedisValue::SimpleString(s) => Ok(Bytes::from(s)),
            other => mismatch("bytes", &other),
        }
    }
}

impl FromRedisValue for i64 {
    fn from_redis_value(value: RedisValue) -> BridgeResult<Self> {
        match value {
            RedisValue::Boolean(b) => Ok(b as i64),
            ref other => match other.as_int() {
                Some(n) => Ok(n),
                None => mismatch("integer", other),
            },
        }
    }
}

impl FromRedisValue for u64 {
    fn from_redis_value(value: RedisValue) -> BridgeResult<Self> {
        let n = i64::from_redis_value(value)?;
        u64::try_from(n).map_err(|_| BridgeError::Conversion {
            expected: "unsigned integer",
            found: n.to_string(),
        })
    }
}

impl FromRedisValue for bool {
    fn from_redis_value(value: RedisValue) -> BridgeResult<Self> {
        match value {
            RedisValue::Boolean(b) => Ok(b),
            RedisValue::Integer(n) => Ok(n != 0),
            RedisValue::SimpleString(ref s) if s == "OK" => Ok(true),
            other => mismatch("boolean", &other),
        }
    }
}

impl FromRedisValue for f64 {
    fn from_redis_value(value: RedisValue) -> BridgeResult<Self> {
        match value {
            RedisValue::Double(d) => Ok(d),
            RedisValue::Integer(n) => Ok(n as f64),
            RedisValue::BulkString(ref b) => {
                let parsed = std::str::from_utf8(b).ok().and_then(|s| match s {
                    "inf" | "+inf" => Some(f64::INFINITY),
                    "-inf" => Some(f64::NEG_INFINITY),
                    _ => s.parse().ok(),
                });
                match parsed {
                    Some(d) => Ok(d),
                    None => mismatch("double", &value),
                }
            }
            other => mismatch("double", &other),
        }
    }
}

impl<T: FromRedisValue> FromRedisValue for Option<T> {
    fn from_redis_value(value: RedisValue) -> BridgeResult<Self> {
        match value {
            RedisValue::Null => Ok(None),
            other => T::from_redis_value(other).map(Some),
        }
    }
}

impl<T: FromRedisValue> FromRedisValue for Vec<T> {
    fn from_redis_value(value: RedisValue) -> BridgeResult<Self> {
        match value {
            RedisValue::Array(items) | RedisValue::Set(items) | RedisValue::Push(items) => {
                items.into_iter().map(T::from_redis_value).collect()
            }
            RedisValue::Null => Ok(Vec::new()),
            other => mismatch("array", &other),
        }
    }
}

impl<T: FromRedisValue> FromRedisValue for HashMap<String, T> {
    fn from_redis_value(value: RedisValue) -> BridgeResult<Self> {
        let pairs = match value {
            RedisValue::Map(pairs) => pairs,
            // RESP2 sends maps as flat key/value arrays
            RedisValue::Array(items) => {
                if items.len() % 2 != 0 {
                    return Err(BridgeError::Conversion {
                        expected: "key/value pairs",
                        found: format!("array of {} elements", items.len()),
                    });
                }
                let mut pairs = Vec::with_capacity(items.len() / 2);
                let mut iter = items.into_iter();
                while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                    pairs.push((k, v));
                }
                pairs
            }
            RedisValue::Null => Vec::new(),
            other => return mismatch("map", &other),
        };

        pairs
            .into_iter()
            .map(|(k, v)| Ok((String::from_redis_value(k)?, T::from_redis_value(v)?)))
            .collect()
    }
}
