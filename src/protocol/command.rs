//! Command invocations.

use super::resp2::{encode_bulk, encode_header};
use bytes::Bytes;
use std::time::Duration;

/// A single logical Redis command: name, arguments and an optional
/// per-command wait override.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Command name (uppercase).
    pub name: String,

    /// Command arguments.
    pub args: Vec<Bytes>,

    /// Wait override that takes precedence over the connection policy.
    pub timeout: Option<Duration>,
}

impl Command {
    /// Create a command with no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_uppercase(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Append one or more arguments.
    pub fn arg(mut self, arg: impl ToRedisArgs) -> Self {
        arg.write_redis_args(&mut self.args);
        self
    }

    /// Attach a wait override to this command.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Encode as a RESP array of bulk strings, valid under RESP2 and RESP3.
    pub fn to_frame(&self) -> Bytes {
        let mut buf = Vec::with_capacity(16 + self.name.len() + self.args.len() * 16);
        encode_header(b'*', self.args.len() + 1, &mut buf);
        encode_bulk(self.name.as_bytes(), &mut buf);
        for arg in &self.args {
            encode_bulk(arg, &mut buf);
        }
        Bytes::from(buf)
    }

}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, " {}", String::from_utf8_lossy(arg))?;
        }
        Ok(())
    }
}

/// Types that can be written as command arguments.
///
/// Collections and tuples expand into several arguments, so `MSET`-style
/// commands take `&[("k1", "v1"), ("k2", "v2")]` directly.
pub trait ToRedisArgs {
    /// Append this value's arguments to `out`.
    fn write_redis_args(&self, out: &mut Vec<Bytes>);
}

impl ToRedisArgs for str {
    fn write_redis_args(&self, out: &mut Vec<Bytes>) {
        out.push(Bytes::copy_from_slice(self.as_bytes()));
    }
}

impl ToRedisArgs for String {
    fn write_redis_args(&self, out: &mut Vec<Bytes>) {
        out.push(Bytes::copy_from_slice(self.as_bytes()));
    }
}

impl ToRedisArgs for Bytes {
    fn write_redis_args(&self, out: &mut Vec<Bytes>) {
        out.push(self.clone());
    }
}

macro_rules! numeric_args {
    ($($t:ty),*) => {
        $(
            impl ToRedisArgs for $t {
                fn write_redis_args(&self, out: &mut Vec<Bytes>) {
                    out.push(Bytes::from(self.to_string()));
                }
            }
        )*
    };
}

numeric_args!(i32, i64, u16, u32, u64, usize, f64);

impl<T: ToRedisArgs> ToRedisArgs for [T] {
    fn write_redis_args(&self, out: &mut Vec<Bytes>) {
        for item in self {
            item.write_redis_args(out);
        }
    }
}

impl<T: ToRedisArgs> ToRedisArgs for Vec<T> {
    fn write_redis_args(&self, out: &mut Vec<Bytes>) {
        self.as_slice().write_redis_args(out);
    }
}

impl<T: ToRedisArgs, const N: usize> ToRedisArgs for [T; N] {
    fn write_redis_args(&self, out: &mut Vec<Bytes>) {
        self.as_slice().write_redis_args(out);
    }
}

impl<A: ToRedisArgs, B: ToRedisArgs> ToRedisArgs for (A, B) {
    fn write_redis_args(&self, out: &mut Vec<Bytes>) {
        self.0.write_redis_args(out);
        self.1.write_redis_args(out);
    }
}

impl<T: ToRedisArgs + ?Sized> ToRedisArgs for &T {
    fn write_redis_args(&self, out: &mut Vec<Bytes>) {
        (**self).write_redis_args(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_flattens_arguments() {
        let cmd = Command::new("mset").arg(&[("k1", "v1"), ("k2", "v2")][..]);
        assert_eq!(cmd.name, "MSET");
        assert_eq!(cmd.args.len(), 4);
        assert_eq!(&cmd.args[2][..], b"k2");

        let cmd = Command::new("EXPIRE").arg("key").arg(30u64);
        assert_eq!(&cmd.args[1][..], b"30");
        assert_eq!(cmd.to_string(), "EXPIRE key 30");
    }

    #[test]
    fn test_frame_encoding() {
        let cmd = Command::new("GET").arg("key");
        assert_eq!(cmd.to_frame().as_ref(), b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n");
    }

    #[test]
    fn test_timeout_override() {
        let cmd = Command::new("BLPOP").with_timeout(Duration::from_secs(5));
        assert_eq!(cmd.timeout, Some(Duration::from_secs(5)));
        assert_eq!(Command::new("GET").timeout, None);
    }
}
