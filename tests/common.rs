//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use bytes::BytesMut;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use bytes::Bytes;
use tether::protocol::{Command, ParseResult, ProtocolVersion, RedisValue, Resp2Parser};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;

/// Multi-thread runtime for blocking tests: its workers drive the I/O while
/// the test thread waits.
pub fn test_runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

/// Write `content` to a temporary config file.
pub fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Config pointing at a local server.
pub fn config_for(addr: &str, extra: &str) -> NamedTempFile {
    let (host, port) = addr.rsplit_once(':').expect("address has a port");
    config_file(&format!(
        r#"
[connection]
host = "{}"
port = {}

{}
"#,
        host, port, extra
    ))
}

/// What the fake server does with one command.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer immediately.
    Value(RedisValue),
    /// Answer after a delay. Later replies on the connection queue behind it.
    Delayed(RedisValue, Duration),
    /// Close the connection without answering.
    Close,
}

type Handler = dyn Fn(&Command) -> Reply + Send + Sync;

/// In-process RESP server.
pub struct FakeServer {
    pub addr: String,
    received: Arc<Mutex<Vec<Command>>>,
}

impl FakeServer {
    /// Start on an ephemeral port. `HELLO` is answered by the server itself;
    /// everything else goes to `handler`.
    pub fn start<F>(runtime: &Runtime, handler: F) -> Self
    where
        F: Fn(&Command) -> Reply + Send + Sync + 'static,
    {
        let handler: Arc<Handler> = Arc::new(handler);
        let received = Arc::new(Mutex::new(Vec::new()));
        let listener = runtime
            .block_on(TcpListener::bind("127.0.0.1:0"))
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("local addr").to_string();

        let log = Arc::clone(&received);
        runtime.spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&handler), Arc::clone(&log)));
            }
        });

        Self { addr, received }
    }

    /// Commands received so far, handshake included.
    pub fn received(&self) -> Vec<Command> {
        self.received.lock().clone()
    }

    /// Names of the commands received so far.
    pub fn received_names(&self) -> Vec<String> {
        self.received().into_iter().map(|c| c.name).collect()
    }
}

async fn serve(mut stream: TcpStream, handler: Arc<Handler>, log: Arc<Mutex<Vec<Command>>>) {
    let mut buf = BytesMut::with_capacity(4096);
    let mut parser = Resp2Parser::new();
    let mut version = ProtocolVersion::Resp2;

    loop {
        match stream.read_buf(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }

        loop {
            let (value, consumed) = match parser.parse(&buf[..]) {
                ParseResult::Ok(value, consumed) => (value, consumed),
                ParseResult::Incomplete => break,
                ParseResult::Error(_) => return,
            };
            let _ = buf.split_to(consumed);

            let RedisValue::Array(items) = value else {
                return;
            };
            let Some(command) = parse_request(items) else {
                return;
            };
            log.lock().push(command.clone());

            let reply = if command.name == "HELLO" {
                if arg(&command, 0) == "3" {
                    version = ProtocolVersion::Resp3;
                }
                Reply::Value(RedisValue::Map(vec![(
                    RedisValue::bulk_string("proto"),
                    RedisValue::integer(if version == ProtocolVersion::Resp3 { 3 } else { 2 }),
                )]))
            } else {
                handler(&command)
            };

            let value = match reply {
                Reply::Value(value) => value,
                Reply::Delayed(value, delay) => {
                    tokio::time::sleep(delay).await;
                    value
                }
                Reply::Close => return,
            };
            let mut out = Vec::new();
            encode_reply(&value, version, &mut out);
            if stream.write_all(&out).await.is_err() {
                return;
            }
        }
    }
}

/// A handler that acts like a tiny string store.
pub fn kv_handler() -> impl Fn(&Command) -> Reply + Send + Sync + 'static {
    let store = Arc::new(Mutex::new(std::collections::HashMap::<String, Bytes>::new()));
    move |command| {
        let mut store = store.lock();
        let key = arg(command, 0).to_string();
        let value = match command.name.as_str() {
            "PING" => RedisValue::simple_string("PONG"),
            "SET" => {
                store.insert(key, command.args[1].clone());
                RedisValue::ok()
            }
            "GET" => store
                .get(&key)
                .cloned()
                .map_or(RedisValue::Null, RedisValue::BulkString),
            "DEL" => RedisValue::integer(i64::from(store.remove(&key).is_some())),
            "DBSIZE" => RedisValue::integer(store.len() as i64),
            _ => RedisValue::error("ERR", format!("unknown command '{}'", command.name)),
        };
        Reply::Value(value)
    }
}

/// Turn a request array into a command. Clients only send bulk strings.
pub fn parse_request(items: Vec<RedisValue>) -> Option<Command> {
    let mut items = items.into_iter();
    let name = match items.next()? {
        RedisValue::BulkString(b) => String::from_utf8(b.to_vec()).ok()?,
        _ => return None,
    };
    let mut command = Command::new(name);
    for item in items {
        match item {
            RedisValue::BulkString(b) => command.args.push(b),
            _ => return None,
        }
    }
    Some(command)
}

/// Argument `index` as text, empty when missing.
pub fn arg(command: &Command, index: usize) -> &str {
    command
        .args
        .get(index)
        .and_then(|b| std::str::from_utf8(b).ok())
        .unwrap_or_default()
}

/// Server-side reply encoding. Under RESP2 maps flatten to arrays and
/// nulls use the null bulk string.
pub fn encode_reply(value: &RedisValue, version: ProtocolVersion, out: &mut Vec<u8>) {
    let resp3 = version == ProtocolVersion::Resp3;
    match value {
        RedisValue::SimpleString(s) => line(out, b'+', s.as_bytes()),
        RedisValue::Error(e) | RedisValue::BulkError(e) => line(out, b'-', e.to_string().as_bytes()),
        RedisValue::Integer(n) => line(out, b':', n.to_string().as_bytes()),
        RedisValue::BulkString(data) | RedisValue::VerbatimString { data, .. } => bulk(out, data),
        RedisValue::Null if resp3 => out.extend_from_slice(b"_\r\n"),
        RedisValue::Null => out.extend_from_slice(b"$-1\r\n"),
        RedisValue::Boolean(b) if resp3 => line(out, b'#', if *b { b"t" } else { b"f" }),
        RedisValue::Boolean(b) => line(out, b':', if *b { b"1" } else { b"0" }),
        RedisValue::Double(d) if resp3 => line(out, b',', d.to_string().as_bytes()),
        RedisValue::Double(d) => bulk(out, d.to_string().as_bytes()),
        RedisValue::BigNumber(s) => bulk(out, s.as_bytes()),
        RedisValue::Array(items) | RedisValue::Set(items) | RedisValue::Push(items) => {
            line(out, b'*', items.len().to_string().as_bytes());
            for item in items {
                encode_reply(item, version, out);
            }
        }
        RedisValue::Map(pairs) => {
            if resp3 {
                line(out, b'%', pairs.len().to_string().as_bytes());
            } else {
                line(out, b'*', (pairs.len() * 2).to_string().as_bytes());
            }
            for (key, value) in pairs {
                encode_reply(key, version, out);
                encode_reply(value, version, out);
            }
        }
    }
}

fn line(out: &mut Vec<u8>, prefix: u8, body: &[u8]) {
    out.push(prefix);
    out.extend_from_slice(body);
    out.extend_from_slice(b"\r\n");
}

fn bulk(out: &mut Vec<u8>, data: &[u8]) {
    line(out, b'$', data.len().to_string().as_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}
