//! Pipelined RESP connection.
//!
//! One tokio task owns the socket. Callers hand it commands over a channel;
//! the task writes them in batches and matches replies to commands in FIFO
//! order. Commands whose caller has already stopped waiting are dropped
//! before they are written.

use super::pipeline::{InFlight, PipelineConfig, PipelineMetrics};
use super::AsyncCommands;
use crate::core::config::Config;
use crate::core::error::{BridgeError, BridgeResult};
use crate::core::timeout::TimeoutPolicy;
use crate::pending::{reply_pair, PendingReply, ReplyCompleter};
use crate::protocol::{Command, Frame, ProtocolVersion, RedisValue, RespCodec};
use bytes::BytesMut;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Everything needed to open one connection.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// `host:port` to connect to.
    pub address: String,
    /// ACL user name.
    pub username: Option<String>,
    /// Password for AUTH.
    pub password: Option<String>,
    /// Database selected after connecting.
    pub database: u32,
    /// Reply protocol negotiated with HELLO.
    pub protocol: ProtocolVersion,
    /// Connect and handshake timeout.
    pub connect_timeout: Duration,
    /// Name announced with CLIENT SETNAME.
    pub client_name: Option<String>,
    /// Wait budgets for this connection.
    pub timeouts: TimeoutPolicy,
    /// Write batching.
    pub pipeline: PipelineConfig,
}

impl ConnectionOptions {
    /// Options for `address` with defaults everywhere else.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            username: None,
            password: None,
            database: 0,
            protocol: ProtocolVersion::Resp2,
            connect_timeout: Duration::from_secs(5),
            client_name: None,
            timeouts: TimeoutPolicy::new(),
            pipeline: PipelineConfig::default(),
        }
    }

    /// Options for the server named in the configuration.
    pub fn from_config(config: &Config) -> Self {
        let conn = &config.connection;
        Self {
            address: conn.address(),
            username: conn.username.clone(),
            password: conn.password.clone(),
            database: conn.database,
            protocol: ProtocolVersion::from_number(conn.protocol).unwrap_or_default(),
            connect_timeout: conn.connect_timeout(),
            client_name: conn.client_name.clone(),
            timeouts: config.timeouts.to_policy(),
            pipeline: PipelineConfig::default(),
        }
    }

    /// Same settings, different server.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Replace the timeout policy.
    pub fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Select the reply protocol.
    pub fn with_protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = protocol;
        self
    }
}

/// Connection statistics.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Replies matched to commands.
    pub replies_received: AtomicU64,
    /// RESP3 push frames skipped.
    pub pushes_ignored: AtomicU64,
    /// Bytes received.
    pub bytes_received: AtomicU64,
    /// Bytes sent.
    pub bytes_sent: AtomicU64,
    /// Write batching.
    pub pipeline: PipelineMetrics,
}

impl ConnectionStats {
    fn record_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn record_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }
}

struct Request {
    command: Command,
    completer: ReplyCompleter,
}

/// A pipelined connection to one server.
pub struct RespConnection {
    address: String,
    requests: mpsc::UnboundedSender<Request>,
    open: Arc<AtomicBool>,
    timeouts: TimeoutPolicy,
    stats: Arc<ConnectionStats>,
}

impl RespConnection {
    /// Connect from a thread outside the runtime.
    ///
    /// `handle` must belong to a multi-thread runtime: its workers drive the
    /// connection while the calling thread blocks.
    pub fn connect(handle: &Handle, options: ConnectionOptions) -> BridgeResult<Self> {
        handle.block_on(Self::connect_async(options))
    }

    /// Connect from inside the runtime.
    pub async fn connect_async(options: ConnectionOptions) -> BridgeResult<Self> {
        let address = options.address.clone();
        let stream = tokio::time::timeout(options.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| BridgeError::connection(format!("connect to {} timed out", address)))?
            .map_err(|e| BridgeError::connection(format!("connect to {}: {}", address, e)))?;
        let _ = stream.set_nodelay(true);

        let stats = Arc::new(ConnectionStats::default());
        let mut io = Io {
            stream,
            codec: RespCodec::new(ProtocolVersion::Resp2),
            read_buf: BytesMut::with_capacity(READ_BUFFER_SIZE),
            write_buf: BytesMut::with_capacity(READ_BUFFER_SIZE),
            stats: Arc::clone(&stats),
        };

        tokio::time::timeout(options.connect_timeout, io.handshake(&options))
            .await
            .map_err(|_| BridgeError::connection(format!("handshake with {} timed out", address)))??;

        let (tx, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));
        tokio::spawn(run_io(
            io,
            rx,
            Arc::clone(&open),
            options.pipeline.max_batch.max(1),
            address.clone(),
        ));

        tracing::info!(addr = %address, protocol = %options.protocol, "connected");

        Ok(Self {
            address,
            requests: tx,
            open,
            timeouts: options.timeouts,
            stats,
        })
    }

    /// Server address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Traffic counters.
    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }
}

impl AsyncCommands for RespConnection {
    fn dispatch(&self, command: Command) -> PendingReply<RedisValue> {
        let (completer, pending) = reply_pair(&command);
        if let Err(mpsc::error::SendError(request)) =
            self.requests.send(Request { command, completer })
        {
            request
                .completer
                .fail(BridgeError::connection(format!("connection to {} is closed", self.address)));
        }
        pending
    }

    fn timeout_policy(&self) -> &TimeoutPolicy {
        &self.timeouts
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.requests.is_closed()
    }
}

impl std::fmt::Debug for RespConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RespConnection")
            .field("address", &self.address)
            .field("open", &self.is_open())
            .finish()
    }
}

struct Io {
    stream: TcpStream,
    codec: RespCodec,
    read_buf: BytesMut,
    write_buf: BytesMut,
    stats: Arc<ConnectionStats>,
}

impl Io {
    async fn handshake(&mut self, options: &ConnectionOptions) -> BridgeResult<()> {
        if options.protocol == ProtocolVersion::Resp3 {
            let mut hello = Command::new("HELLO").arg("3");
            if let Some(ref password) = options.password {
                let user = options.username.as_deref().unwrap_or("default");
                hello = hello.arg("AUTH").arg(user).arg(password);
            }
            if let Some(ref name) = options.client_name {
                hello = hello.arg("SETNAME").arg(name);
            }
            self.codec.set_version(ProtocolVersion::Resp3);
            self.call(&hello).await?;
        } else {
            if let Some(ref password) = options.password {
                let mut auth = Command::new("AUTH");
                if let Some(ref user) = options.username {
                    auth = auth.arg(user);
                }
                self.call(&auth.arg(password)).await?;
            }
            if let Some(ref name) = options.client_name {
                self.call(&Command::new("CLIENT").arg("SETNAME").arg(name))
                    .await?;
            }
        }

        if options.database != 0 {
            self.call(&Command::new("SELECT").arg(options.database))
                .await?;
        }
        Ok(())
    }

    /// Request/response round trip, used before the pipeline starts.
    async fn call(&mut self, command: &Command) -> BridgeResult<RedisValue> {
        self.codec.encode(command, &mut self.write_buf);
        self.flush().await?;
        loop {
            while let Some(frame) = self.codec.decode(&mut self.read_buf)? {
                if let Frame::Reply(value) = frame {
                    return value.into_result().map_err(BridgeError::Remote);
                }
            }
            if self.read_more().await? == 0 {
                return Err(BridgeError::connection("server closed connection"));
            }
        }
    }

    async fn read_more(&mut self) -> BridgeResult<usize> {
        let n = self
            .stream
            .read_buf(&mut self.read_buf)
            .await
            .map_err(|e| BridgeError::connection(format!("read error: {}", e)))?;
        self.stats.record_received(n);
        Ok(n)
    }

    async fn flush(&mut self) -> BridgeResult<()> {
        if self.write_buf.is_empty() {
            return Ok(());
        }
        self.stream
            .write_all(&self.write_buf)
            .await
            .map_err(|e| BridgeError::connection(format!("write error: {}", e)))?;
        self.stats.record_sent(self.write_buf.len());
        self.write_buf.clear();
        Ok(())
    }

    /// Encode a request unless its caller already gave up.
    fn queue(&mut self, request: Request, in_flight: &mut InFlight) -> bool {
        if request.completer.is_cancelled() {
            self.stats.pipeline.record_skipped();
            return false;
        }
        self.codec.encode(&request.command, &mut self.write_buf);
        in_flight.push(request.completer);
        true
    }

    fn deliver(&mut self, in_flight: &mut InFlight) -> BridgeResult<()> {
        while let Some(frame) = self.codec.decode(&mut self.read_buf)? {
            match frame {
                Frame::Reply(value) => {
                    if in_flight.complete_next(value).is_err() {
                        return Err(BridgeError::protocol("reply without a pending command"));
                    }
                    self.stats.replies_received.fetch_add(1, Ordering::Relaxed);
                }
                Frame::Push(items) => {
                    tracing::trace!(len = items.len(), "ignoring push frame");
                    self.stats.pushes_ignored.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        Ok(())
    }
}

async fn run_io(
    mut io: Io,
    mut requests: mpsc::UnboundedReceiver<Request>,
    open: Arc<AtomicBool>,
    max_batch: usize,
    address: String,
) {
    let mut in_flight = InFlight::new();
    let mut accepting = true;

    let error = loop {
        if !accepting && in_flight.is_empty() {
            break None;
        }

        tokio::select! {
            request = requests.recv(), if accepting => match request {
                Some(request) => {
                    let mut written = usize::from(io.queue(request, &mut in_flight));
                    while written < max_batch {
                        match requests.try_recv() {
                            Ok(request) => written += usize::from(io.queue(request, &mut in_flight)),
                            Err(_) => break,
                        }
                    }
                    if written > 0 {
                        io.stats.pipeline.record_batch(written);
                    }
                    if let Err(e) = io.flush().await {
                        break Some(e);
                    }
                }
                // Every handle is gone; finish outstanding replies, then stop.
                None => accepting = false,
            },
            read = io.read_more() => match read {
                Ok(0) => break Some(BridgeError::connection("server closed connection")),
                Ok(_) => {
                    if let Err(e) = io.deliver(&mut in_flight) {
                        break Some(e);
                    }
                }
                Err(e) => break Some(e),
            },
        }
    };

    open.store(false, Ordering::Release);
    requests.close();

    match error {
        Some(error) => {
            tracing::warn!(addr = %address, error = %error, in_flight = in_flight.len(), "connection lost");
            in_flight.fail_all(&error);
            while let Ok(request) = requests.try_recv() {
                request.completer.fail(error.clone());
            }
        }
        None => tracing::debug!(addr = %address, "connection closed"),
    }
    tracing::debug!(
        addr = %address,
        batches = io.stats.pipeline.batches_total.load(Ordering::Relaxed),
        avg_batch = io.stats.pipeline.average_batch(),
        skipped = io.stats.pipeline.skipped_total.load(Ordering::Relaxed),
        "pipeline summary"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;

    #[test]
    fn test_options_from_config() {
        let config = Config::from_toml(
            r#"
[connection]
host = "cache.internal"
port = 7000
password = "pw"
protocol = 3
client_name = "tether"

[timeouts]
command_timeout_ms = 2000
"#,
        )
        .unwrap();

        let options = ConnectionOptions::from_config(&config);
        assert_eq!(options.address, "cache.internal:7000");
        assert_eq!(options.protocol, ProtocolVersion::Resp3);
        assert_eq!(options.password.as_deref(), Some("pw"));
        assert_eq!(
            options.timeouts.command_timeout(),
            Some(Duration::from_secs(2))
        );

        let moved = options.with_address("10.0.0.2:7001");
        assert_eq!(moved.address, "10.0.0.2:7001");
        assert_eq!(moved.client_name.as_deref(), Some("tether"));
    }

    #[test]
    fn test_connect_refused() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = RespConnection::connect(runtime.handle(), ConnectionOptions::new(address))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Connection { .. }));
    }
}
