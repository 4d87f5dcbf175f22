//! CLI command implementations.

mod cluster;
mod config;
mod digest;
mod exec;

pub use cluster::{run_cluster, ClusterArgs};
pub use config::{run_config, ConfigArgs};
pub use digest::{run_digest, DigestArgs};
pub use exec::{run_exec, ExecArgs};

use crate::core::config::{Config, ConfigOverrides};
use crate::protocol::{Command, RedisValue};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Config file read when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG_PATH: &str = "tether.toml";

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

impl GlobalOptions {
    /// Load the configuration, apply overrides and validate the result.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("failed to load config from {:?}", path))?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Config::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Config::default(),
        };
        config.apply_overrides(&self.overrides);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "telemetry")]
pub(crate) fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "telemetry"))]
pub(crate) fn init_tracing(_level: &str) {}

/// Runtime driving connections while the main thread blocks.
pub(crate) fn io_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("tether-io")
        .enable_all()
        .build()
        .context("failed to start I/O runtime")
}

/// Build a command from shell words.
pub(crate) fn parse_command(words: &[String], timeout_ms: Option<u64>) -> Result<Command> {
    let (name, args) = words.split_first().context("no command given")?;
    let mut command = args.iter().fold(Command::new(name.as_str()), |cmd, arg| cmd.arg(arg));
    if let Some(ms) = timeout_ms {
        command = command.with_timeout(std::time::Duration::from_millis(ms));
    }
    Ok(command)
}

/// Render a reply the way redis-cli does.
pub fn render_value(value: &RedisValue) -> String {
    let mut out = String::new();
    render_into(&mut out, value, 0);
    out
}

fn render_into(out: &mut String, value: &RedisValue, indent: usize) {
    match value {
        RedisValue::SimpleString(s) => out.push_str(s),
        RedisValue::Error(e) | RedisValue::BulkError(e) => {
            let _ = write!(out, "(error) {}", e);
        }
        RedisValue::Integer(n) => {
            let _ = write!(out, "(integer) {}", n);
        }
        RedisValue::BulkString(b) => {
            let _ = write!(out, "\"{}\"", String::from_utf8_lossy(b).escape_debug());
        }
        RedisValue::VerbatimString { data, .. } => out.push_str(&String::from_utf8_lossy(data)),
        RedisValue::Null => out.push_str("(nil)"),
        RedisValue::Boolean(b) => {
            let _ = write!(out, "({})", b);
        }
        RedisValue::Double(d) => {
            let _ = write!(out, "(double) {}", d);
        }
        RedisValue::BigNumber(n) => {
            let _ = write!(out, "(big number) {}", n);
        }
        RedisValue::Array(items) | RedisValue::Set(items) | RedisValue::Push(items) => {
            if items.is_empty() {
                out.push_str("(empty array)");
            }
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                    out.push_str(&" ".repeat(indent));
                }
                let _ = write!(out, "{}) ", i + 1);
                render_into(out, item, indent + 3);
            }
        }
        RedisValue::Map(pairs) => {
            if pairs.is_empty() {
                out.push_str("(empty hash)");
            }
            for (i, (key, val)) in pairs.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                    out.push_str(&" ".repeat(indent));
                }
                let _ = write!(out, "{}# ", i + 1);
                render_into(out, key, indent + 3);
                out.push_str(" => ");
                render_into(out, val, indent + 3);
            }
        }
    }
}
