//! Configuration parsing and validation.
//!
//! Configuration is loaded from TOML files with CLI overrides. Every
//! section is optional; an empty file describes a single local server on
//! the default port using RESP2.

use super::timeout::TimeoutPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

const REDACTED: &str = "********";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// How to reach and authenticate with a server.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Wait budgets for blocking calls.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Cluster discovery.
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Connection settings shared by every node connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server host name or address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// ACL user name. Requires `password`.
    #[serde(default)]
    pub username: Option<String>,

    /// Password for AUTH.
    #[serde(default)]
    pub password: Option<String>,

    /// Logical database selected after connecting.
    #[serde(default)]
    pub database: u32,

    /// RESP protocol version: 2 or 3.
    #[serde(default = "default_protocol")]
    pub protocol: u8,

    /// TCP connect and handshake timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Name announced with CLIENT SETNAME.
    #[serde(default)]
    pub client_name: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            database: 0,
            protocol: default_protocol(),
            connect_timeout_ms: default_connect_timeout_ms(),
            client_name: None,
        }
    }
}

impl ConnectionConfig {
    /// `host:port` address of the configured server.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Wait budgets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Connection-wide command timeout in milliseconds.
    #[serde(default)]
    pub command_timeout_ms: Option<u64>,

    /// Per-command-name timeouts in milliseconds.
    #[serde(default)]
    pub commands: BTreeMap<String, u64>,
}

impl TimeoutsConfig {
    /// Build the policy handed to each connection.
    pub fn to_policy(&self) -> TimeoutPolicy {
        let mut policy = TimeoutPolicy::new();
        if let Some(ms) = self.command_timeout_ms {
            policy = policy.with_command_timeout(Duration::from_millis(ms));
        }
        for (name, ms) in &self.commands {
            policy = policy.with_timeout_for(name, Duration::from_millis(*ms));
        }
        policy
    }
}

/// Cluster discovery configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Discover the topology with CLUSTER NODES.
    #[serde(default)]
    pub enabled: bool,

    /// Seed addresses (`host:port`) tried in order. Falls back to the
    /// connection address when empty.
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_protocol() -> u8 {
    2
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).with_context(|| "failed to serialize config")
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.connection.password.is_some() {
            config.connection.password = Some(REDACTED.to_string());
        }
        config
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
        if let Some(ref host) = overrides.host {
            self.connection.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.connection.port = port;
        }
        if let Some(ms) = overrides.command_timeout_ms {
            self.timeouts.command_timeout_ms = Some(ms);
        }
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.validate_connection()?;
        self.validate_timeouts()?;
        self.validate_cluster()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_connection(&self) -> Result<()> {
        let conn = &self.connection;
        if conn.host.is_empty() {
            anyhow::bail!("connection.host must not be empty");
        }
        if conn.port == 0 {
            anyhow::bail!("connection.port must be > 0");
        }
        if conn.protocol != 2 && conn.protocol != 3 {
            anyhow::bail!("connection.protocol must be 2 or 3, got: {}", conn.protocol);
        }
        if conn.connect_timeout_ms == 0 {
            anyhow::bail!("connection.connect_timeout_ms must be > 0");
        }
        if conn.username.is_some() && conn.password.is_none() {
            anyhow::bail!("connection.password required when username is set");
        }
        Ok(())
    }

    fn validate_timeouts(&self) -> Result<()> {
        if self.timeouts.command_timeout_ms == Some(0) {
            anyhow::bail!("timeouts.command_timeout_ms must be > 0");
        }
        for (name, ms) in &self.timeouts.commands {
            if name.trim().is_empty() {
                anyhow::bail!("timeouts.commands contains an empty command name");
            }
            if *ms == 0 {
                anyhow::bail!("timeouts.commands.{} must be > 0", name);
            }
        }
        Ok(())
    }

    fn validate_cluster(&self) -> Result<()> {
        for seed in &self.cluster.seeds {
            let valid = seed
                .rsplit_once(':')
                .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
                .unwrap_or(false);
            if !valid {
                anyhow::bail!("cluster.seeds entries must be host:port, got: {}", seed);
            }
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }
}

/// CLI override options that can be applied to configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level.
    pub log_level: Option<String>,
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override connection-wide command timeout.
    pub command_timeout_ms: Option<u64>,
}
