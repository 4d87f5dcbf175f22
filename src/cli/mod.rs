//! Command-line interface.
//!
//! Blocking Redis calls from the shell, on one server or fanned out over a
//! cluster.

pub mod commands;

use crate::core::config::ConfigOverrides;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tether - blocking Redis commands over a pipelined async client.
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Server host, overriding the config file.
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Server port, overriding the config file.
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Connection-wide command timeout in milliseconds.
    #[arg(long, global = true)]
    pub command_timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one command against one server and wait for the reply.
    Exec(commands::ExecArgs),
    /// Cluster operations.
    Cluster(commands::ClusterArgs),
    /// Configuration operations.
    Config(commands::ConfigArgs),
    /// Print the EVALSHA digest of a script.
    Digest(commands::DigestArgs),
}

impl Cli {
    /// Global options shared by every subcommand.
    pub fn global_options(&self) -> commands::GlobalOptions {
        commands::GlobalOptions {
            config: self.config.as_ref().map(PathBuf::from),
            overrides: ConfigOverrides {
                log_level: self.log_level.clone(),
                host: self.host.clone(),
                port: self.port,
                command_timeout_ms: self.command_timeout_ms,
            },
        }
    }
}
