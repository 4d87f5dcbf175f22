//! Exec command implementation.

use super::{init_tracing, io_runtime, parse_command, render_value, GlobalOptions};
use crate::client::{ConnectionOptions, RespConnection};
use crate::sync::SyncCommands;
use anyhow::{Context, Result};
use clap::Args;

/// Run one command and wait for its reply.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Wait budget for this call in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Command name followed by its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Run the exec command.
pub fn run_exec(global: &GlobalOptions, args: ExecArgs) -> Result<()> {
    let config = global.load_config()?;
    init_tracing(&config.telemetry.log_level);

    let command = parse_command(&args.command, args.timeout_ms)?;
    let runtime = io_runtime()?;
    let options = ConnectionOptions::from_config(&config);
    let address = options.address.clone();

    let connection = RespConnection::connect(runtime.handle(), options)
        .with_context(|| format!("failed to connect to {}", address))?;
    let redis = SyncCommands::new(connection);

    tracing::debug!(command = %command, timeout_ms = redis.timeout_for(&command).as_millis() as u64, "executing");
    let reply = redis.execute(command)?;
    println!("{}", render_value(&reply));
    Ok(())
}
