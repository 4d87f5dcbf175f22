//! Tether - unified CLI entrypoint.
//!
//! Usage:
//!   tether exec GET greeting
//!   tether exec --timeout-ms 30000 BLPOP jobs 0
//!   tether cluster nodes --config tether.toml
//!   tether cluster exec --role primaries DBSIZE
//!   tether config validate --config tether.toml
//!   tether digest "return redis.call('GET', KEYS[1])"

use anyhow::Result;
use clap::Parser;
use tether::cli::commands::{run_cluster, run_config, run_digest, run_exec};
use tether::cli::{Cli, Commands};

// Blocking calls park this thread, so the I/O runtime is built per
// command instead of with #[tokio::main].
fn main() -> Result<()> {
    let cli = Cli::parse();
    let global = cli.global_options();

    match cli.command {
        Commands::Exec(args) => run_exec(&global, args),
        Commands::Cluster(args) => run_cluster(&global, args),
        Commands::Config(args) => run_config(&global, args),
        Commands::Digest(args) => run_digest(args),
    }
}
