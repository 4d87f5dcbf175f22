//! Cluster command implementation.

use super::{init_tracing, io_runtime, parse_command, render_value, GlobalOptions};
use crate::cluster::{ClusterClient, NodeSelection};
use crate::core::config::Config;
use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};

/// Cluster operations.
#[derive(Args, Debug)]
pub struct ClusterArgs {
    #[command(subcommand)]
    pub command: ClusterCommand,
}

/// Cluster subcommands.
#[derive(Subcommand, Debug)]
pub enum ClusterCommand {
    /// Show the discovered topology.
    Nodes,
    /// Send one command to every selected node.
    Exec {
        /// Which nodes receive the command.
        #[arg(long, value_enum, default_value = "all")]
        role: RoleFilter,
        /// Wait budget per node in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Command name followed by its arguments.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

/// Node filter for fan-out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RoleFilter {
    All,
    Primaries,
    Replicas,
}

impl From<RoleFilter> for NodeSelection {
    fn from(role: RoleFilter) -> Self {
        match role {
            RoleFilter::All => NodeSelection::All,
            RoleFilter::Primaries => NodeSelection::Primaries,
            RoleFilter::Replicas => NodeSelection::Replicas,
        }
    }
}

/// Run the cluster command.
pub fn run_cluster(global: &GlobalOptions, args: ClusterArgs) -> Result<()> {
    let config = global.load_config()?;
    init_tracing(&config.telemetry.log_level);
    require_cluster(&config)?;

    let runtime = io_runtime()?;
    let cluster = ClusterClient::discover(runtime.handle(), &config)
        .context("failed to discover cluster topology")?;

    match args.command {
        ClusterCommand::Nodes => list_nodes(&cluster),
        ClusterCommand::Exec {
            role,
            timeout_ms,
            command,
        } => fan_out(&cluster, role, timeout_ms, &command),
    }
}

fn require_cluster(config: &Config) -> Result<()> {
    if !config.cluster.enabled {
        anyhow::bail!("cluster mode is disabled; set cluster.enabled = true in the config file");
    }
    Ok(())
}

fn list_nodes(cluster: &ClusterClient) -> Result<()> {
    println!(
        "{:<42} {:<22} {:<8} {:>6}",
        "ID", "Address", "Role", "Slots"
    );
    println!("{}", "-".repeat(81));
    for node in cluster.nodes() {
        println!(
            "{:<42} {:<22} {:<8} {:>6}",
            node.id,
            node.address(),
            node.role,
            node.slot_count()
        );
    }
    Ok(())
}

fn fan_out(
    cluster: &ClusterClient,
    role: RoleFilter,
    timeout_ms: Option<u64>,
    words: &[String],
) -> Result<()> {
    let command = parse_command(words, timeout_ms)?;
    let selected = cluster.select(role.into());
    if selected.is_empty() {
        anyhow::bail!("no {:?} nodes in the cluster", role);
    }

    let order = selected.nodes();
    let mut outcomes = selected.execute(command).into_results();
    let mut failures = 0;
    for node in order {
        let Some(outcome) = outcomes.remove(&node) else {
            continue;
        };
        match outcome {
            Ok(value) => println!("{}: {}", node, render_value(&value)),
            Err(e) => {
                failures += 1;
                println!("{}: (failed) {}", node, e);
            }
        }
    }

    let stats = cluster.stats().snapshot();
    tracing::info!(
        resolved = stats.resolved,
        failed = stats.failed,
        timed_out = stats.timed_out,
        "fan-out finished"
    );
    if failures > 0 {
        anyhow::bail!("{} node(s) failed", failures);
    }
    Ok(())
}
