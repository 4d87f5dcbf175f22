//! Fan-out over cluster nodes.
//!
//! A [`ClusterClient`] holds one async client per node. Selecting nodes
//! yields a [`SelectedNodes`], on which every command method sends the
//! command to each selected node back-to-back and returns an
//! [`Executions`] without waiting.
//!
//! - [`topology`] - Node identity, roles, CLUSTER NODES parsing
//! - [`selection`] - Which nodes a call targets
//! - [`executions`] - Lazily gathered per-node results

pub mod executions;
pub mod selection;
pub mod topology;

pub use executions::Executions;
pub use selection::NodeSelection;
pub use topology::{parse_cluster_nodes, ClusterNode, NodeId, NodeRole, SlotRange};

use crate::client::{AsyncCommands, ConnectionOptions, RespConnection};
use crate::commands::CommandSet;
use crate::core::config::Config;
use crate::core::error::{BridgeError, BridgeResult};
use crate::core::timeout::resolve_timeout;
use crate::ops::stats::WaitStats;
use crate::protocol::{Command, FromRedisValue, RedisValue};
use crate::sync::wait_recorded;
use std::sync::Arc;
use tokio::runtime::Handle;

struct Member {
    node: ClusterNode,
    client: Arc<dyn AsyncCommands>,
}

/// Async clients for every node of a cluster.
pub struct ClusterClient {
    members: Vec<Member>,
    stats: Arc<WaitStats>,
}

impl ClusterClient {
    /// Build from known nodes and their clients.
    pub fn new(nodes: Vec<(ClusterNode, Arc<dyn AsyncCommands>)>) -> Self {
        let members = nodes
            .into_iter()
            .map(|(node, client)| Member { node, client })
            .collect();
        Self {
            members,
            stats: Arc::new(WaitStats::new()),
        }
    }

    /// Record wait outcomes into shared statistics.
    pub fn with_stats(mut self, stats: Arc<WaitStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Discover the topology from the configured seeds and connect to
    /// every node.
    ///
    /// Seeds are tried in order; the first that answers `CLUSTER NODES`
    /// wins. Must be called from outside the runtime behind `handle`.
    pub fn discover(handle: &Handle, config: &Config) -> BridgeResult<Self> {
        let seeds = if config.cluster.seeds.is_empty() {
            vec![config.connection.address()]
        } else {
            config.cluster.seeds.clone()
        };
        let options = ConnectionOptions::from_config(config);
        let stats = Arc::new(WaitStats::new());

        let mut last_error = BridgeError::connection("no cluster seeds configured");
        for seed in seeds {
            match discover_from(handle, &options, &seed, &stats) {
                Ok(members) => {
                    tracing::info!(seed = %seed, nodes = members.len(), "cluster topology discovered");
                    return Ok(Self { members, stats });
                }
                Err(e) => {
                    tracing::warn!(seed = %seed, error = %e, "cluster seed failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// Known nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &ClusterNode> {
        self.members.iter().map(|m| &m.node)
    }

    /// Look up a node.
    pub fn node(&self, id: &NodeId) -> Option<&ClusterNode> {
        self.nodes().find(|n| &n.id == id)
    }

    /// Wait statistics.
    pub fn stats(&self) -> &Arc<WaitStats> {
        &self.stats
    }

    /// Select the nodes a call targets.
    pub fn select(&self, selection: NodeSelection) -> SelectedNodes<'_> {
        if let NodeSelection::Nodes(ids) = &selection {
            for id in ids.iter().filter(|id| self.node(id).is_none()) {
                tracing::warn!(node = %id, "selected node is not in the topology");
            }
        }
        let members = self
            .members
            .iter()
            .filter(|m| selection.matches(&m.node))
            .collect();
        SelectedNodes {
            members,
            stats: &self.stats,
        }
    }

    /// Every node.
    pub fn all(&self) -> SelectedNodes<'_> {
        self.select(NodeSelection::All)
    }

    /// Primaries only.
    pub fn primaries(&self) -> SelectedNodes<'_> {
        self.select(NodeSelection::Primaries)
    }

    /// Replicas only.
    pub fn replicas(&self) -> SelectedNodes<'_> {
        self.select(NodeSelection::Replicas)
    }
}

fn discover_from(
    handle: &Handle,
    options: &ConnectionOptions,
    seed: &str,
    stats: &WaitStats,
) -> BridgeResult<Vec<Member>> {
    let seed_conn = RespConnection::connect(handle, options.clone().with_address(seed))?;
    let command = Command::new("CLUSTER").arg("NODES");
    let timeout = resolve_timeout(&command.name, None, seed_conn.timeout_policy());
    let text: String = wait_recorded(seed_conn.invoke(command), timeout, stats)?;

    let seed_host = seed.rsplit_once(':').map_or(seed, |(host, _)| host);
    let nodes = parse_cluster_nodes(&text, seed_host)?;

    let mut seed_conn = Some(seed_conn);
    let mut members = Vec::with_capacity(nodes.len());
    for node in nodes {
        let address = node.address();
        let client: Arc<dyn AsyncCommands> = match seed_conn.take() {
            Some(conn) if conn.address() == address => Arc::new(conn),
            other => {
                seed_conn = other;
                Arc::new(RespConnection::connect(handle, options.clone().with_address(&address))?)
            }
        };
        tracing::debug!(node = %node.id, addr = %address, role = %node.role, "node connected");
        members.push(Member { node, client });
    }
    Ok(members)
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient")
            .field("nodes", &self.nodes().map(|n| &n.id).collect::<Vec<_>>())
            .finish()
    }
}

/// The nodes a fan-out call targets.
pub struct SelectedNodes<'a> {
    members: Vec<&'a Member>,
    stats: &'a Arc<WaitStats>,
}

impl SelectedNodes<'_> {
    /// Selected node ids.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.members.iter().map(|m| m.node.id.clone()).collect()
    }

    /// Number of selected nodes.
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Check if nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Send any command to every selected node.
    pub fn execute(&self, command: Command) -> Executions<RedisValue> {
        self.invoke(command)
    }
}

impl CommandSet for SelectedNodes<'_> {
    type Output<T: FromRedisValue + Send + 'static> = Executions<T>;

    fn invoke<T: FromRedisValue + Send + 'static>(&self, command: Command) -> Executions<T> {
        // Dispatch everywhere before anyone waits so node I/O overlaps.
        let replies = self
            .members
            .iter()
            .map(|m| {
                let timeout =
                    resolve_timeout(&command.name, command.timeout, m.client.timeout_policy());
                let pending = m.client.dispatch(command.clone()).typed::<T>();
                (m.node.id.clone(), pending, timeout)
            })
            .collect();
        Executions::new(replies, Arc::clone(self.stats))
    }
}
