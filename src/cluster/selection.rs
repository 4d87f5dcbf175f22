//! Node selection.

use super::topology::{ClusterNode, NodeId};
use std::fmt;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&ClusterNode) -> bool + Send + Sync>;

/// Which nodes a fan-out call targets.
#[derive(Clone)]
pub enum NodeSelection {
    /// Every known node.
    All,
    /// Primaries only.
    Primaries,
    /// Replicas only.
    Replicas,
    /// The listed nodes. Ids not in the topology are ignored.
    Nodes(Vec<NodeId>),
    /// Nodes accepted by a predicate.
    Matching(Predicate),
}

impl NodeSelection {
    /// Select the listed node ids.
    pub fn nodes<I, N>(ids: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        Self::Nodes(ids.into_iter().map(Into::into).collect())
    }

    /// Select nodes with a predicate.
    pub fn matching(predicate: impl Fn(&ClusterNode) -> bool + Send + Sync + 'static) -> Self {
        Self::Matching(Arc::new(predicate))
    }

    /// Check if `node` is selected.
    pub fn matches(&self, node: &ClusterNode) -> bool {
        match self {
            Self::All => true,
            Self::Primaries => node.is_primary(),
            Self::Replicas => node.is_replica(),
            Self::Nodes(ids) => ids.contains(&node.id),
            Self::Matching(predicate) => predicate(node),
        }
    }
}

impl fmt::Debug for NodeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Primaries => f.write_str("Primaries"),
            Self::Replicas => f.write_str("Replicas"),
            Self::Nodes(ids) => f.debug_tuple("Nodes").field(ids).finish(),
            Self::Matching(_) => f.write_str("Matching(..)"),
        }
    }
}
