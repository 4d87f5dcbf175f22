//! Cluster topology.
//!
//! Nodes are identified by the cluster's node id. Topology comes either
//! from the caller or from a `CLUSTER NODES` reply:
//!
//! ```text
//! <id> <ip:port@cport[,hostname]> <flags> <primary> <ping> <pong> <epoch> <link> <slot> ...
//! ```

use crate::core::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque node identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Role of a node in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Serves writes for its slots.
    Primary,
    /// Replicates a primary.
    Replica,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Replica => f.write_str("replica"),
        }
    }
}

/// Inclusive range of hash slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
}

impl SlotRange {
    /// Number of slots in the range.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        usize::from(self.end - self.start) + 1
    }

    /// Check if the range is empty. Never true for a parsed range.
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Check if `slot` falls in the range.
    pub fn contains(&self, slot: u16) -> bool {
        (self.start..=self.end).contains(&slot)
    }
}

impl fmt::Display for SlotRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// One node of the cluster. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    pub id: NodeId,
    pub host: String,
    pub port: u16,
    pub role: NodeRole,
    /// Primary this node replicates, for replicas.
    #[serde(default)]
    pub primary: Option<NodeId>,
    #[serde(default)]
    pub slots: Vec<SlotRange>,
}

impl ClusterNode {
    /// A primary with no slots.
    pub fn primary(id: impl Into<NodeId>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            role: NodeRole::Primary,
            primary: None,
            slots: Vec::new(),
        }
    }

    /// A replica of `primary`.
    pub fn replica(
        id: impl Into<NodeId>,
        host: impl Into<String>,
        port: u16,
        primary: impl Into<NodeId>,
    ) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            role: NodeRole::Replica,
            primary: Some(primary.into()),
            slots: Vec::new(),
        }
    }

    /// Attach slot ranges.
    pub fn with_slots(mut self, slots: Vec<SlotRange>) -> Self {
        self.slots = slots;
        self
    }

    /// `host:port` address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if the node is a primary.
    pub fn is_primary(&self) -> bool {
        self.role == NodeRole::Primary
    }

    /// Check if the node is a replica.
    pub fn is_replica(&self) -> bool {
        self.role == NodeRole::Replica
    }

    /// Number of slots served.
    pub fn slot_count(&self) -> usize {
        self.slots.iter().map(SlotRange::len).sum()
    }
}

/// Parse a `CLUSTER NODES` reply.
///
/// Nodes flagged `fail`, `noaddr` or `handshake` are skipped. A node that
/// reports an empty host (a lone node describing itself) gets
/// `default_host`.
pub fn parse_cluster_nodes(text: &str, default_host: &str) -> BridgeResult<Vec<ClusterNode>> {
    let mut nodes = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 8 {
            return Err(malformed(line, "too few fields"));
        }

        let flags: Vec<&str> = fields[2].split(',').collect();
        if flags
            .iter()
            .any(|f| matches!(*f, "fail" | "noaddr" | "handshake"))
        {
            continue;
        }

        let (host, port) = parse_address(fields[1]).ok_or_else(|| malformed(line, "bad address"))?;
        let host = if host.is_empty() {
            default_host.to_string()
        } else {
            host.to_string()
        };

        let role = if flags.contains(&"master") {
            NodeRole::Primary
        } else if flags.contains(&"slave") || flags.contains(&"replica") {
            NodeRole::Replica
        } else {
            return Err(malformed(line, "no role flag"));
        };

        let primary = match fields[3] {
            "-" => None,
            id => Some(NodeId::new(id)),
        };

        let mut slots = Vec::new();
        for spec in &fields[8..] {
            // Slots being migrated or imported look like [slot->-node].
            if spec.starts_with('[') {
                continue;
            }
            slots.push(parse_slots(spec).ok_or_else(|| malformed(line, "bad slot range"))?);
        }

        nodes.push(ClusterNode {
            id: NodeId::new(fields[0]),
            host,
            port,
            role,
            primary,
            slots,
        });
    }

    Ok(nodes)
}

fn parse_address(field: &str) -> Option<(&str, u16)> {
    let addr = field.split(',').next()?;
    let addr = addr.split('@').next()?;
    let (host, port) = addr.rsplit_once(':')?;
    Some((host, port.parse().ok()?))
}

fn parse_slots(spec: &str) -> Option<SlotRange> {
    let (start, end) = match spec.split_once('-') {
        Some((start, end)) => (start.parse().ok()?, end.parse().ok()?),
        None => {
            let slot = spec.parse().ok()?;
            (slot, slot)
        }
    };
    if end < start {
        return None;
    }
    Some(SlotRange { start, end })
}

fn malformed(line: &str, reason: &str) -> BridgeError {
    BridgeError::protocol(format!("malformed CLUSTER NODES line ({}): {}", reason, line))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODES: &str = "\
07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:30004@31004,node-4 slave e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 0 1426238317239 4 connected
67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 127.0.0.1:30002@31002 master - 0 1426238316232 2 connected 5461-10922
292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 127.0.0.1:30003@31003 master - 0 1426238318243 3 connected 10923-16383
6ec23923021cf3ffec47632106199cb7f496ce01 127.0.0.1:30005@31005 slave,fail 67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 0 1426238316232 5 connected
e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 127.0.0.1:30001@31001 myself,master - 0 0 1 connected 0-5460 [5461->-67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1]
";

    #[test]
    fn test_parse_cluster_nodes() {
        let nodes = parse_cluster_nodes(NODES, "127.0.0.1").unwrap();
        assert_eq!(nodes.len(), 4);

        let replica = &nodes[0];
        assert_eq!(replica.role, NodeRole::Replica);
        assert_eq!(replica.port, 30004);
        assert_eq!(
            replica.primary,
            Some(NodeId::new("e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca"))
        );

        let myself = &nodes[3];
        assert!(myself.is_primary());
        assert_eq!(myself.slots, vec![SlotRange { start: 0, end: 5460 }]);
        assert_eq!(myself.slot_count(), 5461);
        assert_eq!(myself.address(), "127.0.0.1:30001");
    }

    #[test]
    fn test_empty_host_uses_default() {
        let text = "abc :6379@16379 myself,master - 0 0 0 connected 0-16383\n";
        let nodes = parse_cluster_nodes(text, "redis.local").unwrap();
        assert_eq!(nodes[0].host, "redis.local");
        assert!(nodes[0].slots[0].contains(16383));
    }

    #[test]
    fn test_malformed_line() {
        assert!(parse_cluster_nodes("abc 127.0.0.1:1 master", "h").is_err());
        assert!(parse_cluster_nodes("abc nope master - 0 0 0 connected", "h").is_err());
        assert!(parse_cluster_nodes("abc h:1@2 master - 0 0 0 connected 9-3", "h").is_err());
    }

    #[test]
    fn test_single_slot_display() {
        let range = parse_slots("42").unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range.to_string(), "42");
        assert_eq!(SlotRange { start: 0, end: 5 }.to_string(), "0-5");
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let range = SlotRange { start: 10, end: 3 };
        assert!(range.is_empty());
        assert_eq!(range.len(), 0);
        assert!(!range.contains(5));
        assert_eq!(SlotRange { start: 7, end: 7 }.len(), 1);
    }
}
