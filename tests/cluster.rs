//! Cluster discovery and fan-out tests.

mod common;

use common::{config_file, test_runtime, FakeServer, Reply};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tether::client::{AsyncCommands, MockClient, MockReply};
use tether::cluster::{ClusterClient, ClusterNode, NodeId, NodeRole, NodeSelection};
use tether::commands::RedisCommands;
use tether::core::config::Config;
use tether::core::timeout::TimeoutPolicy;
use tether::protocol::{Command, RedisError, RedisValue};
use tokio::runtime::Runtime;

/// Three fake nodes: two primaries and a replica of the first. The first
/// node answers CLUSTER NODES; `dbsize` gives each node's DBSIZE reply.
fn start_cluster(rt: &Runtime, dbsize: [Reply; 3]) -> (Vec<FakeServer>, Config) {
    let topology = Arc::new(Mutex::new(String::new()));
    let servers: Vec<FakeServer> = dbsize
        .into_iter()
        .map(|reply| {
            let topology = Arc::clone(&topology);
            FakeServer::start(rt, move |command: &Command| match command.name.as_str() {
                "CLUSTER" => Reply::Value(RedisValue::bulk_string(topology.lock().as_str())),
                "DBSIZE" => reply.clone(),
                _ => Reply::Value(RedisValue::ok()),
            })
        })
        .collect();

    *topology.lock() = format!(
        "\
node-a {a}@17000 myself,master - 0 0 1 connected 0-8191
node-b {b}@17001 master - 0 0 2 connected 8192-16383
node-c {c}@17002 slave node-a 0 0 1 connected
node-d 127.0.0.1:1@2 master,fail - 0 0 3 disconnected
",
        a = servers[0].addr,
        b = servers[1].addr,
        c = servers[2].addr,
    );

    let config = Config::from_toml(&format!(
        "[cluster]\nenabled = true\nseeds = [\"{}\"]\n",
        servers[0].addr
    ))
    .unwrap();
    (servers, config)
}

fn int(n: i64) -> Reply {
    Reply::Value(RedisValue::integer(n))
}

#[test]
fn discover_topology_from_seed() {
    let rt = test_runtime();
    let (servers, config) = start_cluster(&rt, [int(1), int(2), int(3)]);

    let cluster = ClusterClient::discover(rt.handle(), &config).unwrap();
    let nodes: Vec<_> = cluster.nodes().map(|n| n.id.as_str().to_string()).collect();
    assert_eq!(nodes, vec!["node-a", "node-b", "node-c"]);

    let replica = cluster.node(&NodeId::new("node-c")).unwrap();
    assert_eq!(replica.role, NodeRole::Replica);
    assert_eq!(replica.primary, Some(NodeId::new("node-a")));
    assert_eq!(cluster.node(&NodeId::new("node-a")).unwrap().slot_count(), 8192);

    assert_eq!(servers[0].received_names(), vec!["CLUSTER"]);
    assert_eq!(cluster.stats().snapshot().resolved, 1);
}

#[test]
fn discover_skips_dead_seed() {
    let rt = test_runtime();
    let (servers, _) = start_cluster(&rt, [int(1), int(2), int(3)]);

    let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_addr = dead.local_addr().unwrap().to_string();
    drop(dead);

    let file = config_file(&format!(
        "[cluster]\nenabled = true\nseeds = [\"{}\", \"{}\"]\n",
        dead_addr, servers[1].addr
    ));
    let config = Config::from_file(file.path()).unwrap();

    let cluster = ClusterClient::discover(rt.handle(), &config).unwrap();
    assert_eq!(cluster.all().size(), 3);
}

#[test]
fn fan_out_over_primaries() {
    let rt = test_runtime();
    let (_servers, config) = start_cluster(&rt, [int(10), int(20), int(30)]);
    let cluster = ClusterClient::discover(rt.handle(), &config).unwrap();

    let primaries = cluster.primaries();
    assert_eq!(primaries.nodes(), vec![NodeId::new("node-a"), NodeId::new("node-b")]);

    let results = primaries.dbsize().all_results().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[&NodeId::new("node-a")], 10);
    assert_eq!(results[&NodeId::new("node-b")], 20);
}

#[test]
fn slow_node_does_not_delay_others() {
    let rt = test_runtime();
    let slow = Reply::Delayed(RedisValue::integer(2), Duration::from_millis(500));
    let (_servers, config) = start_cluster(&rt, [int(1), slow, int(3)]);
    let cluster = ClusterClient::discover(rt.handle(), &config).unwrap();

    let executions = cluster.all().dbsize();
    assert_eq!(executions.size(), 3);

    let start = Instant::now();
    assert_eq!(executions.result_for(&NodeId::new("node-a")).unwrap(), 1);
    assert_eq!(executions.result_for(&NodeId::new("node-c")).unwrap(), 3);
    assert!(start.elapsed() < Duration::from_millis(400));

    assert_eq!(executions.result_for(&NodeId::new("node-b")).unwrap(), 2);
    assert!(executions.result_for(&NodeId::new("node-z")).is_err());
}

#[test]
fn partial_failure_is_attributed() {
    let rt = test_runtime();
    let failing = Reply::Value(RedisValue::Error(RedisError::new("LOADING", "dataset in memory")));
    let (_servers, config) = start_cluster(&rt, [int(1), failing, int(3)]);
    let cluster = ClusterClient::discover(rt.handle(), &config).unwrap();

    let executions = cluster.all().dbsize();
    let err = executions.all_results().unwrap_err();
    assert_eq!(err.node(), Some(&NodeId::new("node-b")));
    assert_eq!(err.remote_error().map(|e| e.kind.as_str()), Some("LOADING"));

    let settled = executions.settle();
    assert_eq!(settled.len(), 3);
    assert_eq!(*settled[&NodeId::new("node-a")].as_ref().unwrap(), 1);
    assert!(settled[&NodeId::new("node-b")].is_err());
}

#[test]
fn per_node_timeout_from_each_client() {
    let rt = test_runtime();
    let handle = rt.handle().clone();
    let fast = MockClient::new(handle.clone())
        .with_timeouts(TimeoutPolicy::new().with_command_timeout(Duration::from_millis(100)))
        .on("PING", MockReply::never());
    let patient = MockClient::new(handle)
        .on("PING", MockReply::value(RedisValue::simple_string("PONG")).after(Duration::from_millis(200)));

    let clients: [Arc<dyn AsyncCommands>; 2] = [Arc::new(fast), Arc::new(patient)];
    let nodes = [
        ClusterNode::primary("fast", "10.0.0.1", 7000),
        ClusterNode::primary("patient", "10.0.0.2", 7000),
    ];
    let cluster = ClusterClient::new(nodes.into_iter().zip(clients).collect());

    let settled = cluster.all().ping().settle();
    assert!(settled[&NodeId::new("fast")].as_ref().unwrap_err().is_timeout());
    assert_eq!(settled[&NodeId::new("patient")].as_deref().unwrap(), "PONG");
}

#[test]
fn one_resolves_one_fails_one_hangs() {
    let rt = test_runtime();
    let handle = rt.handle().clone();
    let budget = TimeoutPolicy::new().with_command_timeout(Duration::from_secs(3));
    let node = |reply: MockReply| -> Arc<dyn AsyncCommands> {
        Arc::new(
            MockClient::new(handle.clone())
                .with_timeouts(budget.clone())
                .on("DBSIZE", reply),
        )
    };
    let loading = RedisError::new("LOADING", "dataset in memory");
    let clients = [
        node(MockReply::value(RedisValue::integer(5))),
        node(MockReply::never()),
        node(MockReply::remote(loading).after(Duration::from_millis(100))),
    ];
    let nodes = [
        ClusterNode::primary("a", "10.0.0.1", 7000),
        ClusterNode::primary("c", "10.0.0.3", 7000),
        ClusterNode::primary("b", "10.0.0.2", 7000),
    ];
    let cluster = ClusterClient::new(nodes.into_iter().zip(clients).collect());

    let executions = cluster.all().dbsize();
    assert_eq!(executions.result_for(&NodeId::new("a")).unwrap(), 5);

    let start = Instant::now();
    let err = executions.all_results().unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(err.node(), Some(&NodeId::new("b")));
    assert!(!err.is_timeout());
    assert_eq!(err.remote_error().map(|e| e.kind.as_str()), Some("LOADING"));

    // The hanging node is still undecided and runs out its own budget.
    assert!(!executions.is_ready(&NodeId::new("c")));
    assert!(executions.result_for(&NodeId::new("c")).unwrap_err().is_timeout());
    assert_eq!(executions.result_for(&NodeId::new("a")).unwrap(), 5);
}

#[test]
fn select_by_predicate_and_ids() {
    let rt = test_runtime();
    let handle = rt.handle().clone();
    let clients: [Arc<dyn AsyncCommands>; 3] = [
        Arc::new(MockClient::new(handle.clone()).otherwise(MockReply::ok())),
        Arc::new(MockClient::new(handle.clone()).otherwise(MockReply::ok())),
        Arc::new(MockClient::new(handle).otherwise(MockReply::ok())),
    ];
    let nodes = [
        ClusterNode::primary("a", "10.0.0.1", 7000),
        ClusterNode::primary("b", "10.0.1.1", 7000),
        ClusterNode::replica("c", "10.0.0.2", 7000, "a"),
    ];
    let cluster = ClusterClient::new(nodes.into_iter().zip(clients).collect());

    let rack = cluster.select(NodeSelection::matching(|n| n.host.starts_with("10.0.0.")));
    assert_eq!(rack.nodes(), vec![NodeId::new("a"), NodeId::new("c")]);

    let picked = cluster.select(NodeSelection::nodes(["b", "missing"]));
    assert_eq!(picked.size(), 1);
    let outcomes = picked.execute(Command::new("FLUSHDB")).into_results();
    assert_eq!(outcomes[&NodeId::new("b")].as_ref().unwrap(), &RedisValue::ok());

    assert!(cluster.select(NodeSelection::nodes(["missing"])).is_empty());
}
