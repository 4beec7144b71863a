mod common;

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use adnl_dht::{
    errors::TransportError, AddressList, Client, Config, Context, Id, Node, Request, Response,
    SigningKey, UdpAddress,
};

use common::MockTransport;

const NETWORK_SIZE: usize = 64;
const K: usize = 6;

/// A network where every node knows every other node, and answers with the `k`
/// closest ones to the requested key.
fn network() -> (Arc<MockTransport>, Vec<Node>) {
    let nodes = (0..NETWORK_SIZE)
        .map(|i| {
            let signer = SigningKey::from_bytes(&[i as u8 + 1; 32]);

            Node::new(
                &signer,
                AddressList {
                    addresses: vec![UdpAddress::new(Ipv4Addr::new(10, 0, 0, i as u8), 3000)],
                    ..Default::default()
                },
                1,
            )
        })
        .collect::<Vec<_>>();

    let by_address = nodes
        .iter()
        .map(|node| (node.address().unwrap(), node.clone()))
        .collect::<HashMap<_, _>>();
    let all = nodes.clone();

    let transport = MockTransport::new(move |address, _, request| {
        if !by_address.contains_key(address) {
            return Err(TransportError::Query("unknown node".into()));
        }

        match request {
            Request::Ping { random_id } => Ok(Response::Pong { random_id }),
            Request::FindNode { key, k } => Ok(Response::Nodes(closest(&all, &key, k as usize))),
            _ => Err(TransportError::Query("unsupported".into())),
        }
    });

    (transport, nodes)
}

fn closest(nodes: &[Node], target: &Id, k: usize) -> Vec<Node> {
    let mut nodes = nodes.to_vec();
    nodes.sort_by_key(|node| node.node_id().xor(target));
    nodes.truncate(k);
    nodes
}

fn client(transport: Arc<MockTransport>, bootstrap: &[Node]) -> Client {
    let config = Config {
        k: K,
        static_nodes: bootstrap.to_vec(),
        ..Default::default()
    };

    Client::open(&Context::background(), transport, config).unwrap()
}

#[test]
fn lookups_converge() {
    let (transport, nodes) = network();
    let client = client(transport, &nodes[..2]);

    for _ in 0..10 {
        let trace = client
            .trace_lookup(&Context::background(), Id::random())
            .unwrap();

        assert!(trace.rounds() > 0);
        assert!(trace.is_converging());
    }
}

#[test]
fn find_nodes_returns_the_closest() {
    let (transport, nodes) = network();
    let client = client(transport, &nodes[..2]);

    for _ in 0..10 {
        let target = Id::random();

        let found = client
            .find_nodes(&Context::background(), target)
            .unwrap()
            .iter()
            .map(|node| *node.id())
            .collect::<Vec<_>>();

        let expected = closest(&nodes, &target, K)
            .iter()
            .map(|node| node.node_id())
            .collect::<Vec<_>>();

        assert_eq!(found, expected);
    }
}

#[test]
fn discovered_nodes_are_bucketed() {
    let (transport, nodes) = network();
    let client = client(transport, &nodes[..2]);

    for _ in 0..20 {
        client
            .find_nodes(&Context::background(), Id::random())
            .unwrap();
    }

    let id = *client.id();
    let mut per_bucket = HashMap::<u16, usize>::new();
    let active = client
        .active_nodes()
        .iter()
        .map(|node| *node.id())
        .collect::<Vec<_>>();

    for node in client.known_nodes() {
        if !active.contains(node.id()) {
            *per_bucket.entry(id.distance(node.id())).or_default() += 1;
        }
    }

    assert!(per_bucket.values().all(|count| *count <= K));
}
