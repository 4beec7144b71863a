//! Store and find a value on an in-memory network of DHT nodes.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use adnl_dht::{
    errors::TransportError, AddressList, Client, Config, Context, Id, Key, Node, Peer,
    PublicKey, Request, Response, SigningKey, Transport, UdpAddress, Value,
};

use clap::Parser;

use tracing::Level;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of nodes in the network
    #[arg(long, default_value_t = 100)]
    nodes: usize,
    /// Data to store
    #[arg(long, default_value = "hello")]
    data: String,
    /// Number of copies to store
    #[arg(long, default_value_t = 3)]
    copies: usize,
}

/// A node of the in-memory network: its signed record and the values it stores.
struct LocalNode {
    node: Node,
    values: Mutex<HashMap<Id, Value>>,
}

struct LocalNetwork {
    nodes: HashMap<String, Arc<LocalNode>>,
    k: usize,
}

impl LocalNetwork {
    fn new(size: usize, k: usize) -> Self {
        let nodes = (0..size)
            .map(|i| {
                let node = Node::new(
                    &SigningKey::from_bytes(&rand::random()),
                    AddressList {
                        addresses: vec![UdpAddress::new(
                            Ipv4Addr::from(0x0a00_0000 + i as u32),
                            3000,
                        )],
                        ..Default::default()
                    },
                    1,
                );

                let address = node.address().expect("has an address");

                (
                    address,
                    Arc::new(LocalNode {
                        node,
                        values: Mutex::new(HashMap::new()),
                    }),
                )
            })
            .collect();

        Self { nodes, k }
    }

    fn closest(&self, target: &Id) -> Vec<Node> {
        let mut nodes = self
            .nodes
            .values()
            .map(|local| local.node.clone())
            .collect::<Vec<_>>();

        nodes.sort_by_key(|node| node.node_id().xor(target));
        nodes.truncate(self.k);

        nodes
    }

    fn answer(&self, local: &LocalNode, request: Request) -> Response {
        match request {
            Request::Ping { random_id } => Response::Pong { random_id },
            Request::FindNode { key, .. } => Response::Nodes(self.closest(&key)),
            Request::FindValue { key, .. } => {
                match local.values.lock().expect("lock").get(&key) {
                    Some(value) => Response::ValueFound(value.clone()),
                    None => Response::ValueNotFound(self.closest(&key)),
                }
            }
            Request::Store { value } => {
                if value.validate() {
                    local
                        .values
                        .lock()
                        .expect("lock")
                        .insert(value.key().id(), value);
                }
                Response::Stored
            }
        }
    }
}

struct LocalTransport(Arc<LocalNetwork>);

struct LocalPeer {
    network: Arc<LocalNetwork>,
    node: Arc<LocalNode>,
}

impl Transport for LocalTransport {
    fn register_peer(
        &self,
        address: &str,
        _key: &PublicKey,
    ) -> Result<Arc<dyn Peer>, TransportError> {
        let node = self
            .0
            .nodes
            .get(address)
            .ok_or_else(|| TransportError::Register {
                address: address.to_string(),
                reason: "no such node".to_string(),
            })?;

        Ok(Arc::new(LocalPeer {
            network: self.0.clone(),
            node: node.clone(),
        }))
    }
}

impl Peer for LocalPeer {
    fn query(&self, ctx: &Context, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        ctx.check()?;

        let request =
            Request::from_bytes(request).map_err(|error| TransportError::Query(error.to_string()))?;

        Ok(self.network.answer(&self.node, request).to_bytes())
    }

    fn close(&self) {}
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();

    let config = Config::default();
    let network = Arc::new(LocalNetwork::new(cli.nodes, config.k));

    let config = Config {
        static_nodes: network
            .nodes
            .values()
            .take(3)
            .map(|local| local.node.clone())
            .collect(),
        ..config
    };

    let ctx = Context::with_timeout(Duration::from_secs(10));
    let client = Client::open(&ctx, Arc::new(LocalTransport(network)), config)
        .expect("failed to open client");

    let signer = SigningKey::from_bytes(&rand::random());

    let start = Instant::now();
    let report = client
        .store(
            &ctx,
            "greeting",
            0,
            cli.data.into_bytes(),
            Duration::from_secs(3600),
            &signer,
            cli.copies,
        )
        .expect("store failed");

    println!(
        "Stored at {:?} in {:?} seconds",
        report
            .stored_at()
            .iter()
            .map(|node| node.address())
            .collect::<Vec<_>>(),
        start.elapsed().as_secs_f32()
    );

    let key = Key::new(PublicKey::from(&signer).id(), "greeting", 0);

    let start = Instant::now();
    let value = client.find_value(&ctx, &key).expect("value not found");

    println!(
        "Found {:?} in {:?} seconds",
        String::from_utf8_lossy(&value.data),
        start.elapsed().as_secs_f32()
    );

    println!("{:?}", client.info());

    client.close();
}
