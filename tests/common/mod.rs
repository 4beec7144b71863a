#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use adnl_dht::{
    errors::TransportError, AddressList, Config, Context, Key, KeyDescription, Node, Peer,
    PublicKey, Request, Response, SigningKey, Transport, UdpAddress, UpdateRule, Value,
};

pub const BOOTSTRAP_1: &str = "185.86.79.9:22096";
pub const BOOTSTRAP_2: &str = "178.18.243.132:15888";
pub const STORE_NODE: &str = "6.6.6.6:65432";

/// Two real static nodes of the main network.
pub const GLOBAL_CONFIG: &str = r#"{
    "@type": "config.global",
    "dht": {
        "@type": "dht.config.global",
        "k": 6,
        "a": 3,
        "static_nodes": {
            "@type": "dht.nodes",
            "nodes": [
                {
                    "@type": "dht.node",
                    "id": { "@type": "pub.ed25519", "key": "6PGkPQSbyFp12esf1NqmDOaLoFA8i9+Mp5+cAx5wtTU=" },
                    "addr_list": {
                        "@type": "adnl.addressList",
                        "addrs": [{ "@type": "adnl.address.udp", "ip": -1185526007, "port": 22096 }],
                        "version": 0, "reinit_date": 0, "priority": 0, "expire_at": 0
                    },
                    "version": -1,
                    "signature": "L4N1+dzXLlkmT5iPnvsmsixzXU0L6kPKApqMdcrGP5d9ssMhn69SzHFK+yIzvG6zQ9oRb4TnqPBaKShjjj2OBg=="
                },
                {
                    "@type": "dht.node",
                    "id": { "@type": "pub.ed25519", "key": "bn8klhFZgE2sfIDfvVI6m6+oVNi1nBRlnHoxKtR9WBU=" },
                    "addr_list": {
                        "@type": "adnl.addressList",
                        "addrs": [{ "@type": "adnl.address.udp", "ip": -1307380860, "port": 15888 }],
                        "version": 0, "reinit_date": 0, "priority": 0, "expire_at": 0
                    },
                    "version": -1,
                    "signature": "fQ5zAa6ot4pfFWzvuJOR8ijM5ELWndSDsRhFKstW1tqVSNfwAdOC7tDC8mc4vgTJ6fSYSWmhnXGK/+T5f6sDCw=="
                }
            ]
        }
    }
}"#;

pub fn config() -> Config {
    Config::from_global_json(GLOBAL_CONFIG.as_bytes()).unwrap()
}

fn decode(base64: &str) -> Vec<u8> {
    STANDARD.decode(base64).unwrap()
}

/// The published `address` value of foundation.ton, pointing at 164.92.158.146:3333.
pub fn foundation_value() -> Value {
    let owner = PublicKey::Ed25519(
        decode("kn0+cePOZRw/FyE005Fj9w5MeSFp4589Ugv62TiK1Mo=")
            .try_into()
            .unwrap(),
    );

    Value {
        key_description: KeyDescription {
            key: Key::address(owner.id()),
            id: owner,
            update_rule: UpdateRule::Signature,
            signature: decode("Zwj4eW/tMbgzF7kQtI8AF11E0q76h5/3+hkylzHuJzKDD2sDd7sw/FXIiVptjrrOIPze8kbbDEkq4K5O78KeDQ=="),
        },
        data: decode("WOYnIgEAAADnpg1nkp5cpAUNAAD6Zphj+maYYwAAAAAAAAAA").into(),
        ttl: 1671121877,
        signature: decode("+1cttR4nsAC0UsZwZTfDwvraxK9NxOjU0pXATkftiEyDgvbyLzPt24lOHl9B756NWBlv8NzqswhNiq7V+SV6Aw=="),
    }
}

/// A signed node at [STORE_NODE].
pub fn store_node() -> Node {
    Node {
        id: PublicKey::Ed25519(
            hex::decode("135da090fa178b960de48655108b50b5ed3a09942f44a0a505c76cbd171d4ae9")
                .unwrap()
                .try_into()
                .unwrap(),
        ),
        addr_list: AddressList {
            addresses: vec![UdpAddress::new([6, 6, 6, 6].into(), 65432)],
            ..Default::default()
        },
        version: 1671102718,
        signature: hex::decode("f06b491e4cc26afd989e2409a1fb155d993567dde9a68b1603d35df6a390195b757f2aca3968a46493f5ee513f5f040c10b6e21b988f48e0781fe81aa9226d05").unwrap(),
    }
}

/// The key whose `address` key id ranks [BOOTSTRAP_2] then [STORE_NODE] closest.
pub fn store_signer() -> SigningKey {
    SigningKey::from_bytes(
        &hex::decode("83590f541d37b783aa504049bab792696d12bbec3d23a954353300f816ca8b96")
            .unwrap()
            .try_into()
            .unwrap(),
    )
}

/// Block until `ctx` is done, like an unresponsive node.
pub fn hang(ctx: &Context) -> Result<Response, TransportError> {
    ctx.sleep(Duration::from_secs(3600))?;

    Err(TransportError::Query("no answer".to_string()))
}

pub fn pong(request: &Request) -> Result<Response, TransportError> {
    match request {
        Request::Ping { random_id } => Ok(Response::Pong {
            random_id: *random_id,
        }),
        _ => Err(TransportError::Query("not a ping".to_string())),
    }
}

type Handler = dyn Fn(&str, &Context, Request) -> Result<Response, TransportError> + Send + Sync;

/// An in-memory network: every address answers through the same handler.
pub struct MockTransport {
    handler: Arc<Handler>,
    unreachable: Mutex<HashSet<String>>,
    peers: Mutex<Vec<Arc<MockPeer>>>,
}

impl MockTransport {
    pub fn new(
        handler: impl Fn(&str, &Context, Request) -> Result<Response, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Arc::new(handler),
            unreachable: Mutex::new(HashSet::new()),
            peers: Mutex::new(Vec::new()),
        })
    }

    /// Answer pings only.
    pub fn ping_only() -> Arc<Self> {
        Self::new(|_, _, request| pong(&request))
    }

    /// Refuse to register peers at `address`.
    pub fn set_unreachable(&self, address: &str) {
        self.unreachable.lock().unwrap().insert(address.to_string());
    }

    /// Every peer handle ever registered.
    pub fn peers(&self) -> Vec<Arc<MockPeer>> {
        self.peers.lock().unwrap().clone()
    }

    pub fn peers_at(&self, address: &str) -> Vec<Arc<MockPeer>> {
        self.peers()
            .into_iter()
            .filter(|peer| peer.address == address)
            .collect()
    }

    pub fn open_peers(&self) -> usize {
        self.peers().iter().filter(|peer| !peer.is_closed()).count()
    }
}

impl Transport for MockTransport {
    fn register_peer(&self, address: &str, _key: &PublicKey) -> Result<Arc<dyn Peer>, TransportError> {
        if self.unreachable.lock().unwrap().contains(address) {
            return Err(TransportError::Register {
                address: address.to_string(),
                reason: "unreachable".to_string(),
            });
        }

        let peer = Arc::new(MockPeer {
            address: address.to_string(),
            handler: self.handler.clone(),
            closed: AtomicBool::new(false),
            queries: AtomicUsize::new(0),
        });

        self.peers.lock().unwrap().push(peer.clone());

        Ok(peer)
    }
}

pub struct MockPeer {
    pub address: String,
    handler: Arc<Handler>,
    closed: AtomicBool,
    queries: AtomicUsize,
}

impl MockPeer {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl Peer for MockPeer {
    fn query(&self, ctx: &Context, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.queries.fetch_add(1, Ordering::SeqCst);

        let request =
            Request::from_bytes(request).map_err(|error| TransportError::Query(error.to_string()))?;

        let response = (self.handler)(&self.address, ctx, request)?;

        Ok(response.to_bytes())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst)
    }
}
