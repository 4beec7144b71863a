use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::common::{AddressList, Node, PublicKey, UdpAddress};
use crate::context::Context;

/// Default replication parameter, the number of nodes asked for per lookup.
pub const DEFAULT_K: usize = 6;
/// Default lookup parallelism, the number of nodes queried per round.
pub const DEFAULT_ALPHA: usize = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_ROUNDS: usize = 16;
pub const DEFAULT_STORE_FAN_OUT: usize = 3;

#[derive(Debug, Clone)]
/// Client Configurations
pub struct Config {
    /// Bucket size and the number of closest nodes kept per lookup.
    ///
    /// Defaults to [DEFAULT_K]
    pub k: usize,
    /// Number of nodes queried concurrently in a lookup round.
    ///
    /// Defaults to [DEFAULT_ALPHA]
    pub a: usize,
    /// Signed node records to bootstrap from.
    ///
    /// Defaults to none, usually loaded with [Config::from_global_json].
    pub static_nodes: Vec<Node>,
    /// Timeout of a single request to a single node.
    ///
    /// The longer this duration is, the longer lookups take to give up on slow nodes.
    /// The shorter it is, the more responses from busy nodes we miss out on.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT]
    pub request_timeout: Duration,
    /// Upper bound on the rounds of a single lookup.
    ///
    /// Defaults to [DEFAULT_MAX_ROUNDS]
    pub max_rounds: usize,
    /// Maximum store requests in flight at once.
    ///
    /// Defaults to [DEFAULT_STORE_FAN_OUT]
    pub store_fan_out: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            a: DEFAULT_ALPHA,
            static_nodes: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_rounds: DEFAULT_MAX_ROUNDS,
            store_fan_out: DEFAULT_STORE_FAN_OUT,
        }
    }
}

impl Config {
    /// Read `k`, `a` and the static nodes from the `dht` section of a network's
    /// global config document. Everything else keeps its default.
    ///
    /// Node signatures are not checked here, [crate::Client::open] does that.
    pub fn from_global_json(json: &[u8]) -> Result<Self, ConfigError> {
        let global: GlobalConfig =
            serde_json::from_slice(json).map_err(|error| ConfigError::Json(error.to_string()))?;

        let defaults = Config::default();

        Ok(Self {
            k: global.dht.k.unwrap_or(defaults.k),
            a: global.dht.a.unwrap_or(defaults.a),
            static_nodes: global
                .dht
                .static_nodes
                .nodes
                .into_iter()
                .map(JsonNode::into_node)
                .collect::<Result<_, _>>()?,
            ..defaults
        })
    }
}

/// Fetches a global config document, usually over HTTP.
pub trait ConfigSource: Send + Sync {
    fn fetch(&self, ctx: &Context, url: &str) -> Result<Vec<u8>, ConfigError>;
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid config json: {0}")]
    Json(String),

    #[error("Invalid base64 in {field}")]
    Base64 { field: &'static str },

    #[error("Unsupported key type {0}")]
    UnsupportedKeyType(String),

    #[error("Invalid public key size, expected 32, got {0}")]
    InvalidKeySize(usize),

    #[error("Failed to fetch config: {0}")]
    Fetch(String),
}

#[derive(Deserialize)]
struct GlobalConfig {
    dht: DhtConfig,
}

#[derive(Deserialize)]
struct DhtConfig {
    #[serde(default)]
    k: Option<usize>,
    #[serde(default)]
    a: Option<usize>,
    static_nodes: StaticNodes,
}

#[derive(Deserialize)]
struct StaticNodes {
    nodes: Vec<JsonNode>,
}

#[derive(Deserialize)]
struct JsonNode {
    id: JsonPublicKey,
    addr_list: JsonAddressList,
    version: i32,
    signature: String,
}

#[derive(Deserialize)]
struct JsonPublicKey {
    #[serde(rename = "@type")]
    kind: String,
    key: String,
}

#[derive(Deserialize)]
struct JsonAddressList {
    addrs: Vec<JsonUdpAddress>,
    #[serde(default)]
    version: i32,
    #[serde(default)]
    reinit_date: i32,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    expire_at: i32,
}

#[derive(Deserialize)]
struct JsonUdpAddress {
    ip: i32,
    port: i32,
}

impl JsonNode {
    fn into_node(self) -> Result<Node, ConfigError> {
        if self.id.kind != "pub.ed25519" {
            return Err(ConfigError::UnsupportedKeyType(self.id.kind));
        }

        let key = STANDARD
            .decode(&self.id.key)
            .map_err(|_| ConfigError::Base64 { field: "id.key" })?;
        let key: [u8; 32] = key
            .try_into()
            .map_err(|key: Vec<u8>| ConfigError::InvalidKeySize(key.len()))?;

        let signature = STANDARD
            .decode(&self.signature)
            .map_err(|_| ConfigError::Base64 { field: "signature" })?;

        Ok(Node {
            id: PublicKey::Ed25519(key),
            addr_list: AddressList {
                addresses: self
                    .addr_list
                    .addrs
                    .into_iter()
                    .map(|address| UdpAddress {
                        ip: address.ip,
                        port: address.port,
                    })
                    .collect(),
                version: self.addr_list.version,
                reinit_date: self.addr_list.reinit_date,
                priority: self.addr_list.priority,
                expire_at: self.addr_list.expire_at,
            },
            version: self.version,
            signature,
        })
    }
}
