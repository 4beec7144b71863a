//! Blocking DHT client.

mod config;
mod info;
mod lookup;
mod registry;
mod store;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;

use tracing::{debug, info, warn};

use crate::common::{tl::DecodeError, Id, NodeInfo, Request, Response};
use crate::context::{Context, RecvError};
use crate::transport::{Peer, Transport, TransportError};
use crate::Error;

pub use config::{
    Config, ConfigError, ConfigSource, DEFAULT_ALPHA, DEFAULT_K, DEFAULT_MAX_ROUNDS,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_STORE_FAN_OUT,
};
pub use info::Info;

use registry::Registry;

#[derive(Clone)]
/// A DHT client, bootstrapped from a set of static nodes.
///
/// Cheap to clone, all clones share the same known and active nodes.
pub struct Client(Arc<Inner>);

struct Inner {
    id: Id,
    config: Config,
    transport: Arc<dyn Transport>,
    registry: RwLock<Registry>,
}

impl Client {
    /// Validate and ping the configured static nodes, and return a client with those
    /// that answered.
    ///
    /// Invalid or unreachable static nodes are dropped. If `ctx` is done before every
    /// probe completed, the client is returned with the probes that did.
    pub fn open(
        ctx: &Context,
        transport: Arc<dyn Transport>,
        config: Config,
    ) -> Result<Client, Error> {
        ctx.check()?;

        let id = Id::random();

        let nodes = config
            .static_nodes
            .iter()
            .cloned()
            .filter_map(|node| match NodeInfo::try_from(node) {
                Ok(info) => Some(info),
                Err(error) => {
                    warn!(?error, "Invalid static node");
                    None
                }
            })
            .collect::<Vec<_>>();

        let client = Client(Arc::new(Inner {
            id,
            registry: RwLock::new(Registry::new(id, config.k)),
            config,
            transport,
        }));

        client.bootstrap(ctx, nodes);

        let active = client.read().active_len();
        if active == 0 {
            warn!("Could not reach any static node");
        } else {
            info!(?id, active, "Client bootstrapped");
        }

        Ok(client)
    }

    /// Fetch the global config at `url` with `source`, then [Client::open] with it.
    pub fn open_from_url(
        ctx: &Context,
        transport: Arc<dyn Transport>,
        source: &dyn ConfigSource,
        url: &str,
    ) -> Result<Client, Error> {
        let json = source.fetch(ctx, url)?;
        let config = Config::from_global_json(&json)?;

        Self::open(ctx, transport, config)
    }

    // === Getters ===

    /// This client's random [Id], the center of its distance buckets.
    pub fn id(&self) -> &Id {
        &self.0.id
    }

    pub fn config(&self) -> &Config {
        &self.0.config
    }

    /// Information and statistics about this client.
    pub fn info(&self) -> Info {
        let registry = self.read();

        Info::new(
            self.0.id,
            registry.known_len(),
            registry.active_len(),
            registry.is_closed(),
        )
    }

    /// Validated nodes this client knows about.
    pub fn known_nodes(&self) -> Vec<NodeInfo> {
        self.read().known_nodes()
    }

    /// Nodes that answered this client and have an open peer handle.
    pub fn active_nodes(&self) -> Vec<NodeInfo> {
        self.read().active_nodes()
    }

    // === Public Methods ===

    /// Close every peer handle and forget all nodes.
    ///
    /// Lookups and stores started afterwards fail with [Error::Closed]. Closing twice is a no-op.
    pub fn close(&self) {
        if self.write().close() {
            info!(id = ?self.0.id, "Client closed");
        }
    }

    // === Private Methods ===

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.0.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.0.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn k(&self) -> i32 {
        i32::try_from(self.0.config.k).unwrap_or(i32::MAX)
    }

    /// Ping every node concurrently, activating those that answer.
    fn bootstrap(&self, ctx: &Context, nodes: Vec<NodeInfo>) {
        let probe_ctx = ctx.child();
        let (sender, receiver) = flume::unbounded();

        thread::scope(|s| {
            for node in nodes {
                let sender = sender.clone();
                let probe_ctx = &probe_ctx;

                s.spawn(move || {
                    let request = Request::Ping {
                        random_id: rand::random(),
                    };
                    let result = self.query_node(probe_ctx, &node, &request);

                    let _ = sender.send((node, result));
                });
            }
            drop(sender);

            loop {
                match ctx.recv(&receiver) {
                    Ok((node, Ok(_))) => {
                        debug!(address = node.address(), "Static node answered");
                    }
                    Ok((node, Err(error))) => {
                        debug!(address = node.address(), ?error, "Static node failed");
                    }
                    Err(RecvError::Disconnected) => break,
                    Err(RecvError::Context(error)) => {
                        warn!(?error, "Bootstrap interrupted");
                        probe_ctx.cancel();
                        break;
                    }
                }
            }
        });
    }

    /// Query `node` under a child of `ctx` bounded by the request timeout.
    ///
    /// Inactive nodes are registered with the transport first, and become active
    /// if they answer. Otherwise their handle is closed and, unless `ctx` itself is
    /// done, they are forgotten.
    fn query_node(
        &self,
        ctx: &Context,
        node: &NodeInfo,
        request: &Request,
    ) -> Result<Response, QueryError> {
        let request_ctx = ctx.child_with_timeout(self.0.config.request_timeout);

        let active = self.read().peer(node.id());
        if let Some(peer) = active {
            return query_peer(&request_ctx, peer.as_ref(), request);
        }

        let result = self
            .0
            .transport
            .register_peer(node.address(), node.key())
            .map_err(QueryError::from)
            .and_then(|peer| match query_peer(&request_ctx, peer.as_ref(), request) {
                Ok(response) => Ok((response, peer)),
                Err(error) => {
                    peer.close();
                    Err(error)
                }
            });

        match result {
            Ok((response, peer)) => {
                let rejected = self.write().activate(node.clone(), peer);
                if let Some(peer) = rejected {
                    peer.close();
                }

                Ok(response)
            }
            Err(error) => {
                if ctx.check().is_ok() && self.write().forget(node.id()) {
                    debug!(address = node.address(), ?error, "Forgot unresponsive node");
                }

                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.0.id)
            .field("config", &self.0.config)
            .finish_non_exhaustive()
    }
}

/// Send `request` and decode a response of the shape it expects.
fn query_peer(ctx: &Context, peer: &dyn Peer, request: &Request) -> Result<Response, QueryError> {
    let bytes = peer.query(ctx, &request.to_bytes())?;
    let response = Response::from_bytes(bytes)?;

    if !request.expects(&response) {
        return Err(QueryError::UnexpectedResponse);
    }

    if let (Request::Ping { random_id }, Response::Pong { random_id: echoed }) =
        (request, &response)
    {
        if random_id != echoed {
            return Err(QueryError::PongMismatch);
        }
    }

    Ok(response)
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Why a single node failed a single request.
pub enum QueryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Malformed response: {0}")]
    Decode(#[from] DecodeError),

    #[error("Response does not answer the request")]
    UnexpectedResponse,

    #[error("Pong does not echo the ping id")]
    PongMismatch,
}
