//! The point-to-point transport the client reaches peers through.
//!
//! The DHT client only needs two capabilities: registering a peer by address
//! and identity key, and running a single request/response query against it.
//! Encryption, channels and retransmission are the transport's business.

use std::sync::Arc;

use crate::common::PublicKey;
use crate::context::{Context, ContextError};

/// Creates peer handles for remote nodes.
pub trait Transport: Send + Sync {
    /// Register a peer reachable at `address` (`ip:port`) and identified by `key`.
    fn register_peer(&self, address: &str, key: &PublicKey)
        -> Result<Arc<dyn Peer>, TransportError>;
}

/// A registered remote node.
pub trait Peer: Send + Sync {
    /// Send the serialized `request` and wait for the serialized response.
    ///
    /// Implementations must return once `ctx` is cancelled or past its deadline.
    fn query(&self, ctx: &Context, request: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Release the underlying connection. Queries after close fail.
    fn close(&self);
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to register peer {address}: {reason}")]
    Register { address: String, reason: String },

    #[error("Peer is closed")]
    Closed,

    #[error("Query failed: {0}")]
    Query(String),

    #[error(transparent)]
    Context(#[from] ContextError),
}
