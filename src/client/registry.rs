//! Known and active nodes of a client.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::common::{Id, NodeInfo};
use crate::transport::Peer;

/// Validated nodes, keyed by the hex node id.
///
/// Every active node is also known. Discovered nodes are kept per distance bucket
/// relative to the client id, at most `k` per bucket, while active nodes are
/// never evicted.
pub(crate) struct Registry {
    id: Id,
    k: usize,
    known: HashMap<String, NodeInfo>,
    active: HashMap<String, ActiveNode>,
    closed: bool,
}

struct ActiveNode {
    info: NodeInfo,
    peer: Arc<dyn Peer>,
}

impl Registry {
    pub fn new(id: Id, k: usize) -> Self {
        Self {
            id,
            k,
            known: HashMap::new(),
            active: HashMap::new(),
            closed: false,
        }
    }

    // === Getters ===

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn known_nodes(&self) -> Vec<NodeInfo> {
        self.known.values().cloned().collect()
    }

    pub fn active_nodes(&self) -> Vec<NodeInfo> {
        self.active.values().map(|node| node.info.clone()).collect()
    }

    pub fn known_len(&self) -> usize {
        self.known.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Peer handle of an active node.
    pub fn peer(&self, id: &Id) -> Option<Arc<dyn Peer>> {
        self.active.get(&id.to_hex()).map(|node| node.peer.clone())
    }

    // === Public Methods ===

    /// Record a node that answered, with the handle it answered through.
    ///
    /// Returns the handle back if it was not kept (the node already had one, or the
    /// registry is closed), so the caller can close it.
    #[must_use]
    pub fn activate(&mut self, info: NodeInfo, peer: Arc<dyn Peer>) -> Option<Arc<dyn Peer>> {
        let key = info.id().to_hex();

        if self.closed || self.active.contains_key(&key) {
            return Some(peer);
        }

        trace!(id = %key, address = info.address(), "Node became active");

        self.known.insert(key.clone(), info.clone());
        self.active.insert(key, ActiveNode { info, peer });

        None
    }

    /// Remember a node learned from a lookup response.
    ///
    /// Returns `false` if it was already known or its bucket is full.
    pub fn discover(&mut self, info: NodeInfo) -> bool {
        let key = info.id().to_hex();

        if self.closed || self.known.contains_key(&key) {
            return false;
        }

        let bucket = self.id.distance(info.id());
        let occupied = self
            .known
            .iter()
            .filter(|(key, _)| !self.active.contains_key(*key))
            .filter(|(_, node)| self.id.distance(node.id()) == bucket)
            .count();

        if occupied >= self.k {
            trace!(id = %key, bucket, "Bucket full, ignoring discovered node");
            return false;
        }

        self.known.insert(key, info);

        true
    }

    /// Forget a known node that is not active, after it failed to answer.
    ///
    /// Returns `false` if it was active or not known.
    pub fn forget(&mut self, id: &Id) -> bool {
        let key = id.to_hex();

        if self.active.contains_key(&key) {
            return false;
        }

        self.known.remove(&key).is_some()
    }

    /// Close every peer handle and forget all nodes.
    ///
    /// Returns `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }

        for node in self.active.values() {
            node.peer.close();
        }

        self.active.clear();
        self.known.clear();
        self.closed = true;

        true
    }
}
