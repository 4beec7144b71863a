use std::vec::IntoIter;

use crate::common::{Id, NodeInfo};

#[derive(Debug, Clone)]
/// Nodes ranked by XOR distance to a target, closest first, holding at most `k` entries.
///
/// Two distinct ids never share a distance to the same target, so the order is total.
pub struct ClosestNodes {
    target: Id,
    nodes: Vec<NodeInfo>,
    capacity: usize,
}

impl ClosestNodes {
    pub fn new(target: Id, capacity: usize) -> Self {
        Self {
            target,
            nodes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Rank every node added, with no capacity limit.
    pub fn unbounded(target: Id) -> Self {
        Self {
            target,
            nodes: Vec::new(),
            capacity: usize::MAX,
        }
    }

    // === Getters ===

    pub fn target(&self) -> Id {
        self.target
    }

    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.nodes.iter().any(|node| node.id() == id)
    }

    /// XOR distance of the closest node, `None` if empty.
    pub fn best_distance(&self) -> Option<Id> {
        self.nodes.first().map(|node| node.id().xor(&self.target))
    }

    // === Public Methods ===

    /// Insert `node` at its rank, ignoring duplicates and anything past the capacity.
    ///
    /// Returns `true` if the node was inserted.
    pub fn add(&mut self, node: NodeInfo) -> bool {
        let seek = node.id().xor(&self.target);

        match self
            .nodes
            .binary_search_by(|probe| probe.id().xor(&self.target).cmp(&seek))
        {
            Ok(_) => false,
            Err(pos) if pos >= self.capacity => false,
            Err(pos) => {
                self.nodes.insert(pos, node);
                self.nodes.truncate(self.capacity);

                true
            }
        }
    }

    /// Remove the node with `id`, returning `true` if it was ranked.
    pub fn remove(&mut self, id: &Id) -> bool {
        let seek = id.xor(&self.target);

        match self
            .nodes
            .binary_search_by(|probe| probe.id().xor(&self.target).cmp(&seek))
        {
            Ok(pos) => {
                self.nodes.remove(pos);
                true
            }
            Err(_) => false,
        }
    }
}

impl IntoIterator for ClosestNodes {
    type Item = NodeInfo;
    type IntoIter = IntoIter<NodeInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

impl<'a> IntoIterator for &'a ClosestNodes {
    type Item = &'a NodeInfo;
    type IntoIter = std::slice::Iter<'a, NodeInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
