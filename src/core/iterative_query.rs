//! Round-based state of an iterative lookup.

use std::collections::HashSet;

use tracing::{debug, trace};

use super::ClosestNodes;
use crate::common::{Id, NodeInfo, Request};

/// An iterative process of querying the closest unvisited nodes to the target in rounds,
/// merging the closer nodes they return into the frontier, and repeating until a round
/// brings no improvement and there is nobody left to ask.
///
/// The frontier is the `k` closest candidates that did not fail. Every candidate is
/// kept ranked, so farther ones move up when a closer one fails.
///
/// This is the bookkeeping only, the client drives the network side.
#[derive(Debug)]
pub(crate) struct IterativeQuery {
    request: Request,
    k: usize,
    alpha: usize,
    candidates: ClosestNodes,
    responders: ClosestNodes,
    visited: HashSet<Id>,
    best: Option<Id>,
    rounds: usize,
    trace: LookupTrace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoundOutcome {
    Continue,
    Exhausted,
}

impl IterativeQuery {
    pub fn new(target: Id, request: Request, k: usize, alpha: usize) -> Self {
        trace!(?target, ?request, "New Query");

        Self {
            request,
            k,
            alpha: alpha.max(1),
            candidates: ClosestNodes::unbounded(target),
            responders: ClosestNodes::new(target, k),
            visited: HashSet::new(),
            best: None,
            rounds: 0,
            trace: LookupTrace::default(),
        }
    }

    // === Getters ===

    pub fn target(&self) -> Id {
        self.candidates.target()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Number of finished rounds.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn trace(&self) -> &LookupTrace {
        &self.trace
    }

    /// The `k` closest candidates still under consideration.
    pub fn frontier(&self) -> &[NodeInfo] {
        let nodes = self.candidates.nodes();

        &nodes[..nodes.len().min(self.k)]
    }

    pub fn has_unvisited(&self) -> bool {
        self.frontier()
            .iter()
            .any(|node| !self.visited.contains(node.id()))
    }

    // === Public Methods ===

    /// Add a candidate to the frontier, unless it was already queried.
    pub fn add_candidate(&mut self, node: NodeInfo) -> bool {
        if self.visited.contains(node.id()) {
            return false;
        }

        self.candidates.add(node)
    }

    /// Select the next `alpha` closest unvisited nodes and mark them visited.
    pub fn next_round(&mut self) -> Vec<NodeInfo> {
        let batch = self
            .frontier()
            .iter()
            .filter(|node| !self.visited.contains(node.id()))
            .take(self.alpha)
            .cloned()
            .collect::<Vec<_>>();

        for node in &batch {
            self.visited.insert(*node.id());
        }

        batch
    }

    /// Record a node that answered with the expected response shape.
    pub fn add_responder(&mut self, node: NodeInfo) {
        self.responders.add(node);
    }

    /// Drop a node that failed from consideration for the rest of this call.
    ///
    /// It stays visited, so it is not added back by later responses.
    pub fn add_failure(&mut self, node: &NodeInfo) {
        self.visited.insert(*node.id());
        self.candidates.remove(node.id());
    }

    /// Close the current round, recording the best distance seen so far.
    pub fn finish_round(&mut self) -> RoundOutcome {
        self.rounds += 1;

        let best = self.candidates.best_distance();
        let improved = match (best, self.best) {
            (Some(best), Some(previous)) => best < previous,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if improved {
            self.best = best;
        }
        if let Some(best) = self.best {
            self.trace.push(best);
        }

        trace!(
            target = ?self.target(),
            round = self.rounds(),
            best = ?best,
            improved,
            "Lookup round done"
        );

        if improved || self.has_unvisited() {
            RoundOutcome::Continue
        } else {
            debug!(
                target = ?self.target(),
                candidates = self.candidates.len(),
                visited = self.visited.len(),
                responders = self.responders.len(),
                "Done query"
            );

            RoundOutcome::Exhausted
        }
    }

    /// Nodes to replicate a value at, ranked: responders first, then the rest of
    /// the frontier.
    pub fn store_candidates(&self) -> Vec<NodeInfo> {
        let mut candidates = self.responders.nodes().to_vec();

        candidates.extend(
            self.frontier()
                .iter()
                .filter(|node| !self.responders.contains(node.id()))
                .cloned(),
        );

        candidates
    }

    pub fn into_responders(self) -> Vec<NodeInfo> {
        self.responders.into_iter().collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Best frontier distance to the target at the end of each round.
pub struct LookupTrace(Vec<Id>);

impl LookupTrace {
    fn push(&mut self, distance: Id) {
        self.0.push(distance)
    }

    pub fn rounds(&self) -> usize {
        self.0.len()
    }

    pub fn distances(&self) -> &[Id] {
        &self.0
    }

    /// Returns `true` if no round ended further from the target than the one before it.
    pub fn is_converging(&self) -> bool {
        self.0.windows(2).all(|pair| pair[1] <= pair[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::closest_nodes::tests::random_node_info;

    fn query(target: Id, k: usize, alpha: usize) -> IterativeQuery {
        IterativeQuery::new(target, Request::FindNode { key: target, k: 6 }, k, alpha)
    }

    #[test]
    fn rounds_visit_closest_first() {
        let target = Id::random();
        let mut query = query(target, 6, 2);

        let mut nodes = (0..5).map(|_| random_node_info()).collect::<Vec<_>>();
        for node in &nodes {
            query.add_candidate(node.clone());
        }
        nodes.sort_by_key(|n| n.id().xor(&target));

        assert_eq!(query.next_round(), nodes[..2].to_vec());
        assert_eq!(query.next_round(), nodes[2..4].to_vec());
        assert_eq!(query.next_round(), nodes[4..].to_vec());
        assert!(query.next_round().is_empty());
        assert!(!query.has_unvisited());
    }

    #[test]
    fn visited_nodes_are_not_candidates() {
        let target = Id::random();
        let mut query = query(target, 6, 3);

        let node = random_node_info();
        assert!(query.add_candidate(node.clone()));
        assert_eq!(query.next_round(), vec![node.clone()]);

        assert!(!query.add_candidate(node));
        assert!(query.next_round().is_empty());
    }

    #[test]
    fn failed_nodes_make_room_for_farther_ones() {
        let target = Id::random();
        let mut query = query(target, 2, 2);

        let mut nodes = (0..4).map(|_| random_node_info()).collect::<Vec<_>>();
        for node in &nodes {
            query.add_candidate(node.clone());
        }
        nodes.sort_by_key(|n| n.id().xor(&target));

        assert_eq!(query.frontier(), &nodes[..2]);
        assert_eq!(query.next_round(), nodes[..2].to_vec());
        assert!(!query.has_unvisited());

        query.add_failure(&nodes[0]);
        query.add_failure(&nodes[1]);

        assert_eq!(query.frontier(), &nodes[2..]);
        assert!(query.has_unvisited());
        assert_eq!(query.next_round(), nodes[2..].to_vec());

        // A response naming a failed node does not bring it back.
        assert!(!query.add_candidate(nodes[0].clone()));
        assert_eq!(query.frontier(), &nodes[2..]);
    }

    #[test]
    fn exhausted_without_improvement() {
        let target = Id::random();
        let mut query = query(target, 6, 3);

        // Nothing known at all.
        assert_eq!(query.finish_round(), RoundOutcome::Exhausted);

        let node = random_node_info();
        query.add_candidate(node.clone());
        query.next_round();
        query.add_responder(node);

        // First best distance is an improvement.
        assert_eq!(query.finish_round(), RoundOutcome::Continue);
        assert_eq!(query.finish_round(), RoundOutcome::Exhausted);
        assert_eq!(query.rounds(), 3);
        assert_eq!(query.trace().rounds(), 2);
    }

    #[test]
    fn trace_is_monotonic() {
        let target = Id::random();
        let mut query = query(target, 4, 2);

        for _ in 0..10 {
            for _ in 0..3 {
                query.add_candidate(random_node_info());
            }
            query.next_round();
            query.finish_round();
        }

        assert_eq!(query.trace().rounds(), 10);
        assert!(query.trace().is_converging());
    }

    #[test]
    fn store_candidates_rank_responders_first() {
        let target = Id::random();
        let mut query = query(target, 6, 6);

        let mut nodes = (0..4).map(|_| random_node_info()).collect::<Vec<_>>();
        nodes.sort_by_key(|n| n.id().xor(&target));

        for node in &nodes {
            query.add_candidate(node.clone());
        }
        query.next_round();

        query.add_responder(nodes[3].clone());
        query.add_responder(nodes[1].clone());
        query.add_failure(&nodes[0]);

        assert_eq!(
            query.store_candidates(),
            vec![nodes[1].clone(), nodes[3].clone(), nodes[2].clone()]
        );
    }
}
