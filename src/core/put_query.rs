use std::collections::VecDeque;
use std::fmt::Display;

use tracing::{debug, trace};

use crate::common::{Id, NodeInfo, Value};
use crate::context::ContextError;

#[derive(Debug)]
/// Once an [super::IterativeQuery] found the closest nodes to a key, we can store a value
/// at them using this PutQuery, that hands out candidates in ranked order, keeps at most
/// `fan_out` requests in flight, and counts acknowledging nodes.
///
/// Only the coordinating thread owns it, so the count can never exceed `required`.
pub(crate) struct PutQuery {
    target: Id,
    candidates: VecDeque<NodeInfo>,
    inflight: usize,
    stored_at: Vec<NodeInfo>,
    errors: usize,
    required: usize,
    fan_out: usize,
}

impl PutQuery {
    pub fn new(target: Id, candidates: Vec<NodeInfo>, required: usize, fan_out: usize) -> Self {
        trace!(?target, candidates = candidates.len(), required, "PutQuery start");

        Self {
            target,
            candidates: candidates.into(),
            inflight: 0,
            stored_at: Vec::new(),
            errors: 0,
            required,
            fan_out: fan_out.max(1),
        }
    }

    pub fn stored(&self) -> usize {
        self.stored_at.len()
    }

    /// Candidates to send a store request to now.
    pub fn next_requests(&mut self) -> Vec<NodeInfo> {
        let mut requests = Vec::new();

        while self.inflight < self.fan_out && self.stored() + self.inflight < self.required {
            match self.candidates.pop_front() {
                Some(node) => {
                    self.inflight += 1;
                    requests.push(node);
                }
                None => break,
            }
        }

        requests
    }

    pub fn success(&mut self, node: NodeInfo) {
        debug!(target = ?self.target, node = node.address(), "PutQuery got success response");

        self.inflight = self.inflight.saturating_sub(1);
        self.stored_at.push(node);
    }

    pub fn error(&mut self, node: &NodeInfo, error: impl Display) {
        debug!(target = ?self.target, node = node.address(), %error, "PutQuery got error");

        self.inflight = self.inflight.saturating_sub(1);
        self.errors += 1;
    }

    /// Either the target is met, or every candidate was tried and answered.
    pub fn is_done(&self) -> bool {
        self.stored() >= self.required || (self.candidates.is_empty() && self.inflight == 0)
    }

    pub fn into_result(self, value: Value) -> Result<StoreReport, PutError> {
        let target = self.target;

        if self.stored() >= self.required {
            debug!(?target, stored = self.stored(), "PutQuery Done successfully");

            return Ok(StoreReport {
                target,
                value,
                stored_at: self.stored_at,
                required: self.required,
            });
        }

        debug!(
            ?target,
            stored = self.stored(),
            required = self.required,
            errors = self.errors,
            "PutQuery: failed"
        );

        Err(PutError::Partial {
            stored: self.stored(),
            required: self.required,
        })
    }
}

#[derive(Debug, Clone)]
/// Outcome of a successful store.
pub struct StoreReport {
    target: Id,
    value: Value,
    stored_at: Vec<NodeInfo>,
    required: usize,
}

impl StoreReport {
    /// The key id the value was stored under.
    pub fn target(&self) -> &Id {
        &self.target
    }

    /// The signed value as it was sent.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Nodes that acknowledged the value, in the order they did.
    pub fn stored_at(&self) -> &[NodeInfo] {
        &self.stored_at
    }

    pub fn required(&self) -> usize {
        self.required
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Store errors
pub enum PutError {
    /// Failed to find any nodes close to the key, usually means the client failed
    /// to bootstrap.
    #[error("Failed to find any nodes close to store value at")]
    NoClosestNodes,

    /// The value has a field too long to encode, nothing was sent.
    #[error("Value field of {size} bytes exceeds the {max} bytes limit")]
    TooLarge { size: usize, max: usize },

    /// Every candidate was tried and fewer than `required` acknowledged the value.
    #[error("Stored at {stored} nodes out of {required} required")]
    Partial { stored: usize, required: usize },

    /// The call was cancelled or ran out of time, after `stored` nodes acknowledged.
    #[error("{error} after storing at {stored} nodes")]
    Context { error: ContextError, stored: usize },

    #[error("Client is closed")]
    Closed { stored: usize },
}

impl PutError {
    /// Number of nodes that acknowledged the value before the store failed.
    pub fn stored(&self) -> usize {
        match self {
            PutError::Partial { stored, .. }
            | PutError::Context { stored, .. }
            | PutError::Closed { stored } => *stored,
            PutError::NoClosestNodes | PutError::TooLarge { .. } => 0,
        }
    }
}
