//! Iterative FindNode and FindValue lookups.

use std::thread;

use tracing::{debug, trace};

use super::{Client, QueryError};
use crate::common::{tl, AddressList, Id, Key, NodeInfo, PublicKey, Request, Response, Value};
use crate::context::{Context, RecvError};
use crate::core::{IterativeQuery, LookupTrace, RoundOutcome};
use crate::Error;

/// What a lookup asks every node for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Find {
    Nodes,
    Value,
}

/// State of a finished lookup.
pub(crate) struct Lookup {
    pub query: IterativeQuery,
    /// A valid value under the target, for FindValue lookups that found one.
    pub value: Option<Value>,
}

impl Client {
    // === Public Methods ===

    /// Find the value stored under `key`.
    ///
    /// Only values whose key description and value signatures check out, and whose key
    /// matches `key`, are returned. Expiry is left to the caller, see [Value::is_expired].
    pub fn find_value(&self, ctx: &Context, key: &Key) -> Result<Value, Error> {
        self.lookup(ctx, key.id(), Find::Value)?
            .value
            .ok_or(Error::NotFound)
    }

    /// Find the endpoints published by the ADNL address `id`, along with its public key.
    pub fn find_addresses(&self, ctx: &Context, id: &Id) -> Result<(AddressList, PublicKey), Error> {
        let value = self.find_value(ctx, &Key::address(*id))?;

        let addresses: AddressList = tl::from_bytes(&value.data)?;

        Ok((addresses, *value.owner()))
    }

    /// Find the closest nodes to `target` that answered, closest first.
    pub fn find_nodes(&self, ctx: &Context, target: Id) -> Result<Vec<NodeInfo>, Error> {
        let responders = self.find_node_query(ctx, target)?.into_responders();

        if responders.is_empty() {
            return Err(Error::NotFound);
        }

        Ok(responders)
    }

    /// Run a FindNode lookup and return its best distance per round.
    pub fn trace_lookup(&self, ctx: &Context, target: Id) -> Result<LookupTrace, Error> {
        Ok(self.find_node_query(ctx, target)?.trace().clone())
    }

    // === Private Methods ===

    pub(crate) fn find_node_query(
        &self,
        ctx: &Context,
        target: Id,
    ) -> Result<IterativeQuery, Error> {
        Ok(self.lookup(ctx, target, Find::Nodes)?.query)
    }

    /// Query the closest unvisited nodes round after round, until a value is found,
    /// the frontier is exhausted, or `ctx` is done.
    fn lookup(&self, ctx: &Context, target: Id, find: Find) -> Result<Lookup, Error> {
        let request = match find {
            Find::Nodes => Request::FindNode {
                key: target,
                k: self.k(),
            },
            Find::Value => Request::FindValue {
                key: target,
                k: self.k(),
            },
        };

        let config = self.config();

        let seeds = {
            let registry = self.read();
            if registry.is_closed() {
                return Err(Error::Closed);
            }
            registry.known_nodes()
        };

        let mut query = IterativeQuery::new(target, request, config.k, config.a);
        for node in seeds {
            query.add_candidate(node);
        }

        while query.rounds() < config.max_rounds {
            ctx.check()?;

            let batch = query.next_round();
            if batch.is_empty() {
                break;
            }

            if let Some(value) = self.round(ctx, &mut query, batch)? {
                return Ok(Lookup {
                    query,
                    value: Some(value),
                });
            }

            if self.read().is_closed() {
                return Err(Error::Closed);
            }

            if query.finish_round() == RoundOutcome::Exhausted {
                return Ok(Lookup { query, value: None });
            }
        }

        debug!(
            ?target,
            rounds = query.rounds(),
            "Lookup stopped with no node left to query"
        );

        Ok(Lookup { query, value: None })
    }

    /// Query `batch` concurrently, merging responses into `query`.
    fn round(
        &self,
        ctx: &Context,
        query: &mut IterativeQuery,
        batch: Vec<NodeInfo>,
    ) -> Result<Option<Value>, Error> {
        let round_ctx = ctx.child();
        let request = query.request().clone();
        let (sender, receiver) = flume::unbounded::<(NodeInfo, Result<Response, QueryError>)>();

        thread::scope(|s| {
            for node in batch {
                let sender = sender.clone();
                let (round_ctx, request) = (&round_ctx, &request);

                s.spawn(move || {
                    let result = self.query_node(round_ctx, &node, request);

                    let _ = sender.send((node, result));
                });
            }
            drop(sender);

            let outcome = loop {
                match ctx.recv(&receiver) {
                    Ok((node, Ok(response))) => {
                        if let Some(value) = self.handle_response(query, node, response) {
                            break Ok(Some(value));
                        }
                    }
                    Ok((node, Err(error))) => {
                        debug!(address = node.address(), ?error, "Node failed");
                        query.add_failure(&node);
                    }
                    Err(RecvError::Disconnected) => break Ok(None),
                    Err(RecvError::Context(error)) => break Err(Error::Context(error)),
                };
            };

            // Abandon siblings still in flight, the scope joins them.
            round_ctx.cancel();

            outcome
        })
    }

    fn handle_response(
        &self,
        query: &mut IterativeQuery,
        node: NodeInfo,
        response: Response,
    ) -> Option<Value> {
        match response {
            Response::ValueFound(value) => {
                let target = query.target();

                match value.verify() {
                    Ok(()) if value.key().id() == target => {
                        debug!(?target, address = node.address(), "Found value");
                        query.add_responder(node);

                        return Some(value);
                    }
                    Ok(()) => {
                        debug!(?target, address = node.address(), "Value for another key");
                    }
                    Err(error) => {
                        debug!(?target, address = node.address(), ?error, "Invalid value");
                    }
                }

                query.add_failure(&node);
            }
            Response::Nodes(nodes) | Response::ValueNotFound(nodes) => {
                trace!(address = node.address(), count = nodes.len(), "Got nodes");
                query.add_responder(node);

                for candidate in nodes {
                    match NodeInfo::try_from(candidate) {
                        Ok(info) => {
                            self.write().discover(info.clone());
                            query.add_candidate(info);
                        }
                        Err(error) => {
                            debug!(?error, "Invalid node in response");
                        }
                    }
                }
            }
            Response::Pong { .. } | Response::Stored => {
                query.add_failure(&node);
            }
        }

        None
    }
}
