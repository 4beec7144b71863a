//! Replicated store of signed values.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use ed25519_dalek::SigningKey;
use tracing::debug;

use super::{Client, QueryError};
use crate::common::{tl::MAX_BYTES_LEN, Key, NodeInfo, PublicKey, Request, Response, Value};
use crate::context::{Context, RecvError};
use crate::core::{PutError, PutQuery, StoreReport};
use crate::Error;

impl Client {
    /// Sign `data` under the key (`signer`'s id, `name`, `index`), expiring `ttl`
    /// from now, and store it at `copies` of the closest nodes to the key.
    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        ctx: &Context,
        name: impl Into<Bytes>,
        index: i32,
        data: impl Into<Bytes>,
        ttl: Duration,
        signer: &SigningKey,
        copies: usize,
    ) -> Result<StoreReport, PutError> {
        let key = Key::new(PublicKey::from(signer).id(), name, index);
        let value = Value::new(signer, key, data, expire_at(SystemTime::now(), ttl));

        self.put(ctx, value, copies)
    }

    /// Store an already signed value at `copies` of the closest nodes to its key.
    ///
    /// Candidates are tried closest first, with at most
    /// [super::Config::store_fan_out] requests in flight.
    pub fn put(&self, ctx: &Context, value: Value, copies: usize) -> Result<StoreReport, PutError> {
        let size = value.data.len().max(value.key().name.len());
        if size > MAX_BYTES_LEN {
            return Err(PutError::TooLarge {
                size,
                max: MAX_BYTES_LEN,
            });
        }

        let target = value.key().id();

        let candidates = self
            .find_node_query(ctx, target)
            .map_err(|error| match error {
                Error::Closed => PutError::Closed { stored: 0 },
                Error::Context(error) => PutError::Context { error, stored: 0 },
                _ => PutError::NoClosestNodes,
            })?
            .store_candidates();

        if candidates.is_empty() {
            return Err(PutError::NoClosestNodes);
        }

        let mut query = PutQuery::new(target, candidates, copies, self.config().store_fan_out);

        let request = Request::Store {
            value: value.clone(),
        };
        let store_ctx = ctx.child();
        let (sender, receiver) = flume::unbounded::<(NodeInfo, Result<Response, QueryError>)>();

        thread::scope(|s| {
            let outcome = loop {
                for node in query.next_requests() {
                    let sender = sender.clone();
                    let (store_ctx, request) = (&store_ctx, &request);

                    s.spawn(move || {
                        let result = self.query_node(store_ctx, &node, request);

                        let _ = sender.send((node, result));
                    });
                }

                if query.is_done() {
                    break Ok(());
                }

                match ctx.recv(&receiver) {
                    Ok((node, Ok(_))) => query.success(node),
                    Ok((node, Err(error))) => query.error(&node, error),
                    Err(RecvError::Context(error)) => {
                        break Err(PutError::Context {
                            error,
                            stored: query.stored(),
                        })
                    }
                    // Unreachable while `sender` is alive.
                    Err(RecvError::Disconnected) => break Ok(()),
                }
            };

            store_ctx.cancel();

            outcome
        })?;

        if self.read().is_closed() {
            return Err(PutError::Closed {
                stored: query.stored(),
            });
        }

        debug!(?target, stored = query.stored(), "Store done");

        query.into_result(value)
    }
}

/// Absolute expiry in unix seconds, saturating at the end of the `i32` range.
fn expire_at(now: SystemTime, ttl: Duration) -> i32 {
    let now = now
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0);

    i32::try_from(now.saturating_add(ttl.as_secs())).unwrap_or(i32::MAX)
}
