//! AsyncClient.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use ed25519_dalek::SigningKey;

use crate::{
    client::{Client, Config, Info},
    common::{AddressList, Id, Key, NodeInfo, PublicKey, Value},
    context::Context,
    core::{PutError, StoreReport},
    transport::Transport,
    Error,
};

impl Client {
    /// Return an async version of the client.
    pub fn as_async(self) -> AsyncClient {
        AsyncClient(self)
    }
}

#[derive(Debug, Clone)]
/// Async version of the [Client].
///
/// Every call runs the blocking operation on its own thread and awaits its result,
/// so it never blocks the executor.
pub struct AsyncClient(Client);

impl AsyncClient {
    /// Async version of [Client::open].
    pub async fn open(
        ctx: &Context,
        transport: Arc<dyn Transport>,
        config: Config,
    ) -> Result<AsyncClient, Error> {
        let ctx = ctx.clone();

        run(move || Client::open(&ctx, transport, config))
            .await
            .unwrap_or(Err(Error::Closed))
            .map(Client::as_async)
    }

    // === Getters ===

    /// Information and statistics about this client.
    pub fn info(&self) -> Info {
        self.0.info()
    }

    pub fn known_nodes(&self) -> Vec<NodeInfo> {
        self.0.known_nodes()
    }

    pub fn active_nodes(&self) -> Vec<NodeInfo> {
        self.0.active_nodes()
    }

    /// Return the blocking version of this client.
    pub fn as_blocking(&self) -> &Client {
        &self.0
    }

    // === Public Methods ===

    pub fn close(&self) {
        self.0.close()
    }

    /// Async version of [Client::find_value].
    pub async fn find_value(&self, ctx: &Context, key: &Key) -> Result<Value, Error> {
        let (client, ctx, key) = (self.0.clone(), ctx.clone(), key.clone());

        run(move || client.find_value(&ctx, &key))
            .await
            .unwrap_or(Err(Error::Closed))
    }

    /// Async version of [Client::find_addresses].
    pub async fn find_addresses(
        &self,
        ctx: &Context,
        id: &Id,
    ) -> Result<(AddressList, PublicKey), Error> {
        let (client, ctx, id) = (self.0.clone(), ctx.clone(), *id);

        run(move || client.find_addresses(&ctx, &id))
            .await
            .unwrap_or(Err(Error::Closed))
    }

    /// Async version of [Client::find_nodes].
    pub async fn find_nodes(&self, ctx: &Context, target: Id) -> Result<Vec<NodeInfo>, Error> {
        let (client, ctx) = (self.0.clone(), ctx.clone());

        run(move || client.find_nodes(&ctx, target))
            .await
            .unwrap_or(Err(Error::Closed))
    }

    /// Async version of [Client::store].
    #[allow(clippy::too_many_arguments)]
    pub async fn store(
        &self,
        ctx: &Context,
        name: impl Into<Bytes>,
        index: i32,
        data: impl Into<Bytes>,
        ttl: Duration,
        signer: &SigningKey,
        copies: usize,
    ) -> Result<StoreReport, PutError> {
        let (client, ctx, signer) = (self.0.clone(), ctx.clone(), signer.clone());
        let (name, data) = (name.into(), data.into());

        run(move || client.store(&ctx, name, index, data, ttl, &signer, copies))
            .await
            .unwrap_or(Err(PutError::Closed { stored: 0 }))
    }

    /// Async version of [Client::put].
    pub async fn put(
        &self,
        ctx: &Context,
        value: Value,
        copies: usize,
    ) -> Result<StoreReport, PutError> {
        let (client, ctx) = (self.0.clone(), ctx.clone());

        run(move || client.put(&ctx, value, copies))
            .await
            .unwrap_or(Err(PutError::Closed { stored: 0 }))
    }
}

/// Run `f` on a new thread and await its result.
///
/// Returns `None` if the thread died before sending one.
async fn run<T, F>(f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = flume::bounded::<T>(1);

    thread::spawn(move || {
        let _ = sender.send(f());
    });

    receiver.recv_async().await.ok()
}
