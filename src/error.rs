//! Main Crate Error

use crate::client::ConfigError;
use crate::common::tl::DecodeError;
use crate::context::ContextError;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors of the lookup operations of [crate::Client].
pub enum Error {
    /// The lookup exhausted every reachable node without finding what it was looking for.
    #[error("Not found")]
    NotFound,

    /// The caller's context was cancelled or passed its deadline.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// [crate::Client::close] was called.
    #[error("Client is closed")]
    Closed,

    /// A value was found, but its data does not decode as expected.
    #[error("Malformed value data: {0}")]
    Malformed(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
