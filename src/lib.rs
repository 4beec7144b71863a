#![doc = include_str!("../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

// Public modules
mod common;
mod error;

#[cfg(feature = "async")]
pub mod async_client;
pub mod client;
pub mod context;
pub mod core;
pub mod transport;

pub use crate::client::{Client, Config, ConfigSource, Info};
pub use crate::common::{
    tl, AddressList, Id, Key, KeyDescription, Node, NodeInfo, PublicKey, Request, Response,
    UdpAddress, UpdateRule, Value, ADDRESS_KEY_NAME,
};
pub use crate::context::Context;
pub use crate::core::{PutError, StoreReport};
pub use crate::transport::{Peer, Transport};
pub use bytes::Bytes;
pub use error::Error;

pub use ed25519_dalek::SigningKey;

pub mod errors {
    //! Exported errors

    pub use super::client::{ConfigError, QueryError};
    pub use super::common::{
        tl::DecodeError, DecodeIdError, InvalidIdSize, SignatureError, ValidationError,
    };
    pub use super::context::{ContextError, RecvError};
    pub use super::core::PutError;
    pub use super::transport::TransportError;
    pub use super::Error;
}
