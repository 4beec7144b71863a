//! Serialize and deserialize DHT requests and responses.

use super::tl::{self, DecodeError, Reader, Writer};
use super::{Id, Node, Value};

const PING: &str = "dht.ping random_id:long = dht.Pong";
const PONG: &str = "dht.pong random_id:long = dht.Pong";
const FIND_NODE: &str = "dht.findNode key:int256 k:int = dht.Nodes";
const FIND_VALUE: &str = "dht.findValue key:int256 k:int = dht.ValueResult";
const STORE: &str = "dht.store value:dht.value = dht.Stored";

const NODES: &str = "dht.nodes nodes:vector dht.node = dht.Nodes";
const VALUE_FOUND: &str = "dht.valueFound value:dht.Value = dht.ValueResult";
const VALUE_NOT_FOUND: &str = "dht.valueNotFound nodes:dht.nodes = dht.ValueResult";
const STORED: &str = "dht.stored = dht.Stored";

#[derive(Debug, PartialEq, Clone)]
pub enum Request {
    /// Liveness probe, answered with a [Response::Pong] echoing `random_id`.
    Ping { random_id: i64 },
    /// Ask for the `k` closest nodes to `key`.
    FindNode { key: Id, k: i32 },
    /// Ask for the value stored under `key`, or the `k` closest nodes to it.
    FindValue { key: Id, k: i32 },
    Store { value: Value },
}

#[derive(Debug, PartialEq, Clone)]
pub enum Response {
    Pong { random_id: i64 },
    Nodes(Vec<Node>),
    ValueFound(Value),
    ValueNotFound(Vec<Node>),
    Stored,
}

impl Request {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();

        match self {
            Request::Ping { random_id } => {
                w.u32(tl::constructor_id(PING));
                w.i64(*random_id);
            }
            Request::FindNode { key, k } => {
                w.u32(tl::constructor_id(FIND_NODE));
                w.int256(key.as_bytes());
                w.i32(*k);
            }
            Request::FindValue { key, k } => {
                w.u32(tl::constructor_id(FIND_VALUE));
                w.int256(key.as_bytes());
                w.i32(*k);
            }
            Request::Store { value } => {
                w.u32(tl::constructor_id(STORE));
                w.bare(value);
            }
        }

        w.into_bytes()
    }

    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Request, DecodeError> {
        let mut r = Reader::new(bytes.as_ref());

        let request = match r.u32()? {
            id if id == tl::constructor_id(PING) => Request::Ping {
                random_id: r.i64()?,
            },
            id if id == tl::constructor_id(FIND_NODE) => Request::FindNode {
                key: r.int256()?.into(),
                k: r.i32()?,
            },
            id if id == tl::constructor_id(FIND_VALUE) => Request::FindValue {
                key: r.int256()?.into(),
                k: r.i32()?,
            },
            id if id == tl::constructor_id(STORE) => Request::Store { value: r.bare()? },
            id => return Err(DecodeError::UnknownConstructor(id)),
        };

        r.finish()?;

        Ok(request)
    }

    /// Returns `true` if `response` is a valid answer to this request.
    pub fn expects(&self, response: &Response) -> bool {
        matches!(
            (self, response),
            (Request::Ping { .. }, Response::Pong { .. })
                | (Request::FindNode { .. }, Response::Nodes(_))
                | (Request::FindValue { .. }, Response::ValueFound(_))
                | (Request::FindValue { .. }, Response::ValueNotFound(_))
                | (Request::Store { .. }, Response::Stored)
        )
    }
}

impl Response {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();

        match self {
            Response::Pong { random_id } => {
                w.u32(tl::constructor_id(PONG));
                w.i64(*random_id);
            }
            Response::Nodes(nodes) => {
                w.u32(tl::constructor_id(NODES));
                w.vector(nodes, |w, node| w.bare(node));
            }
            Response::ValueFound(value) => {
                w.u32(tl::constructor_id(VALUE_FOUND));
                w.boxed(value);
            }
            Response::ValueNotFound(nodes) => {
                w.u32(tl::constructor_id(VALUE_NOT_FOUND));
                w.vector(nodes, |w, node| w.bare(node));
            }
            Response::Stored => {
                w.u32(tl::constructor_id(STORED));
            }
        }

        w.into_bytes()
    }

    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Response, DecodeError> {
        let mut r = Reader::new(bytes.as_ref());

        let response = match r.u32()? {
            id if id == tl::constructor_id(PONG) => Response::Pong {
                random_id: r.i64()?,
            },
            id if id == tl::constructor_id(NODES) => Response::Nodes(r.vector(|r| r.bare())?),
            id if id == tl::constructor_id(VALUE_FOUND) => Response::ValueFound(r.boxed()?),
            id if id == tl::constructor_id(VALUE_NOT_FOUND) => {
                Response::ValueNotFound(r.vector(|r| r.bare())?)
            }
            id if id == tl::constructor_id(STORED) => Response::Stored,
            id => return Err(DecodeError::UnknownConstructor(id)),
        };

        r.finish()?;

        Ok(response)
    }

    /// Closer nodes carried by this response, if any.
    pub fn nodes(&self) -> Option<&[Node]> {
        match self {
            Response::Nodes(nodes) | Response::ValueNotFound(nodes) => Some(nodes),
            Response::Pong { .. } | Response::ValueFound(_) | Response::Stored => None,
        }
    }
}
