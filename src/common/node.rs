//! Signed DHT node records.

use ed25519_dalek::{Signer, SigningKey};

use super::tl::{DecodeError, Reader, Schema, Writer};
use super::{AddressList, Id, PublicKey, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq)]
/// A DHT node as announced by itself: its identity key, its endpoints, and a
/// signature by that key over the whole record.
pub struct Node {
    pub id: PublicKey,
    pub addr_list: AddressList,
    /// Announce version, conventionally the unix time the record was signed.
    pub version: i32,
    pub signature: Vec<u8>,
}

impl Node {
    /// Create and sign a node record.
    pub fn new(signer: &SigningKey, addr_list: AddressList, version: i32) -> Self {
        let mut node = Self {
            id: PublicKey::from(signer),
            addr_list,
            version,
            signature: Vec::new(),
        };

        node.signature = signer.sign(&node.signable()).to_bytes().to_vec();

        node
    }

    /// The node id, derived from its public key.
    pub fn node_id(&self) -> Id {
        self.id.id()
    }

    /// The endpoint this node should be reached at, if it announced any.
    pub fn address(&self) -> Option<String> {
        self.addr_list.first_address()
    }

    /// Boxed serialization with an empty signature, which is what gets signed.
    pub fn signable(&self) -> Box<[u8]> {
        let mut w = Writer::new();
        w.u32(Self::constructor_id());
        self.write_with_signature(&mut w, &[]);
        w.into_bytes().into()
    }

    /// Check the embedded signature against the node's own key.
    pub fn verify(&self) -> Result<(), ValidationError> {
        self.id
            .verify(&self.signable(), &self.signature)
            .map_err(ValidationError::Node)
    }

    pub fn validate(&self) -> bool {
        self.verify().is_ok()
    }

    fn write_with_signature(&self, w: &mut Writer, signature: &[u8]) {
        self.id.write(w);
        w.bare(&self.addr_list);
        w.i32(self.version);
        w.bytes(signature);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A [Node] whose signature was checked, with its id and address resolved.
pub struct NodeInfo {
    id: Id,
    address: String,
    node: Node,
}

impl NodeInfo {
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Endpoint formatted as `ip:port`.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn key(&self) -> &PublicKey {
        &self.node.id
    }

    /// The signed record this node announced.
    pub fn node(&self) -> &Node {
        &self.node
    }
}

impl TryFrom<Node> for NodeInfo {
    type Error = ValidationError;

    /// Validate the node's signature and resolve its first address.
    fn try_from(node: Node) -> Result<Self, ValidationError> {
        node.verify()?;

        let address = node.address().ok_or(ValidationError::NoAddress)?;

        Ok(Self {
            id: node.node_id(),
            address,
            node,
        })
    }
}

impl Schema for Node {
    const SCHEMA: &'static str =
        "dht.node id:PublicKey addr_list:adnl.addressList version:int signature:bytes = dht.Node";

    fn write_fields(&self, w: &mut Writer) {
        self.write_with_signature(w, &self.signature);
    }

    fn read_fields(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            id: PublicKey::read(r)?,
            addr_list: r.bare()?,
            version: r.i32()?,
            signature: r.bytes()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use base64::{engine::general_purpose::STANDARD, Engine as _};

    use super::*;
    use crate::common::{tl, UdpAddress};

    fn static_node(key: &str, ip: i32, port: i32, signature: &str) -> Node {
        Node {
            id: PublicKey::Ed25519(STANDARD.decode(key).unwrap().try_into().unwrap()),
            addr_list: AddressList {
                addresses: vec![UdpAddress { ip, port }],
                ..Default::default()
            },
            version: -1,
            signature: STANDARD.decode(signature).unwrap(),
        }
    }

    #[test]
    fn validate_static_node() {
        let node = static_node(
            "6PGkPQSbyFp12esf1NqmDOaLoFA8i9+Mp5+cAx5wtTU=",
            -1185526007,
            22096,
            "L4N1+dzXLlkmT5iPnvsmsixzXU0L6kPKApqMdcrGP5d9ssMhn69SzHFK+yIzvG6zQ9oRb4TnqPBaKShjjj2OBg==",
        );

        assert!(node.validate());
        assert_eq!(node.address().unwrap(), "185.86.79.9:22096");
        assert_eq!(
            node.node_id().to_string(),
            "affc36e90c058db75495fff898204297ea9118e49d4118e7946a54c0d02f603a"
        );
    }

    #[test]
    fn tampered_node() {
        let mut node = static_node(
            "bn8klhFZgE2sfIDfvVI6m6+oVNi1nBRlnHoxKtR9WBU=",
            -1307380860,
            15888,
            "fQ5zAa6ot4pfFWzvuJOR8ijM5ELWndSDsRhFKstW1tqVSNfwAdOC7tDC8mc4vgTJ6fSYSWmhnXGK/+T5f6sDCw==",
        );
        assert!(node.validate());

        node.addr_list.addresses[0].port += 1;

        assert!(!node.validate());
    }

    #[test]
    fn sign_and_decode() {
        let signer = SigningKey::from_bytes(&[7; 32]);
        let node = Node::new(
            &signer,
            AddressList {
                addresses: vec![UdpAddress::new(Ipv4Addr::new(6, 6, 6, 6), 65432)],
                ..Default::default()
            },
            1671102718,
        );

        assert!(node.validate());

        let bytes = tl::to_bytes(&node);
        let decoded: Node = tl::from_bytes(&bytes).unwrap();

        assert_eq!(decoded, node);
        assert!(decoded.validate());
    }

    #[test]
    fn node_info_requires_a_valid_address() {
        let signer = SigningKey::from_bytes(&[8; 32]);

        let node = Node::new(&signer, AddressList::default(), 1);
        assert_eq!(NodeInfo::try_from(node), Err(ValidationError::NoAddress));

        let mut node = Node::new(
            &signer,
            AddressList {
                addresses: vec![UdpAddress::new(Ipv4Addr::LOCALHOST, 3000)],
                ..Default::default()
            },
            1,
        );
        let info = NodeInfo::try_from(node.clone()).unwrap();
        assert_eq!(info.address(), "127.0.0.1:3000");
        assert_eq!(info.id(), &PublicKey::from(&signer).id());

        node.version = 2;
        assert!(matches!(
            NodeInfo::try_from(node),
            Err(ValidationError::Node(_))
        ));
    }

    #[test]
    fn known_constructor() {
        assert_eq!(Node::constructor_id(), 0x84533248);
    }
}
