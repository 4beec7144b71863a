//! Helper functions and structs for signed DHT values.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};

use super::keys::SignatureError;
use super::tl::{self, DecodeError, Reader, Schema, Writer};
use super::{Id, PublicKey};

/// Name of the key under which an ADNL address publishes its [super::AddressList].
pub const ADDRESS_KEY_NAME: &[u8] = b"address";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Logical locator of a record: the owner, a name and an index.
pub struct Key {
    /// Id of the owner, the hash of its public key for signature-ruled keys.
    pub owner: Id,
    pub name: Bytes,
    pub index: i32,
}

impl Key {
    pub fn new(owner: Id, name: impl Into<Bytes>, index: i32) -> Self {
        Self {
            owner,
            name: name.into(),
            index,
        }
    }

    /// The key an ADNL address publishes its endpoints under.
    pub fn address(owner: Id) -> Self {
        Self::new(owner, Bytes::from_static(ADDRESS_KEY_NAME), 0)
    }

    /// The key id, SHA-256 of the boxed key. This is the lookup target.
    pub fn id(&self) -> Id {
        let digest: [u8; 32] = Sha256::digest(tl::to_bytes(self)).into();

        digest.into()
    }
}

impl Schema for Key {
    const SCHEMA: &'static str = "dht.key id:int256 name:bytes idx:int = dht.Key";

    fn write_fields(&self, w: &mut Writer) {
        w.int256(self.owner.as_bytes());
        w.bytes(&self.name);
        w.i32(self.index);
    }

    fn read_fields(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            owner: r.int256()?.into(),
            name: r.bytes()?.into(),
            index: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Who is allowed to update the value stored under a key.
pub enum UpdateRule {
    /// Only the owner, proven by signatures.
    Signature,
    Anybody,
    OverlayNodes,
}

impl UpdateRule {
    const SIGNATURE: &'static str = "dht.updateRule.signature = dht.UpdateRule";
    const ANYBODY: &'static str = "dht.updateRule.anybody = dht.UpdateRule";
    const OVERLAY_NODES: &'static str = "dht.updateRule.overlayNodes = dht.UpdateRule";

    fn schema(&self) -> &'static str {
        match self {
            UpdateRule::Signature => Self::SIGNATURE,
            UpdateRule::Anybody => Self::ANYBODY,
            UpdateRule::OverlayNodes => Self::OVERLAY_NODES,
        }
    }

    fn write(&self, w: &mut Writer) {
        w.u32(tl::constructor_id(self.schema()));
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let id = r.u32()?;

        [
            UpdateRule::Signature,
            UpdateRule::Anybody,
            UpdateRule::OverlayNodes,
        ]
        .into_iter()
        .find(|rule| tl::constructor_id(rule.schema()) == id)
        .ok_or(DecodeError::UnknownConstructor(id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Binds a [Key] to the identity allowed to update it.
pub struct KeyDescription {
    pub key: Key,
    /// Public key of the owner.
    pub id: PublicKey,
    pub update_rule: UpdateRule,
    pub signature: Vec<u8>,
}

impl KeyDescription {
    /// Create a key description for `key`, signed by its owner.
    pub fn new(signer: &SigningKey, key: Key) -> Self {
        let mut description = Self {
            key,
            id: PublicKey::from(signer),
            update_rule: UpdateRule::Signature,
            signature: Vec::new(),
        };

        description.signature = signer.sign(&description.signable()).to_bytes().to_vec();

        description
    }

    pub fn signable(&self) -> Box<[u8]> {
        let mut w = Writer::new();
        w.u32(Self::constructor_id());
        self.write_with_signature(&mut w, &[]);
        w.into_bytes().into()
    }

    /// Check that the key is owned by [Self::id] and that it signed this description.
    pub fn verify(&self) -> Result<(), ValidationError> {
        if self.update_rule != UpdateRule::Signature {
            return Err(ValidationError::UnsupportedUpdateRule(self.update_rule));
        }

        let signer = self.id.id();
        if signer != self.key.owner {
            return Err(ValidationError::OwnerMismatch {
                owner: self.key.owner,
                signer,
            });
        }

        self.id
            .verify(&self.signable(), &self.signature)
            .map_err(ValidationError::KeyDescription)
    }

    fn write_with_signature(&self, w: &mut Writer, signature: &[u8]) {
        w.bare(&self.key);
        self.id.write(w);
        self.update_rule.write(w);
        w.bytes(signature);
    }
}

impl Schema for KeyDescription {
    const SCHEMA: &'static str = "dht.keyDescription key:dht.key id:PublicKey update_rule:dht.UpdateRule signature:bytes = dht.KeyDescription";

    fn write_fields(&self, w: &mut Writer) {
        self.write_with_signature(w, &self.signature);
    }

    fn read_fields(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            key: r.bare()?,
            id: PublicKey::read(r)?,
            update_rule: UpdateRule::read(r)?,
            signature: r.bytes()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A value stored in the DHT, signed by the owner of its key.
pub struct Value {
    pub key_description: KeyDescription,
    pub data: Bytes,
    /// Absolute expiry, in unix seconds.
    pub ttl: i32,
    pub signature: Vec<u8>,
}

impl Value {
    /// Create a signed value for `key` (and its signed description) expiring at `ttl`.
    pub fn new(signer: &SigningKey, key: Key, data: impl Into<Bytes>, ttl: i32) -> Self {
        let mut value = Self {
            key_description: KeyDescription::new(signer, key),
            data: data.into(),
            ttl,
            signature: Vec::new(),
        };

        value.signature = signer.sign(&value.signable()).to_bytes().to_vec();

        value
    }

    pub fn key(&self) -> &Key {
        &self.key_description.key
    }

    /// The owner's public key.
    pub fn owner(&self) -> &PublicKey {
        &self.key_description.id
    }

    pub fn signable(&self) -> Box<[u8]> {
        let mut w = Writer::new();
        w.u32(Self::constructor_id());
        self.write_with_signature(&mut w, &[]);
        w.into_bytes().into()
    }

    /// Check the key description first, then the value signature with the same key.
    pub fn verify(&self) -> Result<(), ValidationError> {
        self.key_description.verify()?;

        self.key_description
            .id
            .verify(&self.signable(), &self.signature)
            .map_err(ValidationError::Value)
    }

    pub fn validate(&self) -> bool {
        self.verify().is_ok()
    }

    /// Returns `true` if [Self::ttl] is in the past.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        let now = now
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs())
            .unwrap_or(0);

        (self.ttl as i64) < now as i64
    }

    fn write_with_signature(&self, w: &mut Writer, signature: &[u8]) {
        w.bare(&self.key_description);
        w.bytes(&self.data);
        w.i32(self.ttl);
        w.bytes(signature);
    }
}

impl Schema for Value {
    const SCHEMA: &'static str =
        "dht.value key:dht.keyDescription value:bytes ttl:int signature:bytes = dht.Value";

    fn write_fields(&self, w: &mut Writer) {
        self.write_with_signature(w, &self.signature);
    }

    fn read_fields(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            key_description: r.bare()?,
            data: r.bytes()?.into(),
            ttl: r.i32()?,
            signature: r.bytes()?,
        })
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Reasons a node record or a value is not trusted.
pub enum ValidationError {
    #[error("Invalid node signature: {0}")]
    Node(SignatureError),

    #[error("Invalid key description signature: {0}")]
    KeyDescription(SignatureError),

    #[error("Invalid value signature: {0}")]
    Value(SignatureError),

    #[error("Key owner {owner} is not the signing key {signer}")]
    OwnerMismatch { owner: Id, signer: Id },

    #[error("Unsupported update rule {0:?}")]
    UnsupportedUpdateRule(UpdateRule),

    #[error("Node announced no address")]
    NoAddress,
}
