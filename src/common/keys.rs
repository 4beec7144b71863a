//! Public key variants used as node and owner identities.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use super::tl::{self, DecodeError, Reader, Writer};
use super::Id;

const ED25519_SCHEMA: &str = "pub.ed25519 key:int256 = PublicKey";

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
/// A public identity, tagged on the wire by its constructor.
pub enum PublicKey {
    Ed25519([u8; 32]),
}

impl PublicKey {
    /// The key id (ADNL address or DHT node id): SHA-256 of the boxed key.
    pub fn id(&self) -> Id {
        let mut w = Writer::new();
        self.write(&mut w);

        let digest: [u8; 32] = Sha256::digest(w.into_bytes()).into();

        digest.into()
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        match self {
            PublicKey::Ed25519(key) => key,
        }
    }

    /// Verify a detached signature produced by this key over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
        match self {
            PublicKey::Ed25519(key) => {
                let key =
                    VerifyingKey::from_bytes(key).map_err(|_| SignatureError::InvalidPublicKey)?;
                let signature = Signature::from_slice(signature)
                    .map_err(|_| SignatureError::InvalidSignature)?;

                key.verify(message, &signature)
                    .map_err(|_| SignatureError::InvalidSignature)
            }
        }
    }

    pub(crate) fn write(&self, w: &mut Writer) {
        match self {
            PublicKey::Ed25519(key) => {
                w.u32(tl::constructor_id(ED25519_SCHEMA));
                w.int256(key);
            }
        }
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match r.u32()? {
            id if id == tl::constructor_id(ED25519_SCHEMA) => Ok(PublicKey::Ed25519(r.int256()?)),
            id => Err(DecodeError::UnknownConstructor(id)),
        }
    }
}

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        PublicKey::Ed25519(key.to_bytes())
    }
}

impl From<&ed25519_dalek::SigningKey> for PublicKey {
    fn from(key: &ed25519_dalek::SigningKey) -> Self {
        key.verifying_key().into()
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublicKey::Ed25519(key) => write!(f, "Ed25519({})", hex::encode(key)),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Invalid ed25519 public key")]
    InvalidPublicKey,

    #[error("Invalid signature")]
    InvalidSignature,
}
