//! Kademlia node Id or a lookup target
use rand::Rng;
use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

/// The size of node IDs in bytes.
pub const ID_SIZE: usize = 32;
/// The maximum [Id::distance] between two ids.
pub const MAX_DISTANCE: u16 = ID_SIZE as u16 * 8;

#[derive(Clone, Copy, PartialEq, Ord, PartialOrd, Eq, Hash)]
/// 256-bit identifier of a DHT node, a key, or an ADNL address.
pub struct Id([u8; ID_SIZE]);

impl Id {
    /// Create a random Id.
    pub fn random() -> Id {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; ID_SIZE] = rng.gen();

        Id(random_bytes)
    }

    /// Create a new Id from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE](crate::common::ID_SIZE).
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Id, InvalidIdSize> {
        let bytes = bytes.as_ref();
        if bytes.len() != ID_SIZE {
            return Err(InvalidIdSize(bytes.len()));
        }

        let mut tmp: [u8; ID_SIZE] = [0; ID_SIZE];
        tmp[..ID_SIZE].clone_from_slice(&bytes[..ID_SIZE]);

        Ok(Id(tmp))
    }

    /// Bitwise XOR of this Id and another.
    ///
    /// Comparing the results as big endian unsigned integers (which is what
    /// the derived [Ord] does) ranks ids by their Kademlia distance.
    pub fn xor(&self, other: &Id) -> Id {
        let mut result = [0_u8; ID_SIZE];

        for (i, (a, b)) in self.0.iter().zip(other.0.iter()).enumerate() {
            result[i] = a ^ b;
        }

        result.into()
    }

    /// Simplified XOR distance between this Id and a target Id.
    ///
    /// The distance is the number of significant bits in the XOR result.
    ///
    /// Distance to self is 0
    /// Distance to the furthest Id is 256
    /// Distance to an Id with 5 leading matching bits is 251
    pub fn distance(&self, other: &Id) -> u16 {
        for i in 0..ID_SIZE {
            let a = self.0[i];
            let b = other.0[i];

            if a != b {
                // leading zeros so far + leading zeros of this byte
                let leading_zeros = (i as u32 * 8 + (a ^ b).leading_zeros()) as u16;

                return MAX_DISTANCE - leading_zeros;
            }
        }

        0
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Lowercase hex encoding, used as the key of the node registry maps.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; ID_SIZE]> for Id {
    fn from(bytes: [u8; ID_SIZE]) -> Id {
        Id(bytes)
    }
}

impl From<Id> for [u8; ID_SIZE] {
    fn from(value: Id) -> Self {
        value.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.to_hex())
    }
}

impl FromStr for Id {
    type Err = DecodeIdError;

    fn from_str(s: &str) -> Result<Id, DecodeIdError> {
        let bytes = hex::decode(s)?;

        Ok(Id::from_bytes(bytes)?)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid Id size, expected {ID_SIZE}, got {0}")]
pub struct InvalidIdSize(pub usize);

#[derive(Debug, thiserror::Error)]
/// Errors decoding an [Id] from a hex string.
pub enum DecodeIdError {
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),

    #[error(transparent)]
    InvalidIdSize(#[from] InvalidIdSize),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn distance_to_self() {
        let id = Id::random();
        let distance = id.distance(&id);
        assert_eq!(distance, 0)
    }

    #[test]
    fn distance_to_id() {
        let id = Id::from_str("0639A1E24FBB8AB277DF033476AB0DE10FAB3BDC0639A1E24FBB8AB277DF0334")
            .unwrap();

        let target =
            Id::from_str("035B1AEB9737ADE1A80933594F405D3F772AA08E035B1AEB9737ADE1A8093359")
                .unwrap();

        let distance = id.distance(&target);

        // 0x06 ^ 0x03 = 0b101, five leading matching bits.
        assert_eq!(distance, 251)
    }

    #[test]
    fn distance_to_random_id() {
        let id = Id::random();
        let target = Id::random();

        let distance = id.distance(&target);

        assert_ne!(distance, 0)
    }

    #[test]
    fn distance_to_furthest() {
        let id = Id::random();

        let mut opposite = [0_u8; ID_SIZE];
        for (i, &value) in id.as_bytes().iter().enumerate() {
            opposite[i] = value ^ 0xff;
        }
        let target = Id::from(opposite);

        let distance = id.distance(&target);

        assert_eq!(distance, MAX_DISTANCE)
    }

    #[test]
    fn xor_orders_by_closeness() {
        let target = Id::from([0_u8; ID_SIZE]);

        let mut near = [0_u8; ID_SIZE];
        near[ID_SIZE - 1] = 1;
        let mut far = [0_u8; ID_SIZE];
        far[0] = 1;

        let near = Id::from(near);
        let far = Id::from(far);

        assert!(near.xor(&target) < far.xor(&target));
        assert_eq!(near.xor(&near), target);
        assert_eq!(near.xor(&far), far.xor(&near));
    }

    #[test]
    fn hex_round_trip() {
        let id = Id::random();

        assert_eq!(Id::from_str(&id.to_string()).unwrap(), id);
        assert!(matches!(
            Id::from_str("abcd"),
            Err(DecodeIdError::InvalidIdSize(InvalidIdSize(2)))
        ));
        assert!(matches!(Id::from_str("zz"), Err(DecodeIdError::Hex(_))));
    }
}
