//! Minimal encoder/decoder for the boxed TL binary form of the DHT schema.
//!
//! Every boxed object is prefixed with its constructor id, the CRC-32 of its
//! normalized schema line. Integers are little endian, `bytes` are length
//! prefixed and padded to a multiple of four.

use crc::{Crc, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// `bytes` shorter than this use a single byte length prefix.
const SHORT_BYTES_LIMIT: usize = 254;
/// Longest `bytes` encodable with the 3 byte length prefix.
pub const MAX_BYTES_LEN: usize = (1 << 24) - 1;

/// Constructor id of a normalized schema line.
pub fn constructor_id(schema: &str) -> u32 {
    CRC32.checksum(schema.as_bytes())
}

/// A TL type with a single constructor.
pub trait Schema: Sized {
    /// Normalized schema line, its CRC-32 is the constructor id.
    const SCHEMA: &'static str;

    fn write_fields(&self, w: &mut Writer);

    fn read_fields(r: &mut Reader<'_>) -> Result<Self, DecodeError>;

    fn constructor_id() -> u32 {
        constructor_id(Self::SCHEMA)
    }
}

/// Serialize the boxed form of `value`.
pub fn to_bytes<T: Schema>(value: &T) -> Vec<u8> {
    let mut w = Writer::new();
    w.boxed(value);
    w.into_bytes()
}

/// Deserialize the boxed form of `T`, rejecting trailing bytes.
pub fn from_bytes<T: Schema>(bytes: &[u8]) -> Result<T, DecodeError> {
    let mut r = Reader::new(bytes);
    let value = r.boxed()?;
    r.finish()?;

    Ok(value)
}

#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn int256(&mut self, value: &[u8; 32]) {
        self.buf.extend_from_slice(value);
    }

    /// Write a length prefixed, padded byte string.
    ///
    /// Only the first [MAX_BYTES_LEN] bytes fit the prefix, anything past them is dropped.
    pub fn bytes(&mut self, value: &[u8]) {
        let len = value.len().min(MAX_BYTES_LEN);

        let prefix = if len < SHORT_BYTES_LIMIT {
            self.buf.push(len as u8);
            1
        } else {
            self.buf.push(SHORT_BYTES_LIMIT as u8);
            self.buf.extend_from_slice(&(len as u32).to_le_bytes()[..3]);
            4
        };

        self.buf.extend_from_slice(&value[..len]);

        let padding = (4 - (prefix + len) % 4) % 4;
        self.buf.extend(std::iter::repeat(0).take(padding));
    }

    pub fn boxed<T: Schema>(&mut self, value: &T) {
        self.u32(T::constructor_id());
        value.write_fields(self);
    }

    pub fn bare<T: Schema>(&mut self, value: &T) {
        value.write_fields(self);
    }

    pub fn vector<T>(&mut self, items: &[T], mut write: impl FnMut(&mut Self, &T)) {
        self.u32(items.len() as u32);

        for item in items {
            write(self, item);
        }
    }
}

#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn finish(&self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEof);
        }

        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;

        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0_u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn int256(&mut self) -> Result<[u8; 32], DecodeError> {
        self.array()
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let first = self.take(1)?[0] as usize;

        let (prefix, len) = match first {
            n if n < SHORT_BYTES_LIMIT => (1, n),
            SHORT_BYTES_LIMIT => {
                let raw = self.take(3)?;
                (4, u32::from_le_bytes([raw[0], raw[1], raw[2], 0]) as usize)
            }
            n => return Err(DecodeError::InvalidLength(n)),
        };

        let value = self.take(len)?.to_vec();

        let padding = (4 - (prefix + len) % 4) % 4;
        self.take(padding)?;

        Ok(value)
    }

    /// Read a constructor id and check that it is the one of `T`.
    pub fn expect<T: Schema>(&mut self) -> Result<(), DecodeError> {
        let found = self.u32()?;
        let expected = T::constructor_id();

        if found != expected {
            return Err(DecodeError::UnexpectedConstructor { expected, found });
        }

        Ok(())
    }

    pub fn boxed<T: Schema>(&mut self) -> Result<T, DecodeError> {
        self.expect::<T>()?;
        T::read_fields(self)
    }

    pub fn bare<T: Schema>(&mut self) -> Result<T, DecodeError> {
        T::read_fields(self)
    }

    pub fn vector<T>(
        &mut self,
        mut read: impl FnMut(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<Vec<T>, DecodeError> {
        let len = self.u32()? as usize;

        // Every element takes at least 4 bytes, anything longer is garbage.
        if len > self.remaining() / 4 {
            return Err(DecodeError::InvalidLength(len));
        }

        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(read(self)?);
        }

        Ok(items)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors decoding untrusted TL bytes.
pub enum DecodeError {
    #[error("Unexpected end of input")]
    UnexpectedEof,

    #[error("Unknown constructor {0:#010x}")]
    UnknownConstructor(u32),

    #[error("Expected constructor {expected:#010x}, found {found:#010x}")]
    UnexpectedConstructor { expected: u32, found: u32 },

    #[error("Invalid length {0}")]
    InvalidLength(usize),

    #[error("{0} trailing bytes after the object")]
    TrailingBytes(usize),
}
