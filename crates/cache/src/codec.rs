//! Result encoding for the `result` archive entry
//!
//! Layout: one format byte followed by a MessagePack body with named fields.
//! Text is a MessagePack string and binary is never converted to text, so the
//! two never collapse into each other on the way back.
//!
//! A plain `Vec<u8>` goes through serde's sequence path and is written as an
//! array of integers: exact, but up to two bytes per byte. Wrap large binary
//! payloads in [`Blob`] to store them as a MessagePack `bin` value.

use crate::{Error, Result};
use serde::de::{self, DeserializeOwned, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Format byte written in front of every encoded result
pub const FORMAT_V1: u8 = 0x01;

/// Binary payload serialized as raw bytes rather than a sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Blob(pub Vec<u8>);

impl Blob {
    /// Consume the blob, returning its bytes
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<Blob> for Vec<u8> {
    fn from(blob: Blob) -> Self {
        blob.0
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Blob {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Blob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_byte_buf(BlobVisitor)
    }
}

struct BlobVisitor;

impl<'de> Visitor<'de> for BlobVisitor {
    type Value = Blob;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte array")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Blob, E> {
        Ok(Blob(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<Blob, E> {
        Ok(Blob(v))
    }

    // Entries written from a plain Vec<u8>
    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Blob, A::Error> {
        let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(b) = seq.next_element::<u8>()? {
            bytes.push(b);
        }
        Ok(Blob(bytes))
    }
}

/// Encode a computed value for storage
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let body = rmp_serde::to_vec_named(value)?;
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(FORMAT_V1);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a stored value back into `T`
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    match bytes.split_first() {
        Some((&FORMAT_V1, body)) => Ok(rmp_serde::from_slice(body)?),
        Some((other, _)) => Err(Error::serialization(format!(
            "Unknown result format byte 0x{other:02x}"
        ))),
        None => Err(Error::serialization("Empty result entry")),
    }
}
