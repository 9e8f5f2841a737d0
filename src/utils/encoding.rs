use std::fmt;

use ethers::{
    types::{H256, U256},
    utils::keccak256,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::types::ActorError;

pub trait U256Ext {
    fn to_be_bytes_vec(&self) -> Vec<u8>;
}

impl U256Ext for U256 {
    fn to_be_bytes_vec(&self) -> Vec<u8> {
        let mut bytes = [0u8; 32];
        self.to_big_endian(&mut bytes);
        bytes.to_vec()
    }
}

/// Content identifier: keccak-256 of a block's canonical bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cid(pub H256);

impl Cid {
    pub fn of(data: &[u8]) -> Self {
        Cid(H256::from(keccak256(data)))
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_bytes()))
    }
}

/// Encodes a value into its canonical CBOR form.
pub fn marshal<T: Serialize>(value: &T) -> Result<Vec<u8>, ActorError> {
    serde_cbor::to_vec(value).map_err(|e| ActorError::fault(format!("could not marshal: {}", e)))
}

pub fn unmarshal<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ActorError> {
    serde_cbor::from_slice(bytes)
        .map_err(|e| ActorError::fault(format!("could not unmarshal: {}", e)))
}

/// Serializes a borrowed `U256` in its big-endian byte form, for use inside
/// tuples.
pub struct U256Ser<'a>(pub &'a U256);

impl Serialize for U256Ser<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        u256_be::serialize(self.0, serializer)
    }
}

/// Deserializing counterpart of [`U256Ser`].
pub struct U256De(pub U256);

impl<'de> Deserialize<'de> for U256De {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        u256_be::deserialize(deserializer).map(U256De)
    }
}

/// Serde adapter storing a `U256` as a fixed 32-byte big-endian byte string.
pub mod u256_be {
    use std::fmt;

    use ethers::types::U256;
    use serde::{
        de::{self, SeqAccess, Visitor},
        Deserializer, Serializer,
    };

    use super::U256Ext;

    pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&value.to_be_bytes_vec())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_bytes(BigEndianVisitor)
    }

    struct BigEndianVisitor;

    impl<'de> Visitor<'de> for BigEndianVisitor {
        type Value = U256;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a big-endian integer of at most 32 bytes")
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<U256, E> {
            if v.len() > 32 {
                return Err(E::invalid_length(v.len(), &self));
            }
            Ok(U256::from_big_endian(v))
        }

        // Text formats such as JSON hand bytes back as a sequence.
        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<U256, A::Error> {
            let mut bytes = Vec::with_capacity(32);
            while let Some(byte) = seq.next_element::<u8>()? {
                bytes.push(byte);
            }
            self.visit_bytes(&bytes)
        }
    }
}
