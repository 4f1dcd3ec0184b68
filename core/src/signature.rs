//! Relayer attestations are ECDSA signatures over secp256k1. A relayer signs the
//! `secp256k_hash` of an event [`Digest`] as a pre-hashed message. Under
//! [`EncodingVersion::V1`] that is exactly what a stock SHA-256 ECDSA signer produces when fed
//! `sha256(json)`, so relayers need no prehash support of their own. The receiver checks the
//! signature against the verification key registered for that relayer. Public key recovery is
//! never used: the key is known up front, and a signature only counts for the relayer whose key
//! it verifies against.
//!
//! Accepted signature blobs:
//!
//! ```markdown
//! 64 bytes      : r || s
//! 65 bytes      : r || s || v   (recovery id, ignored)
//! 8 ..= 73      : ASN.1 DER     (as produced by most ECDSA libraries)
//! ```

use std::fmt;

use k256::ecdsa::{
    signature::hazmat::{PrehashSigner, PrehashVerifier},
    Signature, SigningKey, VerifyingKey,
};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::{Digest, EncodingVersion, LockEvent};

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("malformed signature of {0} bytes")]
    Malformed(usize),
    #[error("signature does not match the relayer key")]
    Mismatch,
    #[error("invalid relayer verification key")]
    InvalidKey,
    #[error("failed to sign event digest")]
    Signing,
    #[error("failed to encode lock event: {0}")]
    Encoding(#[from] std::io::Error),
}

/// The verification key a relayer registers with the receiver.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayerKey(VerifyingKey);

impl RelayerKey {
    /// Parses a SEC1 encoded point, compressed (33 bytes) or uncompressed (65 bytes).
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(RelayerKey)
            .map_err(|_| SignatureError::InvalidKey)
    }

    /// Parses a hex SEC1 key, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|_| SignatureError::InvalidKey)?;
        Self::from_sec1_bytes(&bytes)
    }

    /// Uncompressed SEC1 encoding (`0x04 || x || y`).
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(false).as_bytes().to_vec()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_sec1_bytes())
    }

    /// Checks `signature` over `digest` against this key.
    pub fn verify_digest(&self, digest: &Digest, signature: &[u8]) -> Result<(), SignatureError> {
        let sig = parse_signature(signature)?;
        self.0
            .verify_prehash(&digest.secp256k_hash, &sig)
            .map_err(|_| SignatureError::Mismatch)
    }
}

impl From<VerifyingKey> for RelayerKey {
    fn from(key: VerifyingKey) -> Self {
        RelayerKey(key)
    }
}

impl From<&SigningKey> for RelayerKey {
    fn from(key: &SigningKey) -> Self {
        RelayerKey(VerifyingKey::from(key))
    }
}

impl fmt::Debug for RelayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RelayerKey").field(&self.to_hex()).finish()
    }
}

impl Serialize for RelayerKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RelayerKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        RelayerKey::from_hex(&s).map_err(D::Error::custom)
    }
}

#[cfg(feature = "schemars")]
impl schemars::JsonSchema for RelayerKey {
    fn schema_name() -> String {
        "RelayerKey".into()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        <String as schemars::JsonSchema>::json_schema(gen)
    }
}

fn parse_signature(blob: &[u8]) -> Result<Signature, SignatureError> {
    let sig = match blob.len() {
        64 => Signature::from_slice(blob),
        65 => Signature::from_slice(&blob[..64]),
        8..=73 => Signature::from_der(blob),
        n => return Err(SignatureError::Malformed(n)),
    }
    .map_err(|_| SignatureError::Malformed(blob.len()))?;

    // Verification only accepts low-S; both forms attest to the same digest.
    Ok(sig.normalize_s().unwrap_or(sig))
}

/// Produces the 64-byte `r || s` attestation a relayer submits for `event`.
pub fn sign_event(key: &SigningKey, event: &LockEvent) -> Result<Vec<u8>, SignatureError> {
    sign_event_with(key, event, EncodingVersion::CURRENT)
}

pub fn sign_event_with(
    key: &SigningKey,
    event: &LockEvent,
    version: EncodingVersion,
) -> Result<Vec<u8>, SignatureError> {
    let digest = event.digest_with(version)?;
    let sig: Signature = key
        .sign_prehash(&digest.secp256k_hash)
        .map_err(|_| SignatureError::Signing)?;
    Ok(sig.to_bytes().to_vec())
}

/// Verifies that `signature` attests to `event` under `key`.
pub fn verify_event(
    key: &RelayerKey,
    event: &LockEvent,
    signature: &[u8],
) -> Result<(), SignatureError> {
    verify_event_with(key, event, signature, EncodingVersion::CURRENT)
}

pub fn verify_event_with(
    key: &RelayerKey,
    event: &LockEvent,
    signature: &[u8],
    version: EncodingVersion,
) -> Result<(), SignatureError> {
    let digest = event.digest_with(version)?;
    key.verify_digest(&digest, signature)
}
