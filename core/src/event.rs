//! Lock events are the only hand-off between the two sides of the bridge. The sender emits one
//! per successful lock; every relayer signs the digest of its canonical encoding; the receiver
//! re-derives the same digest from the submitted fields before checking any signature.
//!
//! Changing the encoding silently breaks every relayer, so the byte layout is versioned through
//! [`EncodingVersion`] and the receiver only ever validates against an explicit version.

use std::io;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use sha3::Keccak256;

use crate::{Address, ChainId};

/// A lock observed on the source ledger.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct LockEvent {
    /// The bridge instance that custodied the funds.
    pub source_contract: Address,
    /// The counterpart instance expected to release them.
    pub target_contract: Address,
    /// Chain id of the source ledger.
    pub chain_id: ChainId,
    pub block_height: u64,
    pub amount: u64,
    /// Recipient on the target ledger, in whatever encoding that ledger uses.
    pub receiver_address: Address,
    /// Sequence number assigned by the sender; unique per bridge direction.
    pub nonce: u64,
}

/// Byte encodings of a [`LockEvent`] and the digest relayers sign over them.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum EncodingVersion {
    /// Compact JSON object with camel-case keys in declaration order and every number rendered
    /// as a decimal string:
    ///
    /// ```text
    /// {"sourceContract":"..","targetContract":"..","chainId":"..","blockHeight":"..",
    ///  "amount":"..","receiverAddress":"..","nonce":".."}
    /// ```
    ///
    /// hashed twice with SHA-256. This is what deployed relayers sign: they hash the JSON once
    /// and hand the result to a SHA-256 ECDSA signer, which hashes it again.
    #[default]
    V1,
    /// The V1 JSON body hashed twice with Keccak-256.
    V1Keccak,
}

impl EncodingVersion {
    pub const CURRENT: EncodingVersion = EncodingVersion::V1;

    fn hash(self, data: &[u8]) -> [u8; 32] {
        match self {
            EncodingVersion::V1 => Sha256::digest(data).into(),
            EncodingVersion::V1Keccak => Keccak256::digest(data).into(),
        }
    }
}

// Field order here is the wire order; serde_json writes struct fields as declared.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalV1<'a> {
    source_contract: &'a str,
    target_contract: &'a str,
    chain_id: String,
    block_height: String,
    amount: String,
    receiver_address: &'a str,
    nonce: String,
}

/// Digest data for a lock event.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct Digest {
    /// Hash of the canonical encoding. Identifies the event: two submissions for the same nonce
    /// describe the same lock iff their hashes are equal.
    pub hash: [u8; 32],

    /// Hash of `hash`. This is the value ECDSA sees as the pre-hashed message, so signature
    /// verification runs against it rather than against the encoding itself.
    pub secp256k_hash: [u8; 32],
}

impl LockEvent {
    /// Returns the canonical bytes of this event under `version`.
    pub fn encode(&self, version: EncodingVersion) -> serde_json::Result<Vec<u8>> {
        match version {
            EncodingVersion::V1 | EncodingVersion::V1Keccak => serde_json::to_vec(&CanonicalV1 {
                source_contract: self.source_contract.as_str(),
                target_contract: self.target_contract.as_str(),
                chain_id: self.chain_id.to_string(),
                block_height: self.block_height.to_string(),
                amount: self.amount.to_string(),
                receiver_address: self.receiver_address.as_str(),
                nonce: self.nonce.to_string(),
            }),
        }
    }

    /// Digest of the event under the current encoding.
    pub fn digest(&self) -> io::Result<Digest> {
        self.digest_with(EncodingVersion::CURRENT)
    }

    pub fn digest_with(&self, version: EncodingVersion) -> io::Result<Digest> {
        let body = self.encode(version)?;
        Ok(digest(version, &body))
    }
}

/// Calculates the digest of an already encoded event body.
pub fn digest(version: EncodingVersion, body: &[u8]) -> Digest {
    let hash = version.hash(body);
    let secp256k_hash = version.hash(&hash);

    Digest {
        hash,
        secp256k_hash,
    }
}
