use std::collections::{BTreeMap, BTreeSet};

use relay_bridge_core::{Address, AssetId, ChainId, Digest, EncodingVersion, LockEvent};
use serde::{Deserialize, Serialize};

use crate::{
    error::{BridgeError, Missing},
    relayers::RelayerRegistry,
};

/// Binding to the counterpart bridge instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct PeerBinding {
    pub contract: Address,
    pub source_chain_id: ChainId,
    pub target_chain_id: ChainId,
}

impl PeerBinding {
    /// The same binding seen from the other direction: events that arrive from the peer carry
    /// the peer's chain as their source.
    pub fn mirrored(&self) -> Self {
        Self {
            contract: self.contract.clone(),
            source_chain_id: self.target_chain_id,
            target_chain_id: self.source_chain_id,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct SenderState {
    pub vault: Address,
    pub admin: Address,
    pub asset: Option<AssetId>,
    /// `contract` is the instance expected to release locked funds; `source_chain_id` is the
    /// local chain.
    pub peer: Option<PeerBinding>,
    /// Nonce of the most recent lock. Zero until the first lock.
    pub nonce: u64,
}

impl SenderState {
    pub(crate) fn configured(&self) -> Result<(&AssetId, &PeerBinding), BridgeError> {
        let asset = self
            .asset
            .as_ref()
            .ok_or(BridgeError::NotConfigured(Missing::Asset))?;
        let peer = self
            .peer
            .as_ref()
            .ok_or(BridgeError::NotConfigured(Missing::Peer))?;
        Ok((asset, peer))
    }
}

/// Receipt kept for every settled nonce.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct SettledUnlock {
    pub digest: Digest,
    pub receiver_address: Address,
    pub amount: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct ReceiverState {
    pub vault: Address,
    pub admin: Address,
    pub asset: Option<AssetId>,
    /// `contract` is the only instance whose events are accepted; `source_chain_id` is the
    /// peer's chain.
    pub peer: Option<PeerBinding>,
    pub relayers: RelayerRegistry,
    /// Highest settled nonce. Settlement may happen out of order so this is informational.
    pub last_nonce: u64,
    pub used_nonces: BTreeMap<u64, SettledUnlock>,
    pub encoding: EncodingVersion,
}

impl ReceiverState {
    pub(crate) fn configured(&self) -> Result<(&AssetId, &PeerBinding), BridgeError> {
        let asset = self
            .asset
            .as_ref()
            .ok_or(BridgeError::NotConfigured(Missing::Asset))?;
        let peer = self
            .peer
            .as_ref()
            .ok_or(BridgeError::NotConfigured(Missing::Peer))?;
        Ok((asset, peer))
    }

    pub fn is_settled(&self, nonce: u64) -> bool {
        self.used_nonces.contains_key(&nonce)
    }

    pub(crate) fn settle(&mut self, nonce: u64, receipt: SettledUnlock) {
        self.used_nonces.insert(nonce, receipt);
        self.last_nonce = self.last_nonce.max(nonce);
    }
}

/// Signatures gathered so far for one unsettled nonce.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct PendingUnlock {
    event: LockEvent,
    digest: Digest,
    signers: BTreeSet<Address>,
}

impl PendingUnlock {
    pub fn new(event: LockEvent, digest: Digest) -> Self {
        Self {
            event,
            digest,
            signers: BTreeSet::new(),
        }
    }

    pub fn event(&self) -> &LockEvent {
        &self.event
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    pub fn signers(&self) -> impl Iterator<Item = &Address> {
        self.signers.iter()
    }

    /// Returns the number of distinct relayers that signed this event.
    pub fn num_signatures(&self) -> usize {
        self.signers.len()
    }

    pub fn has_signature(&self, relayer: &Address) -> bool {
        self.signers.contains(relayer)
    }

    /// Records a signature from `relayer`. Returns false if it was already counted.
    pub fn add_signature(&mut self, relayer: Address) -> bool {
        self.signers.insert(relayer)
    }
}
