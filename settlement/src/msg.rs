use std::{fs, path::Path};

use anyhow::Context;
use relay_bridge_core::{Address, AssetId, Digest, EncodingVersion};
use serde::{Deserialize, Serialize};

use crate::{
    error::BridgeError,
    relayers::{RelayerInfo, MAX_RELAYERS},
    state::{PeerBinding, SettledUnlock},
};

/// Parameters a bridge instance is created with.
///
/// Only the identities are required. Asset, peer and relayers may be given here or configured
/// later by the admin; either way they go through the same checks.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct InstantiateMsg {
    /// Identity of this instance. Outgoing lock events name it as their source contract.
    pub contract: Address,
    pub admin: Address,
    pub vault: Address,
    #[serde(default)]
    pub asset: Option<AssetId>,
    /// Peer binding as seen from this instance: `source_chain_id` is the local chain.
    #[serde(default)]
    pub peer: Option<PeerBinding>,
    #[serde(default)]
    pub relayers: Vec<RelayerInfo>,
    /// Encoding and hash relayers sign incoming events under.
    #[serde(default)]
    pub encoding: EncodingVersion,
}

impl InstantiateMsg {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let msg: Self = serde_json::from_str(s).context("failed to parse instantiate message")?;
        msg.validate()
            .context("invalid instantiate message")?;
        Ok(msg)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&s).with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        for (name, addr) in [
            ("contract", &self.contract),
            ("admin", &self.admin),
            ("vault", &self.vault),
        ] {
            if addr.is_empty() {
                return Err(BridgeError::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        if self.vault == self.contract || self.vault == self.admin {
            return Err(BridgeError::InvalidConfig(
                "vault must be a dedicated account".into(),
            ));
        }
        if matches!(&self.asset, Some(a) if a.is_empty()) {
            return Err(BridgeError::InvalidConfig("asset must not be empty".into()));
        }
        if matches!(&self.peer, Some(p) if p.contract.is_empty()) {
            return Err(BridgeError::InvalidConfig(
                "peer contract must not be empty".into(),
            ));
        }
        if self.relayers.len() > MAX_RELAYERS {
            return Err(BridgeError::TooManyRelayers(self.relayers.len()));
        }

        Ok(())
    }
}

/// Height of the source ledger block a lock executes in.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct BlockInfo {
    pub height: u64,
}

/// Funds released by a settled unlock.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct UnlockReceipt {
    pub nonce: u64,
    pub receiver_address: Address,
    pub amount: u64,
    pub digest: Digest,
}

// Adjacently tagged so unit-like and data-carrying variants encode uniformly as
// `{"type": .., "data": ..}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// The signature was counted (or already had been) and the threshold is not reached yet.
    Pending { signatures: usize, threshold: usize },
    /// This signature completed the threshold and the funds were released.
    Settled(UnlockReceipt),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TransferStatus {
    Pending {
        signers: Vec<Address>,
        threshold: usize,
    },
    Settled(SettledUnlock),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct MissingSignatures {
    pub relayer: Address,
    pub nonces: Vec<u64>,
}
