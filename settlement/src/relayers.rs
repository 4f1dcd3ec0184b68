use relay_bridge_core::{Address, RelayerKey};
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Upper bound on the size of the relayer set.
pub const MAX_RELAYERS: usize = 18;

/// Settlement never needs fewer than this many distinct relayer signatures.
pub const MIN_THRESHOLD: usize = 2;

pub const MAX_THRESHOLD: usize = 13;

/// Number of distinct relayer signatures needed to settle an unlock when `n` relayers are
/// registered: two thirds of the set rounded up, bounded to `[MIN_THRESHOLD, MAX_THRESHOLD]`.
pub const fn threshold(n: usize) -> usize {
    let t = n.saturating_mul(2).saturating_add(2) / 3;
    if t < MIN_THRESHOLD {
        MIN_THRESHOLD
    } else if t > MAX_THRESHOLD {
        MAX_THRESHOLD
    } else {
        t
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct RelayerInfo {
    pub address: Address,
    pub key: RelayerKey,
}

/// The whitelisted witnesses, in registration order.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(transparent)]
pub struct RelayerRegistry(Vec<RelayerInfo>);

impl RelayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.0.iter().any(|r| &r.address == address)
    }

    pub fn key_of(&self, address: &Address) -> Option<&RelayerKey> {
        self.0
            .iter()
            .find(|r| &r.address == address)
            .map(|r| &r.key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelayerInfo> {
        self.0.iter()
    }

    pub fn threshold(&self) -> usize {
        threshold(self.0.len())
    }

    pub fn add(&mut self, address: Address, key: RelayerKey) -> Result<(), BridgeError> {
        if address.is_empty() {
            return Err(BridgeError::InvalidConfig(
                "relayer address must not be empty".into(),
            ));
        }
        if self.contains(&address) {
            return Err(BridgeError::RelayerAlreadyExists(address));
        }
        if let Some(owner) = self.0.iter().find(|r| r.key == key) {
            return Err(BridgeError::DuplicateRelayerKey(owner.address.clone()));
        }
        if self.0.len() >= MAX_RELAYERS {
            return Err(BridgeError::TooManyRelayers(self.0.len()));
        }

        self.0.push(RelayerInfo { address, key });
        Ok(())
    }

    pub fn remove(&mut self, address: &Address) -> Result<RelayerInfo, BridgeError> {
        let idx = self
            .0
            .iter()
            .position(|r| &r.address == address)
            .ok_or_else(|| BridgeError::RelayerNotFound(address.clone()))?;

        Ok(self.0.remove(idx))
    }
}
