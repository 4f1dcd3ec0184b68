//! A bridge instance plays both roles: it locks funds and emits [`LockEvent`]s for its peer
//! (sender), and it aggregates relayer signatures over the peer's events and releases funds once
//! the threshold is met (receiver).
//!
//! Every operation runs inside a single critical section over all instance state and the ledger
//! handle. Checks that can fail all happen before the first write, so a rejected operation leaves
//! nothing behind.

use std::collections::{BTreeMap, VecDeque};

use log::{debug, info, warn};
use parking_lot::Mutex;
use relay_bridge_core::{Address, AssetId, ChainId, LockEvent, RelayerKey};

use crate::{
    error::{BridgeError, Missing},
    ledger::{AssetLedger, VaultAuthority},
    msg::{
        BlockInfo, InstantiateMsg, MissingSignatures, SubmitOutcome, TransferStatus,
        UnlockReceipt,
    },
    relayers::{RelayerInfo, RelayerRegistry},
    state::{PeerBinding, PendingUnlock, ReceiverState, SenderState, SettledUnlock},
};

/// Lock events kept for [`Bridge::lock_events_after`]. Once full, the oldest event is dropped
/// for each new lock.
pub const MAX_RETAINED_EVENTS: usize = 4096;

pub struct Bridge<L> {
    contract: Address,
    inner: Mutex<Inner<L>>,
}

struct Inner<L> {
    sender: SenderState,
    receiver: ReceiverState,
    pending: BTreeMap<u64, PendingUnlock>,
    events: VecDeque<LockEvent>,
    vault: VaultAuthority,
    ledger: L,
}

impl<L: AssetLedger> Bridge<L> {
    /// Creates the instance and opens its vault on `ledger`.
    pub fn instantiate(msg: InstantiateMsg, mut ledger: L) -> Result<Self, BridgeError> {
        msg.validate()?;

        let mut relayers = RelayerRegistry::new();
        for r in msg.relayers {
            relayers.add(r.address, r.key)?;
        }

        let vault = VaultAuthority::new(msg.vault.clone());
        ledger.open_vault(&vault)?;

        let sender = SenderState {
            vault: msg.vault.clone(),
            admin: msg.admin.clone(),
            asset: msg.asset.clone(),
            peer: msg.peer.clone(),
            nonce: 0,
        };
        let receiver = ReceiverState {
            vault: msg.vault,
            admin: msg.admin,
            asset: msg.asset,
            peer: msg.peer.as_ref().map(PeerBinding::mirrored),
            relayers,
            last_nonce: 0,
            used_nonces: BTreeMap::new(),
            encoding: msg.encoding,
        };

        info!(
            "instantiated bridge {} (vault {}, {} relayers, threshold {})",
            msg.contract,
            sender.vault,
            receiver.relayers.len(),
            receiver.relayers.threshold()
        );

        Ok(Self {
            contract: msg.contract,
            inner: Mutex::new(Inner {
                sender,
                receiver,
                pending: BTreeMap::new(),
                events: VecDeque::new(),
                vault,
                ledger,
            }),
        })
    }

    pub fn contract(&self) -> &Address {
        &self.contract
    }

    /// Moves `amount` from `caller` into the vault and emits the event relayers sign.
    ///
    /// `caller` must have approved the vault for at least `amount` of the bridged asset.
    pub fn lock(
        &self,
        block: BlockInfo,
        caller: &Address,
        amount: u64,
        receiver_address: Address,
    ) -> Result<LockEvent, BridgeError> {
        let mut inner = self.inner.lock();
        inner
            .lock_funds(&self.contract, block, caller, amount, receiver_address)
            .map_err(|e| {
                warn!("lock by {caller} rejected: {e}");
                e
            })
    }

    /// Counts `signature` from `relayer` toward releasing the funds described by `event`.
    pub fn submit_signature(
        &self,
        relayer: &Address,
        event: &LockEvent,
        signature: &[u8],
    ) -> Result<SubmitOutcome, BridgeError> {
        let mut inner = self.inner.lock();
        inner
            .submit(&self.contract, relayer, event, signature)
            .map_err(|e| {
                warn!(
                    "signature from {relayer} for nonce {} rejected: {e}",
                    event.nonce
                );
                e
            })
    }

    pub fn add_relayer(
        &self,
        caller: &Address,
        address: Address,
        key: RelayerKey,
    ) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();
        inner.ensure_admin(caller)?;

        inner.receiver.relayers.add(address.clone(), key)?;
        info!(
            "added relayer {address}; {} relayers, threshold {}",
            inner.receiver.relayers.len(),
            inner.receiver.relayers.threshold()
        );
        Ok(())
    }

    /// Removes `address` from the whitelist. Signatures it already contributed to pending
    /// unlocks keep counting.
    pub fn remove_relayer(&self, caller: &Address, address: &Address) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();
        inner.ensure_admin(caller)?;

        inner.receiver.relayers.remove(address)?;
        info!(
            "removed relayer {address}; {} relayers, threshold {}",
            inner.receiver.relayers.len(),
            inner.receiver.relayers.threshold()
        );
        Ok(())
    }

    /// Binds this instance to its counterpart. `source_chain_id` is the chain this instance runs
    /// on and `target_chain_id` the peer's chain.
    pub fn configure_peer(
        &self,
        caller: &Address,
        peer_contract: Address,
        source_chain_id: ChainId,
        target_chain_id: ChainId,
    ) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();
        inner.ensure_admin(caller)?;

        if peer_contract.is_empty() {
            return Err(BridgeError::InvalidConfig(
                "peer contract must not be empty".into(),
            ));
        }

        let peer = PeerBinding {
            contract: peer_contract,
            source_chain_id,
            target_chain_id,
        };
        info!(
            "configured peer {} (chain {source_chain_id} -> {target_chain_id})",
            peer.contract
        );
        inner.receiver.peer = Some(peer.mirrored());
        inner.sender.peer = Some(peer);
        Ok(())
    }

    pub fn configure_asset(&self, caller: &Address, asset: AssetId) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();
        inner.ensure_admin(caller)?;

        if asset.is_empty() {
            return Err(BridgeError::InvalidConfig("asset must not be empty".into()));
        }

        info!("configured asset {asset}");
        inner.receiver.asset = Some(asset.clone());
        inner.sender.asset = Some(asset);
        Ok(())
    }

    /// Pre-funds the vault from the admin's own balance. Returns the new vault balance.
    pub fn add_liquidity(&self, caller: &Address, amount: u64) -> Result<u64, BridgeError> {
        let mut inner = self.inner.lock();
        inner.ensure_admin(caller)?;

        if amount == 0 {
            return Err(BridgeError::InvalidAmount);
        }
        let asset = inner
            .receiver
            .asset
            .clone()
            .ok_or(BridgeError::NotConfigured(Missing::Asset))?;

        inner.pull(&asset, caller, amount)?;

        let balance = inner.ledger.balance_of(&asset, inner.vault.address());
        info!("added {amount} liquidity; vault balance {balance}");
        Ok(balance)
    }

    pub fn sender_state(&self) -> SenderState {
        self.inner.lock().sender.clone()
    }

    pub fn receiver_state(&self) -> ReceiverState {
        self.inner.lock().receiver.clone()
    }

    pub fn relayers(&self) -> Vec<RelayerInfo> {
        self.inner.lock().receiver.relayers.iter().cloned().collect()
    }

    pub fn threshold(&self) -> usize {
        self.inner.lock().receiver.relayers.threshold()
    }

    /// Balance of the bridged asset held by the vault.
    pub fn vault_balance(&self) -> Result<u64, BridgeError> {
        let inner = self.inner.lock();
        let asset = inner
            .receiver
            .asset
            .as_ref()
            .ok_or(BridgeError::NotConfigured(Missing::Asset))?;
        Ok(inner.ledger.balance_of(asset, inner.vault.address()))
    }

    /// Where the unlock for `nonce` stands, or `None` if no relayer has signed it yet.
    pub fn transfer_status(&self, nonce: u64) -> Option<TransferStatus> {
        let inner = self.inner.lock();
        if let Some(settled) = inner.receiver.used_nonces.get(&nonce) {
            return Some(TransferStatus::Settled(settled.clone()));
        }

        inner.pending.get(&nonce).map(|p| TransferStatus::Pending {
            signers: p.signers().cloned().collect(),
            threshold: inner.receiver.relayers.threshold(),
        })
    }

    pub fn pending_unlocks(&self) -> Vec<PendingUnlock> {
        self.inner.lock().pending.values().cloned().collect()
    }

    /// Pending nonces `relayer` has not signed yet.
    pub fn missing_signatures(&self, relayer: &Address) -> MissingSignatures {
        let inner = self.inner.lock();
        let nonces = inner
            .pending
            .iter()
            .filter(|(_, p)| !p.has_signature(relayer))
            .map(|(nonce, _)| *nonce)
            .collect();

        MissingSignatures {
            relayer: relayer.clone(),
            nonces,
        }
    }

    /// Lock events with a nonce greater than `nonce`, oldest first, at most `limit` of them.
    ///
    /// Only the last [`MAX_RETAINED_EVENTS`] locks are kept. A relayer that falls further behind
    /// has to recover older events from the source ledger itself.
    pub fn lock_events_after(&self, nonce: u64, limit: Option<usize>) -> Vec<LockEvent> {
        let inner = self.inner.lock();
        let start = inner.events.partition_point(|e| e.nonce <= nonce);
        inner
            .events
            .range(start..)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Read access to the host ledger, under the instance lock.
    pub fn with_ledger<R>(&self, f: impl FnOnce(&L) -> R) -> R {
        f(&self.inner.lock().ledger)
    }
}

impl<L: AssetLedger> Inner<L> {
    fn ensure_admin(&self, caller: &Address) -> Result<(), BridgeError> {
        if caller != &self.sender.admin {
            return Err(BridgeError::Unauthorized);
        }
        Ok(())
    }

    // Debits `owner` into the vault after checking everything the ledger would refuse, so the
    // caller sees bridge errors rather than ledger ones.
    fn pull(&mut self, asset: &AssetId, owner: &Address, amount: u64) -> Result<(), BridgeError> {
        if owner.is_empty() || owner == self.vault.address() {
            return Err(BridgeError::Unauthorized);
        }

        let available = self.ledger.balance_of(asset, owner);
        if available < amount {
            return Err(BridgeError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        if self.ledger.allowance(asset, owner, self.vault.address()) < amount {
            return Err(BridgeError::Unauthorized);
        }

        self.ledger.pull(asset, owner, &self.vault, amount)?;
        Ok(())
    }

    fn lock_funds(
        &mut self,
        contract: &Address,
        block: BlockInfo,
        caller: &Address,
        amount: u64,
        receiver_address: Address,
    ) -> Result<LockEvent, BridgeError> {
        if amount == 0 {
            return Err(BridgeError::InvalidAmount);
        }
        if receiver_address.is_empty() {
            return Err(BridgeError::InvalidReceiverAddress);
        }

        let (asset, peer) = self.sender.configured()?;
        let asset = asset.clone();
        let peer = peer.clone();
        let nonce = self
            .sender
            .nonce
            .checked_add(1)
            .ok_or(BridgeError::NonceOverflow)?;

        self.pull(&asset, caller, amount)?;
        self.sender.nonce = nonce;

        let event = LockEvent {
            source_contract: contract.clone(),
            target_contract: peer.contract,
            chain_id: peer.source_chain_id,
            block_height: block.height,
            amount,
            receiver_address,
            nonce,
        };
        if self.events.len() == MAX_RETAINED_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event.clone());

        info!(
            "locked {amount} from {caller} for {} on chain {}, nonce {nonce}",
            event.receiver_address, peer.target_chain_id
        );
        Ok(event)
    }

    fn submit(
        &mut self,
        contract: &Address,
        relayer: &Address,
        event: &LockEvent,
        signature: &[u8],
    ) -> Result<SubmitOutcome, BridgeError> {
        let key = self
            .receiver
            .relayers
            .key_of(relayer)
            .cloned()
            .ok_or_else(|| BridgeError::NotWhitelisted(relayer.clone()))?;

        let (asset, peer) = self.receiver.configured()?;
        let asset = asset.clone();
        if event.source_contract != peer.contract {
            return Err(BridgeError::InvalidSourceContract(
                event.source_contract.clone(),
            ));
        }
        if &event.target_contract != contract {
            return Err(BridgeError::InvalidTargetContract(
                event.target_contract.clone(),
            ));
        }
        if event.chain_id != peer.source_chain_id {
            return Err(BridgeError::InvalidChainId {
                expected: peer.source_chain_id,
                actual: event.chain_id,
            });
        }

        let nonce = event.nonce;
        if self.receiver.is_settled(nonce) {
            return Err(BridgeError::NonceAlreadyUsed(nonce));
        }

        let digest = event
            .digest_with(self.receiver.encoding)
            .map_err(|_| BridgeError::InvalidSignature)?;
        key.verify_digest(&digest, signature)
            .map_err(|_| BridgeError::InvalidSignature)?;

        let signatures = match self.pending.get(&nonce) {
            Some(p) if p.digest().hash != digest.hash => {
                return Err(BridgeError::PayloadMismatch(nonce))
            }
            Some(p) if p.has_signature(relayer) => p.num_signatures(),
            Some(p) => p.num_signatures() + 1,
            None => 1,
        };
        if event.amount == 0 {
            return Err(BridgeError::InvalidAmount);
        }
        if event.receiver_address.is_empty() {
            return Err(BridgeError::InvalidReceiverAddress);
        }

        let threshold = self.receiver.relayers.threshold();
        if signatures < threshold {
            self.pending
                .entry(nonce)
                .or_insert_with(|| PendingUnlock::new(event.clone(), digest))
                .add_signature(relayer.clone());

            debug!("nonce {nonce}: {signatures}/{threshold} signatures ({relayer})");
            return Ok(SubmitOutcome::Pending {
                signatures,
                threshold,
            });
        }

        // Threshold reached. Release first; state only changes once the funds have moved.
        let available = self.ledger.balance_of(&asset, self.vault.address());
        if available < event.amount {
            return Err(BridgeError::InsufficientBalance {
                needed: event.amount,
                available,
            });
        }
        self.ledger
            .release(&asset, &self.vault, &event.receiver_address, event.amount)?;

        self.receiver.settle(
            nonce,
            SettledUnlock {
                digest,
                receiver_address: event.receiver_address.clone(),
                amount: event.amount,
            },
        );
        self.pending.remove(&nonce);

        info!(
            "settled nonce {nonce}: released {} to {} ({signatures}/{threshold} signatures)",
            event.amount, event.receiver_address
        );
        Ok(SubmitOutcome::Settled(UnlockReceipt {
            nonce,
            receiver_address: event.receiver_address.clone(),
            amount: event.amount,
            digest,
        }))
    }
}
