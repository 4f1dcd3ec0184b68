//! The host asset ledger as seen from a bridge instance.
//!
//! Bridges never hold balances themselves. Funds sit in a vault account on the host ledger, and
//! the only handle able to debit that account is the [`VaultAuthority`] owned by the bridge
//! instance. It cannot be constructed or cloned outside this crate, so nothing but a lock or a
//! settlement can move funds out of a vault. A vault must also be a fresh account: an address
//! that already holds funds or has granted an allowance cannot be opened as one.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use parking_lot::{Mutex, MutexGuard};
use relay_bridge_core::{Address, AssetId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("insufficient allowance: need {needed}, approved {approved}")]
    InsufficientAllowance { needed: u64, approved: u64 },
    #[error("{0} is a bridge vault and cannot be debited directly")]
    VaultCustody(Address),
    #[error("vault {0} has not been opened")]
    UnknownVault(Address),
    #[error("vault {0} is already open")]
    VaultExists(Address),
    #[error("{0} is an existing account and cannot become a vault")]
    AccountInUse(Address),
    #[error("balance overflow")]
    Overflow,
}

/// Debit capability over a bridge vault.
#[derive(Debug)]
pub struct VaultAuthority {
    address: Address,
}

impl VaultAuthority {
    pub(crate) fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }
}

pub trait AssetLedger {
    fn balance_of(&self, asset: &AssetId, owner: &Address) -> u64;

    /// Amount `owner` has approved `spender` to move on their behalf.
    fn allowance(&self, asset: &AssetId, owner: &Address, spender: &Address) -> u64;

    /// Registers the vault account so the ledger refuses ordinary debits from it. Fails if the
    /// address is already a vault or an account in use.
    fn open_vault(&mut self, vault: &VaultAuthority) -> Result<(), LedgerError>;

    /// Moves `amount` from `owner` into the vault, spending the allowance `owner` granted the
    /// vault.
    fn pull(
        &mut self,
        asset: &AssetId,
        owner: &Address,
        vault: &VaultAuthority,
        amount: u64,
    ) -> Result<(), LedgerError>;

    /// Moves `amount` out of the vault to `to`.
    fn release(
        &mut self,
        asset: &AssetId,
        vault: &VaultAuthority,
        to: &Address,
        amount: u64,
    ) -> Result<(), LedgerError>;
}

/// In-process ledger with per-asset balances and allowances.
#[derive(Debug, Default, Clone)]
pub struct MemoryLedger {
    balances: BTreeMap<(AssetId, Address), u64>,
    allowances: BTreeMap<(AssetId, Address, Address), u64>,
    vaults: BTreeSet<Address>,
    // Every address ever credited or that granted an allowance.
    accounts: BTreeSet<Address>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, asset: &AssetId, to: &Address, amount: u64) -> Result<(), LedgerError> {
        self.credit(asset, to, amount)
    }

    pub fn approve(&mut self, asset: &AssetId, owner: &Address, spender: &Address, amount: u64) {
        self.accounts.insert(owner.clone());
        let _ = self
            .allowances
            .insert((asset.clone(), owner.clone(), spender.clone()), amount);
    }

    /// An ordinary transfer signed by `from`. Vault accounts are refused.
    pub fn transfer(
        &mut self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), LedgerError> {
        if self.vaults.contains(from) {
            return Err(LedgerError::VaultCustody(from.clone()));
        }
        self.move_funds(asset, from, to, amount)
    }

    pub fn is_vault(&self, address: &Address) -> bool {
        self.vaults.contains(address)
    }

    fn move_funds(
        &mut self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), LedgerError> {
        // Check both legs before touching either balance.
        let available = self.balance_of(asset, from);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        if from != to {
            self.balance_of(asset, to)
                .checked_add(amount)
                .ok_or(LedgerError::Overflow)?;
        }

        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount)
    }

    fn credit(&mut self, asset: &AssetId, to: &Address, amount: u64) -> Result<(), LedgerError> {
        let balance = self
            .balances
            .entry((asset.clone(), to.clone()))
            .or_default();
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        self.accounts.insert(to.clone());
        Ok(())
    }

    fn debit(&mut self, asset: &AssetId, from: &Address, amount: u64) -> Result<(), LedgerError> {
        let balance = self
            .balances
            .entry((asset.clone(), from.clone()))
            .or_default();
        *balance = balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                needed: amount,
                available: *balance,
            })?;
        Ok(())
    }
}

impl AssetLedger for MemoryLedger {
    fn balance_of(&self, asset: &AssetId, owner: &Address) -> u64 {
        self.balances
            .get(&(asset.clone(), owner.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn allowance(&self, asset: &AssetId, owner: &Address, spender: &Address) -> u64 {
        self.allowances
            .get(&(asset.clone(), owner.clone(), spender.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn open_vault(&mut self, vault: &VaultAuthority) -> Result<(), LedgerError> {
        let address = vault.address();
        if self.vaults.contains(address) {
            return Err(LedgerError::VaultExists(address.clone()));
        }
        if self.accounts.contains(address) {
            return Err(LedgerError::AccountInUse(address.clone()));
        }

        self.vaults.insert(address.clone());
        Ok(())
    }

    fn pull(
        &mut self,
        asset: &AssetId,
        owner: &Address,
        vault: &VaultAuthority,
        amount: u64,
    ) -> Result<(), LedgerError> {
        if !self.vaults.contains(vault.address()) {
            return Err(LedgerError::UnknownVault(vault.address().clone()));
        }
        if self.vaults.contains(owner) {
            return Err(LedgerError::VaultCustody(owner.clone()));
        }

        let approved = self.allowance(asset, owner, vault.address());
        if approved < amount {
            return Err(LedgerError::InsufficientAllowance {
                needed: amount,
                approved,
            });
        }

        self.move_funds(asset, owner, vault.address(), amount)?;
        self.approve(asset, owner, vault.address(), approved - amount);
        Ok(())
    }

    fn release(
        &mut self,
        asset: &AssetId,
        vault: &VaultAuthority,
        to: &Address,
        amount: u64,
    ) -> Result<(), LedgerError> {
        if !self.vaults.contains(vault.address()) {
            return Err(LedgerError::UnknownVault(vault.address().clone()));
        }
        self.move_funds(asset, vault.address(), to, amount)
    }
}

/// A [`MemoryLedger`] shared between bridge instances and the callers funding them.
#[derive(Debug, Default, Clone)]
pub struct SharedLedger(Arc<Mutex<MemoryLedger>>);

impl SharedLedger {
    pub fn new(ledger: MemoryLedger) -> Self {
        Self(Arc::new(Mutex::new(ledger)))
    }

    pub fn lock(&self) -> MutexGuard<'_, MemoryLedger> {
        self.0.lock()
    }
}

impl AssetLedger for SharedLedger {
    fn balance_of(&self, asset: &AssetId, owner: &Address) -> u64 {
        self.0.lock().balance_of(asset, owner)
    }

    fn allowance(&self, asset: &AssetId, owner: &Address, spender: &Address) -> u64 {
        self.0.lock().allowance(asset, owner, spender)
    }

    fn open_vault(&mut self, vault: &VaultAuthority) -> Result<(), LedgerError> {
        self.0.lock().open_vault(vault)
    }

    fn pull(
        &mut self,
        asset: &AssetId,
        owner: &Address,
        vault: &VaultAuthority,
        amount: u64,
    ) -> Result<(), LedgerError> {
        self.0.lock().pull(asset, owner, vault, amount)
    }

    fn release(
        &mut self,
        asset: &AssetId,
        vault: &VaultAuthority,
        to: &Address,
        amount: u64,
    ) -> Result<(), LedgerError> {
        self.0.lock().release(asset, vault, to, amount)
    }
}
