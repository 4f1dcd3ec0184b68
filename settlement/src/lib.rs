//! Threshold-signature settlement for a two-chain asset bridge.
//!
//! A [`Bridge`] custodies user funds in a vault when they lock (emitting a
//! [`LockEvent`](relay_bridge_core::LockEvent) for the peer chain), and releases funds from the
//! same vault once enough whitelisted relayers have signed an event coming from the peer.

mod bridge;
pub mod error;
pub mod ledger;
pub mod msg;
pub mod relayers;
pub mod state;

pub use crate::{
    bridge::{Bridge, MAX_RETAINED_EVENTS},
    error::{BridgeError, ErrorKind, Missing},
    ledger::{AssetLedger, LedgerError, MemoryLedger, SharedLedger, VaultAuthority},
    msg::{
        BlockInfo, InstantiateMsg, MissingSignatures, SubmitOutcome, TransferStatus,
        UnlockReceipt,
    },
    relayers::{threshold, RelayerInfo, RelayerRegistry, MAX_RELAYERS, MAX_THRESHOLD, MIN_THRESHOLD},
    state::{PeerBinding, PendingUnlock, ReceiverState, SenderState, SettledUnlock},
};
